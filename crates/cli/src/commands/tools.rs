//! `patchwright tools` — List the built-in tools.

use patchwright_tools::{BuiltinOptions, default_registry};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let registry = default_registry(BuiltinOptions::default())?;

    println!();
    println!("  {} tools available:", registry.len());
    println!();
    for def in registry.definitions() {
        let summary = def.description.lines().next().unwrap_or_default();
        println!("  {:<14} {summary}", def.name);
    }
    println!();
    Ok(())
}
