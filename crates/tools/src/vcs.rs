//! Version control capability used by multi-file patching for rollback.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, warn};

/// State of the working tree before a multi-file edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeStatus {
    /// Not under version control; nothing can be restored automatically.
    Untracked,
    Clean,
    /// Tracked with uncommitted changes.
    Dirty,
}

impl TreeStatus {
    pub fn is_tracked(self) -> bool {
        !matches!(self, Self::Untracked)
    }
}

#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn status(&self) -> TreeStatus;

    /// Restore `path` to its last committed content.
    async fn restore(&self, path: &Path) -> Result<(), String>;
}

/// Git working tree rooted at `workdir`.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self { workdir: workdir.into() }
    }

    /// Git in the process's current directory.
    pub fn current_dir() -> Self {
        Self::new(".")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.workdir).kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl VersionControl for Git {
    async fn status(&self) -> TreeStatus {
        let inside = self
            .command()
            .args(["rev-parse", "--git-dir"])
            .output()
            .await
            .is_ok_and(|out| out.status.success());
        if !inside {
            return TreeStatus::Untracked;
        }

        tree_status(self.command().args(["status", "--porcelain"]).output().await)
    }

    async fn restore(&self, path: &Path) -> Result<(), String> {
        debug!(path = %path.display(), "Restoring file from git");
        let out = self
            .command()
            .arg("checkout")
            .arg("--")
            .arg(path)
            .output()
            .await
            .map_err(|e| e.to_string())?;
        if out.status.success() {
            Ok(())
        } else {
            Err(String::from_utf8_lossy(&out.stderr).trim().to_string())
        }
    }
}

/// Classify `git status --porcelain` run inside a repository. A status that
/// cannot be read counts as dirty, so rollback never covers changes it could
/// not see.
fn tree_status(output: std::io::Result<Output>) -> TreeStatus {
    match output {
        Ok(out) if out.status.success() && !out.stdout.iter().all(u8::is_ascii_whitespace) => TreeStatus::Dirty,
        Ok(out) if out.status.success() => TreeStatus::Clean,
        Ok(out) => {
            warn!(stderr = %String::from_utf8_lossy(&out.stderr).trim(), "git status failed; treating tree as dirty");
            TreeStatus::Dirty
        }
        Err(e) => {
            warn!(error = %e, "git status failed; treating tree as dirty");
            TreeStatus::Dirty
        }
    }
}
