//! HTML to readable text.
//!
//! The page is parsed with `scraper` (html5ever underneath), so entities,
//! unclosed tags and odd attribute values are handled by a real parser. The
//! tree is then walked to emit a markdown-like rendering: headings become
//! `#` lines, links `[label](href)`, list items `- ` lines.

use scraper::{ElementRef, Html, Selector};

/// Elements whose content is never shown to a reader.
const INVISIBLE: &[&str] = &[
    "head", "script", "style", "noscript", "svg", "template", "iframe", "title", "button", "select",
];

/// Elements that start and end on their own lines.
const BLOCKS: &[&str] = &[
    "p",
    "div",
    "section",
    "article",
    "header",
    "footer",
    "nav",
    "main",
    "aside",
    "ul",
    "ol",
    "dl",
    "table",
    "blockquote",
    "figure",
    "form",
    "hr",
    "dt",
    "dd",
];

pub struct HtmlText {
    title: Selector,
}

impl HtmlText {
    pub fn new() -> Result<Self, String> {
        let title = Selector::parse("title").map_err(|e| e.to_string())?;
        Ok(Self { title })
    }

    /// Convert a document, prefixing `Title: ...` when it has a title and a
    /// non-empty body.
    pub fn convert(&self, html: &str) -> String {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.title)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty());

        let mut out = Markdown::default();
        out.element(document.root_element());
        let body = out.finish();

        match title {
            Some(title) if !body.is_empty() => format!("Title: {title}\n\n{body}"),
            _ => body,
        }
    }
}

#[derive(Default)]
struct Markdown {
    out: String,
    pending_space: bool,
}

impl Markdown {
    fn at_line_start(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    /// Append inline content, separated from the previous word if needed.
    fn inline(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if self.pending_space && !self.at_line_start() {
            self.out.push(' ');
        }
        self.out.push_str(s);
        self.pending_space = false;
    }

    /// Append a text node, collapsing whitespace.
    fn text(&mut self, raw: &str) {
        if raw.starts_with(char::is_whitespace) {
            self.pending_space = true;
        }
        for (i, word) in raw.split_whitespace().enumerate() {
            if i > 0 {
                self.pending_space = true;
            }
            self.inline(word);
        }
        if raw.ends_with(char::is_whitespace) {
            self.pending_space = true;
        }
    }

    /// End the current line and make sure `newlines` line breaks follow it.
    fn block(&mut self, newlines: usize) {
        while self.out.ends_with(' ') {
            self.out.pop();
        }
        self.pending_space = false;
        if self.out.is_empty() {
            return;
        }
        let existing = self.out.len() - self.out.trim_end_matches('\n').len();
        for _ in existing..newlines {
            self.out.push('\n');
        }
    }

    fn children(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                self.text(text);
            } else if let Some(el) = ElementRef::wrap(child) {
                self.element(el);
            }
        }
    }

    /// Render the children of `element` on one line.
    fn flattened(element: ElementRef<'_>) -> String {
        let mut inner = Markdown::default();
        inner.children(element);
        inner.finish().split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn element(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        if INVISIBLE.contains(&name) {
            return;
        }

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let label = Self::flattened(element);
                if label.is_empty() {
                    return;
                }
                let level = name[1..].parse::<usize>().unwrap_or(1);
                self.block(2);
                self.out.push_str(&format!("{} {label}", "#".repeat(level)));
                self.block(2);
            }
            "a" => {
                let label = Self::flattened(element);
                match element.value().attr("href").map(str::trim) {
                    Some(href) if !label.is_empty() && is_followable(href) => {
                        self.inline(&format!("[{label}]({href})"));
                    }
                    _ => self.inline(&label),
                }
            }
            "li" => {
                self.block(1);
                self.inline("- ");
                self.children(element);
                self.block(1);
            }
            "br" => {
                self.block(0);
                self.out.push('\n');
            }
            "pre" => {
                let code: String = element.text().collect();
                self.block(2);
                self.out.push_str(code.trim_matches('\n'));
                self.block(2);
            }
            "tr" => {
                self.block(1);
                self.children(element);
                self.block(1);
            }
            "td" | "th" => {
                self.children(element);
                self.pending_space = true;
            }
            "img" => {
                if let Some(alt) = element.value().attr("alt").map(str::trim).filter(|a| !a.is_empty()) {
                    self.inline(&format!("[image: {alt}]"));
                }
            }
            _ if BLOCKS.contains(&name) => {
                self.block(2);
                self.children(element);
                self.block(2);
            }
            _ => self.children(element),
        }
    }

    fn finish(self) -> String {
        let lines: Vec<&str> = self.out.lines().map(str::trim_end).collect();
        let mut text = lines.join("\n");
        while text.contains("\n\n\n") {
            text = text.replace("\n\n\n", "\n\n");
        }
        text.trim().to_string()
    }
}

fn is_followable(href: &str) -> bool {
    !href.is_empty() && !href.starts_with('#') && !href.starts_with("javascript:")
}
