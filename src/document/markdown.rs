//! Markdown sources, converted to HTML at load time.

use crate::document::frontmatter;
use crate::document::{Dependency, Document, HtmlDocument, Metadata};
use crate::site::context::RenderContext;
use anyhow::{Context, Result};
use pulldown_cmark::{Options, Parser, html};
use std::{io::Write, path::Path};

pub struct MarkdownDocument {
    next: HtmlDocument,
}

impl MarkdownDocument {
    pub fn new(src: &Path) -> Self {
        Self { next: HtmlDocument::new(src) }
    }
}

impl Document for MarkdownDocument {
    fn load(&mut self, raw: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(raw).with_context(|| {
            format!("{} is not valid UTF-8", self.metadata().source_path.display())
        })?;
        let (fm, body) = frontmatter::extract(text)?;
        self.next.load_html(&fm, to_html(&body))
    }

    fn render(&self, ctx: &RenderContext, out: &mut dyn Write) -> Result<()> {
        self.next.render(ctx, out)
    }

    fn metadata(&self) -> &Metadata {
        self.next.metadata()
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        self.next.metadata_mut()
    }

    fn dependencies(&self) -> Vec<Dependency> {
        self.next.dependencies()
    }

    fn feed_html(&self, ctx: &RenderContext) -> Result<Option<String>> {
        self.next.feed_html(ctx)
    }
}

fn to_html(markdown: &str) -> String {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_HEADING_ATTRIBUTES);

    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, Parser::new_ext(markdown, opts));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Kind;

    #[test]
    fn test_load_converts_and_applies_frontmatter() {
        let raw = "---\ntype: post\ndate: 2023-04-01\n---\n# Hello\n\nSome *prose*.\n";
        let mut doc = MarkdownDocument::new(Path::new("src/cold/hello.md"));
        doc.load(raw.as_bytes()).unwrap();
        assert_eq!(doc.metadata().kind, Kind::Post);
        assert_eq!(doc.metadata().title, "Hello");
        assert_eq!(doc.metadata().web_path, "hello.html");
        assert_eq!(doc.metadata().preview.as_deref(), Some("Some prose."));
    }

    #[test]
    fn test_tables_enabled() {
        let out = to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(out.contains("<table>"));
    }

    #[test]
    fn test_strikethrough_enabled() {
        assert!(to_html("~~gone~~").contains("<del>"));
    }
}
