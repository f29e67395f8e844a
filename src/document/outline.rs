//! Org-mode outline sources, converted to HTML at load time.
//!
//! Outlines share the frontmatter convention of the other text sources: a
//! leading `---` YAML block, then org markup.

use crate::document::frontmatter;
use crate::document::{Dependency, Document, HtmlDocument, Metadata};
use crate::site::context::RenderContext;
use anyhow::{Context, Result};
use orgize::Org;
use std::{io::Write, path::Path};

pub struct OutlineDocument {
    next: HtmlDocument,
}

impl OutlineDocument {
    pub fn new(src: &Path) -> Self {
        Self { next: HtmlDocument::new(src) }
    }
}

impl Document for OutlineDocument {
    fn load(&mut self, raw: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(raw).with_context(|| {
            format!("{} is not valid UTF-8", self.metadata().source_path.display())
        })?;
        let (fm, body) = frontmatter::extract(text)?;
        self.next.load_html(&fm, Org::parse(&body).to_html())
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
