//! Content documents and their metadata.
//!
//! Every unit of source content is a [`Document`]: a Markdown file, an
//! org-mode outline, raw HTML or a template page, a photograph, or a static
//! passthrough asset. Text variants form a chain of delegation (Markdown
//! and Outline wrap [`HtmlDocument`], which wraps [`LayoutDocument`]), so
//! that every page, whatever its source language, passes through the same
//! HTML transformation pipeline and layout execution.
//!
//! ```text
//! MarkdownDocument ─┐
//! OutlineDocument ──┼──► HtmlDocument ──► LayoutDocument ──► output bytes
//!    (raw .html) ───┘      (pipeline)        (tera layout)
//! ```

mod frontmatter;
mod html;
mod image;
mod layout;
mod markdown;
mod outline;
mod static_doc;

pub use frontmatter::{FrontMatter, extract as extract_frontmatter};
pub use html::HtmlDocument;
pub use image::ImageDocument;
pub use layout::LayoutDocument;
pub use markdown::MarkdownDocument;
pub use outline::OutlineDocument;
pub use static_doc::StaticDocument;

use crate::site::context::RenderContext;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

/// Default layout template, looked up by file name in the template dir.
pub const DEFAULT_LAYOUT: &str = "text_document.html.tmpl";

/// Extensions treated as text documents whose output path gets `.html`.
const TEXT_EXTS: &[&str] = &["htm", "html", "md", "markdown", "org", "tmpl"];

// ============================================================================
// Kind & dependencies
// ============================================================================

/// The type of a document. In every user-facing context this is called
/// "type"; `type` is a keyword, so internally it is `Kind`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    #[default]
    Draft,
    Post,
    Page,
    Gallery,
}

/// A declared relation "this document's output depends on X".
///
/// `Path` edges are resolved one hop only: a document depending on a
/// document that depends on the changed path is not rebuilt. `AnyPost` is a
/// predicate edge: the document rebuilds whenever any post-kind document
/// changes, however that post is stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    Path(PathBuf),
    AnyPost,
}

// ============================================================================
// Metadata
// ============================================================================

/// Information about a document that isn't inside the document itself.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Location on disk of the original file, relative to the project root.
    /// Unique across the site; rediscovery replaces, never duplicates.
    pub source_path: PathBuf,
    /// Output path relative to the site root. Exactly one document may
    /// produce a given web path in a build.
    pub web_path: String,
    pub kind: Kind,
    pub title: String,
    pub category: Option<String>,
    /// Web path of a semantic parent document. Not guaranteed to resolve.
    pub parent: Option<String>,
    /// Layout template file name within the template directory. `None`
    /// renders the body without any wrapping layout.
    pub layout: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Render a table of contents above the first second-level heading.
    pub toc: bool,
    pub preview: Option<String>,
    /// This page lists posts: it receives the post listing as a template
    /// variable and rebuilds whenever any post changes.
    pub lists_posts: bool,
}

impl Metadata {
    /// Metadata with defaults filled in from the source path: text documents
    /// get `<stem>.html` as their web path, everything else keeps its name.
    pub fn new(src: &Path) -> Self {
        let filename = src.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let stem = filename.split('.').next().unwrap_or(filename);
        let is_text = src
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| TEXT_EXTS.contains(&e));
        let web_path = if is_text {
            format!("{stem}.html")
        } else {
            filename.to_string()
        };

        Self {
            source_path: src.to_path_buf(),
            web_path,
            kind: Kind::Draft,
            title: String::new(),
            category: None,
            parent: None,
            layout: Some(DEFAULT_LAYOUT.to_string()),
            created_at: None,
            updated_at: None,
            toc: false,
            preview: None,
            lists_posts: false,
        }
    }

    /// Merge parsed frontmatter into the defaults.
    pub fn apply(&mut self, fm: &FrontMatter) {
        self.kind = fm.kind;
        if let Some(filename) = &fm.filename {
            self.web_path = filename.clone();
        }
        if let Some(title) = &fm.title {
            self.title = title.clone();
        }
        if let Some(layout) = &fm.layout {
            self.layout = if layout.is_empty() {
                None
            } else {
                Some(layout.clone())
            };
        }
        self.created_at = fm.date.or(self.created_at);
        self.updated_at = fm.updated.or(self.updated_at);
        self.toc |= fm.toc;
        self.lists_posts |= fm.posts;
        if fm.category.is_some() {
            self.category = fm.category.clone();
        }
        if fm.parent.is_some() {
            self.parent = fm.parent.clone();
        }
        if fm.preview.is_some() {
            self.preview = fm.preview.clone();
        }
    }

    pub fn is_post(&self) -> bool {
        self.kind == Kind::Post
    }
}

// ============================================================================
// Document trait
// ============================================================================

/// A unit of source content and its derived output.
///
/// The lifecycle within one build pass is `Created → Loaded → Rendered`:
/// [`Document::load`] parses raw source bytes (frontmatter, body
/// conversion), and [`Document::render`] writes final output bytes. A
/// document's kind never changes between load and render; changing a kind
/// requires rediscovery, which replaces the document wholesale.
pub trait Document: Send + Sync {
    /// Parse raw source bytes into the document. Last call wins.
    fn load(&mut self, raw: &[u8]) -> Result<()>;

    /// Write final output bytes. For text documents this runs the
    /// transformation pipeline and executes the layout template.
    fn render(&self, ctx: &RenderContext, out: &mut dyn Write) -> Result<()>;

    fn metadata(&self) -> &Metadata;
    fn metadata_mut(&mut self) -> &mut Metadata;

    /// All declared dependency edges of this document.
    fn dependencies(&self) -> Vec<Dependency>;

    /// Whether a change to `path` should rebuild this document.
    fn depends_on(&self, path: &Path) -> bool {
        self.dependencies().iter().any(|dep| match dep {
            Dependency::Path(p) => p == path,
            Dependency::AnyPost => false,
        })
    }

    /// Write sidecar outputs beside the main one. Photographs use this for
    /// their thumbnail set; everything else has none.
    fn render_assets(&self, _ctx: &RenderContext, _output_root: &Path) -> Result<()> {
        Ok(())
    }

    /// Source path whose content hash gates regeneration, for documents
    /// with expensive derived assets (photographs). `None` means the
    /// document is always rebuilt when asked.
    fn freshness_key(&self) -> Option<&Path> {
        None
    }

    /// Pipeline-transformed body HTML without the layout, for feed items.
    /// `None` for documents that don't carry a body.
    fn feed_html(&self, _ctx: &RenderContext) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_web_path_for_text() {
        let meta = Metadata::new(Path::new("src/cold/hello.md"));
        assert_eq!(meta.web_path, "hello.html");
        assert_eq!(meta.kind, Kind::Draft);
        assert_eq!(meta.layout.as_deref(), Some(DEFAULT_LAYOUT));
    }

    #[test]
    fn test_metadata_web_path_compound_extension() {
        let meta = Metadata::new(Path::new("src/cold/about.html.tmpl"));
        assert_eq!(meta.web_path, "about.html");
    }

    #[test]
    fn test_metadata_web_path_for_non_text() {
        let meta = Metadata::new(Path::new("public/style.css"));
        assert_eq!(meta.web_path, "style.css");
    }

    #[test]
    fn test_apply_frontmatter_overrides() {
        let mut meta = Metadata::new(Path::new("src/cold/hello.md"));
        let (fm, _) = extract_frontmatter(
            "---\ntype: post\nfilename: greetings.html\ntitle: Hi\nlayout: wide.html.tmpl\n---\n",
        )
        .unwrap();
        meta.apply(&fm);
        assert_eq!(meta.kind, Kind::Post);
        assert_eq!(meta.web_path, "greetings.html");
        assert_eq!(meta.title, "Hi");
        assert_eq!(meta.layout.as_deref(), Some("wide.html.tmpl"));
    }

    #[test]
    fn test_apply_empty_layout_means_raw() {
        let mut meta = Metadata::new(Path::new("src/cold/raw.html"));
        let (fm, _) = extract_frontmatter("---\nlayout: \"\"\n---\n").unwrap();
        meta.apply(&fm);
        assert!(meta.layout.is_none());
    }
}
