//! Content discovery: walk the source roots and decide, per file, which
//! document variant tracks it.
//!
//! The template directory is excluded here (layouts are loaded by the
//! render context, not tracked as documents), and the usual editor debris
//! is ignored everywhere.

use crate::config::SiteConfig;
use crate::document::{
    Document, HtmlDocument, ImageDocument, MarkdownDocument, OutlineDocument, StaticDocument,
};
use crate::error::SiteError;
use anyhow::Result;
use std::path::Path;
use walkdir::WalkDir;

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png"];

/// Build a document for every tracked file under the source roots and the
/// public directory.
pub fn discover(cfg: &SiteConfig) -> Result<Vec<Box<dyn Document>>> {
    let mut docs: Vec<Box<dyn Document>> = Vec::new();
    let templates = &cfg.build.templates;

    for root in cfg.source_roots() {
        if !root.is_dir() {
            continue;
        }
        let walk = WalkDir::new(&root)
            .into_iter()
            .filter_entry(|e| !super::is_under(e.path(), templates) && !is_ignored(e.path()));
        for entry in walk {
            let entry = entry.map_err(|err| SiteError::Discovery {
                root: root.clone(),
                source: err.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(doc) = document_for(entry.path()) {
                docs.push(doc);
            }
        }
    }

    let public = &cfg.build.public;
    if public.is_dir() {
        for entry in WalkDir::new(public)
            .into_iter()
            .filter_entry(|e| !is_ignored(e.path()))
        {
            let entry = entry.map_err(|err| SiteError::Discovery {
                root: public.clone(),
                source: err.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(public)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            docs.push(Box::new(StaticDocument::new(entry.path(), rel)));
        }
    }

    Ok(docs)
}

/// The document variant for a source file, `None` for untracked files.
pub fn document_for(path: &Path) -> Option<Box<dyn Document>> {
    let name = path.file_name()?.to_str()?;
    // Partials belong to templates even when they live among pages.
    if name.starts_with('_') {
        return None;
    }

    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let doc: Box<dyn Document> = match ext.as_str() {
        "md" | "markdown" => Box::new(MarkdownDocument::new(path)),
        "org" => Box::new(OutlineDocument::new(path)),
        "html" | "htm" | "tmpl" => Box::new(HtmlDocument::new(path)),
        _ if IMAGE_EXTS.contains(&ext.as_str()) => Box::new(ImageDocument::new(path)),
        _ => return None,
    };
    Some(doc)
}

fn is_ignored(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with('.') || name.starts_with('#') || name.ends_with('~') || name == "README.md"
}
