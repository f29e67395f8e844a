//! Per-build render context.
//!
//! One [`RenderContext`] is assembled fresh for every full build or rebuild
//! and threaded through all rendering calls: the loaded template set, the
//! post listing for aggregate pages, and the syntax highlighting assets.
//! Nothing here outlives a build pass, so no process-wide mutable state
//! accumulates between builds.

use crate::config::SiteConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use tera::Tera;
use walkdir::WalkDir;

/// Highlighting theme; colors are overridden by the site stylesheet, the
/// theme only drives token classification.
const HIGHLIGHT_THEME: &str = "base16-ocean.dark";

/// A post as seen by listing pages and feeds.
#[derive(Debug, Clone, Serialize)]
pub struct PostEntry {
    pub title: String,
    pub web_path: String,
    pub category: Option<String>,
    pub preview: Option<String>,
    /// `YYYY-MM-DD`, for display in listings.
    pub date: Option<String>,
    #[serde(skip)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A photograph as seen by gallery pages: where the full rendition lives
/// and the common prefix of its thumbnail ladder (`<prefix>-<width>.webp`).
#[derive(Debug, Clone, Serialize)]
pub struct GalleryEntry {
    pub web_path: String,
    pub thumb_prefix: String,
    /// Directory part of `web_path`, used to scope galleries.
    pub dir: String,
}

/// Everything a document needs to render, assembled fresh per build.
pub struct RenderContext {
    pub cfg: &'static SiteConfig,
    pub templates: Tera,
    pub posts: Vec<PostEntry>,
    pub images: Vec<GalleryEntry>,
    pub syntaxes: SyntaxSet,
    pub theme: Theme,
    pub now: DateTime<Utc>,
}

impl RenderContext {
    /// Load the template directory and highlighting assets.
    ///
    /// Templates are registered under their path relative to the template
    /// root, so layouts reference partials as `{% include "_nav.html.tmpl" %}`.
    pub fn assemble(cfg: &'static SiteConfig, posts: Vec<PostEntry>) -> Result<Self> {
        let mut templates = Tera::default();
        templates.autoescape_on(vec![]);

        let root = &cfg.build.templates;
        if root.is_dir() {
            for entry in WalkDir::new(root)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                let path = entry.path();
                let is_template = path
                    .to_str()
                    .is_some_and(|p| p.ends_with(".tmpl") || p.ends_with(".html"));
                if !is_template {
                    continue;
                }
                let name = path
                    .strip_prefix(root)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .replace('\\', "/");
                let content = fs::read_to_string(path)
                    .with_context(|| format!("cannot read template {}", path.display()))?;
                templates
                    .add_raw_template(&name, &content)
                    .with_context(|| format!("cannot parse template {name}"))?;
            }
        }

        let theme_set = ThemeSet::load_defaults();
        let theme = theme_set.themes[HIGHLIGHT_THEME].clone();

        Ok(Self {
            cfg,
            templates,
            posts,
            images: Vec::new(),
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme,
            now: Utc::now(),
        })
    }

    pub fn with_images(mut self, images: Vec<GalleryEntry>) -> Self {
        self.images = images;
        self
    }

    /// Whether a template with the given name was loaded.
    pub fn has_template(&self, name: &str) -> bool {
        self.templates.get_template_names().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn leaked_config(templates: &std::path::Path) -> &'static SiteConfig {
        let mut cfg = SiteConfig::default();
        cfg.build.templates = templates.to_path_buf();
        Box::leak(Box::new(cfg))
    }

    #[test]
    fn test_assemble_registers_templates_by_relative_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("text_document.html.tmpl"), "{{ body }}").unwrap();
        fs::write(dir.path().join("_nav.html.tmpl"), "<nav></nav>").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a template").unwrap();

        let ctx = RenderContext::assemble(leaked_config(dir.path()), Vec::new()).unwrap();
        assert!(ctx.has_template("text_document.html.tmpl"));
        assert!(ctx.has_template("_nav.html.tmpl"));
        assert!(!ctx.has_template("notes.txt"));
    }

    #[test]
    fn test_assemble_without_template_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ctx =
            RenderContext::assemble(leaked_config(&dir.path().join("missing")), Vec::new())
                .unwrap();
        assert_eq!(ctx.templates.get_template_names().count(), 0);
    }
}
