//! Innermost link of the text document chain: layout execution.
//!
//! [`LayoutDocument`] owns the document [`Metadata`] for its whole chain and
//! wraps a finished body in a tera layout. It is never registered on its
//! own; Markdown, Outline and HTML documents all bottom out here.

use crate::document::{DEFAULT_LAYOUT, Kind, Metadata};
use crate::site::context::RenderContext;
use crate::transform::Page;
use anyhow::{Context, Result, bail};
use std::{io::Write, path::Path};

pub struct LayoutDocument {
    pub meta: Metadata,
}

impl LayoutDocument {
    pub fn new(src: &Path) -> Self {
        Self { meta: Metadata::new(src) }
    }

    /// Wrap a transformed body in the layout template and write the result.
    ///
    /// A `None` layout writes the body untouched. The built-in default
    /// layout is optional: sites without a template directory still render,
    /// the page is just the bare body. An explicitly requested layout that
    /// does not exist is an error.
    pub fn render_body(&self, ctx: &RenderContext, page: Page, out: &mut dyn Write) -> Result<()> {
        let Some(layout) = &self.meta.layout else {
            out.write_all(page.body.as_bytes())?;
            return Ok(());
        };

        if !ctx.has_template(layout) {
            if layout == DEFAULT_LAYOUT {
                out.write_all(page.body.as_bytes())?;
                return Ok(());
            }
            bail!(
                "layout `{layout}` not found in {}",
                ctx.cfg.build.templates.display()
            );
        }

        let mut vars = self.template_vars(ctx);
        vars.extend(page.vars);
        vars.insert("body", &page.body);

        ctx.templates
            .render_to(layout, &vars, &mut *out)
            .with_context(|| {
                format!("cannot render `{}` with layout `{layout}`", self.meta.web_path)
            })?;
        Ok(())
    }

    /// Every variable a layout can reference besides `body` and whatever
    /// the pipeline attached.
    fn template_vars(&self, ctx: &RenderContext) -> tera::Context {
        let mut vars = tera::Context::new();
        vars.insert("title", &self.meta.title);
        vars.insert("web_path", &self.meta.web_path);
        vars.insert("kind", kind_name(self.meta.kind));
        vars.insert("category", &self.meta.category);
        vars.insert("parent", &self.meta.parent);
        vars.insert("preview", &self.meta.preview);
        if let Some(created) = self.meta.created_at {
            vars.insert("date", &created.format("%Y-%m-%d").to_string());
            vars.insert("created_at", &created.to_rfc3339());
        }
        if let Some(updated) = self.meta.updated_at {
            vars.insert("updated_at", &updated.to_rfc3339());
        }
        vars.insert("site_title", &ctx.cfg.base.title);
        vars.insert("site_description", &ctx.cfg.base.description);
        vars.insert("site_url", &ctx.cfg.base.url);
        vars.insert("site_author", &ctx.cfg.base.author);
        vars.insert("site_language", &ctx.cfg.base.language);
        vars.insert("since", &ctx.cfg.base.since);
        vars.insert("year", &chrono::Datelike::year(&ctx.now));
        vars
    }
}

fn kind_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Draft => "draft",
        Kind::Post => "post",
        Kind::Page => "page",
        Kind::Gallery => "gallery",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::fs;

    fn ctx_with_templates(write: &[(&str, &str)]) -> RenderContext {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in write {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let mut cfg = SiteConfig::default();
        cfg.build.templates = dir.path().to_path_buf();
        let cfg: &'static SiteConfig = Box::leak(Box::new(cfg));
        // tempdir must outlive assemble's template read
        let ctx = RenderContext::assemble(cfg, Vec::new()).unwrap();
        dir.close().unwrap();
        ctx
    }

    #[test]
    fn test_none_layout_is_passthrough() {
        let ctx = ctx_with_templates(&[]);
        let mut doc = LayoutDocument::new(Path::new("src/raw.html"));
        doc.meta.layout = None;
        let mut out = Vec::new();
        doc.render_body(&ctx, Page::new("<p>raw</p>".into()), &mut out).unwrap();
        assert_eq!(out, b"<p>raw</p>");
    }

    #[test]
    fn test_missing_default_layout_falls_back() {
        let ctx = ctx_with_templates(&[]);
        let doc = LayoutDocument::new(Path::new("src/a.md"));
        let mut out = Vec::new();
        doc.render_body(&ctx, Page::new("body".into()), &mut out).unwrap();
        assert_eq!(out, b"body");
    }

    #[test]
    fn test_missing_explicit_layout_fails() {
        let ctx = ctx_with_templates(&[]);
        let mut doc = LayoutDocument::new(Path::new("src/a.md"));
        doc.meta.layout = Some("wide.html.tmpl".into());
        let mut out = Vec::new();
        assert!(doc.render_body(&ctx, Page::new("body".into()), &mut out).is_err());
    }

    #[test]
    fn test_layout_receives_vars() {
        let ctx = ctx_with_templates(&[(
            "text_document.html.tmpl",
            "<title>{{ title }}</title>{{ body }}",
        )]);
        let mut doc = LayoutDocument::new(Path::new("src/a.md"));
        doc.meta.title = "Hello".into();
        let mut out = Vec::new();
        doc.render_body(&ctx, Page::new("<p>hi</p>".into()), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<title>Hello</title><p>hi</p>");
    }
}
