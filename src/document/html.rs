//! HTML documents and the shared text pipeline entry point.
//!
//! [`HtmlDocument`] handles sources that are already HTML (`.html`, and
//! `.html.tmpl` pages that want template evaluation), and acts as the common
//! trunk for Markdown and Outline documents: whatever produced the HTML,
//! loading derives a title and preview, assigns heading anchors, and
//! optionally inserts a table of contents; rendering runs the transformation
//! pipeline and hands the result to the layout.

use crate::document::{Dependency, Document, FrontMatter, LayoutDocument, Metadata};
use crate::document::frontmatter;
use crate::site::context::RenderContext;
use crate::transform::{self, Page};
use anyhow::{Context, Result, bail};
use regex::Regex;
use std::{io::Write, path::Path, sync::LazyLock};

static H1: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<h1[^>]*>(.*?)</h1>").unwrap_or_else(|e| panic!("h1 regex: {e}"))
});
static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<h([2-5])([^>]*)>(.*?)</h[2-5]>")
        .unwrap_or_else(|e| panic!("heading regex: {e}"))
});
static PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<p[^>]*>(.*?)</p>").unwrap_or_else(|e| panic!("p regex: {e}"))
});
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap_or_else(|e| panic!("tag regex: {e}")));

pub struct HtmlDocument {
    body: String,
    /// Evaluate the body itself as a template before the pipeline runs.
    /// Set for `.tmpl` sources.
    templated: bool,
    next: LayoutDocument,
}

impl HtmlDocument {
    pub fn new(src: &Path) -> Self {
        let templated = src.to_str().is_some_and(|s| s.ends_with(".tmpl"));
        Self {
            body: String::new(),
            templated,
            next: LayoutDocument::new(src),
        }
    }

    /// Entry point shared with the Markdown and Outline variants: take
    /// already-extracted frontmatter plus an HTML body and finish loading.
    pub fn load_html(&mut self, fm: &FrontMatter, body: String) -> Result<()> {
        self.next.meta.apply(fm);

        let mut body = anchor_headings(body);

        let meta = &mut self.next.meta;
        if meta.title.is_empty() {
            meta.title = derive_title(&body).unwrap_or_else(|| {
                meta.source_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
        }
        if meta.preview.is_none() {
            meta.preview = derive_preview(&body);
        }
        if meta.toc {
            body = insert_toc(&body).with_context(|| {
                format!("cannot build table of contents for {}", meta.source_path.display())
            })?;
        }

        self.body = body;
        Ok(())
    }

    fn transformed(&self, ctx: &RenderContext) -> Result<Page> {
        let body = if self.templated {
            evaluate_inline(ctx, &self.metadata().web_path, &self.body)?
        } else {
            self.body.clone()
        };
        transform::run(ctx, self.metadata(), body)
    }
}

impl Document for HtmlDocument {
    fn load(&mut self, raw: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(raw).with_context(|| {
            format!("{} is not valid UTF-8", self.next.meta.source_path.display())
        })?;
        let (fm, body) = frontmatter::extract(text)?;
        self.load_html(&fm, body)
    }

    fn render(&self, ctx: &RenderContext, out: &mut dyn Write) -> Result<()> {
        let page = self.transformed(ctx)?;
        self.next.render_body(ctx, page, out)
    }

    fn metadata(&self) -> &Metadata {
        &self.next.meta
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.next.meta
    }

    fn dependencies(&self) -> Vec<Dependency> {
        let mut deps = vec![Dependency::Path(self.next.meta.source_path.clone())];
        if self.next.meta.lists_posts {
            deps.push(Dependency::AnyPost);
        }
        deps
    }

    fn feed_html(&self, ctx: &RenderContext) -> Result<Option<String>> {
        Ok(Some(self.transformed(ctx)?.body))
    }
}

/// Evaluate a page body as a one-shot template, with the site's partials
/// available for `{% include %}`.
fn evaluate_inline(ctx: &RenderContext, name: &str, body: &str) -> Result<String> {
    let mut templates = ctx.templates.clone();
    templates
        .add_raw_template(name, body)
        .with_context(|| format!("cannot parse `{name}` as a template"))?;
    let mut vars = tera::Context::new();
    vars.insert("site_title", &ctx.cfg.base.title);
    vars.insert("site_url", &ctx.cfg.base.url);
    vars.insert("posts", &ctx.posts);
    vars.insert("photos", &ctx.images);
    Ok(templates.render(name, &vars)?)
}

fn derive_title(body: &str) -> Option<String> {
    let inner = H1.captures(body)?.get(1)?.as_str();
    let text = TAG.replace_all(inner, "").trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn derive_preview(body: &str) -> Option<String> {
    for caps in PARAGRAPH.captures_iter(body) {
        let text = TAG.replace_all(&caps[1], "");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            return Some(text);
        }
    }
    None
}

/// Give every h2..h5 heading an `id` anchor derived from its text, unless
/// the source already set one.
fn anchor_headings(body: String) -> String {
    if !body.contains("<h") {
        return body;
    }
    HEADING
        .replace_all(&body, |caps: &regex::Captures| {
            let (level, attrs, inner) = (&caps[1], &caps[2], &caps[3]);
            if attrs.contains("id=") {
                return caps[0].to_string();
            }
            let id = slugify(&TAG.replace_all(inner, ""));
            format!("<h{level}{attrs} id=\"{id}\">{inner}</h{level}>")
        })
        .into_owned()
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut dash = false;
    for ch in text.trim().chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Insert a linked table of contents, covering h2..h5, right before the
/// first `<h2>`.
fn insert_toc(body: &str) -> Result<String> {
    let mut items = String::new();
    let mut has_h2 = false;
    for caps in HEADING.captures_iter(body) {
        has_h2 |= &caps[1] == "2";
        let text = TAG.replace_all(&caps[3], "");
        let id = extract_id(&caps[2]).unwrap_or_else(|| slugify(&text));
        items.push_str(&format!(
            "<li class=\"toc-h{}\"><a href=\"#{id}\">{}</a></li>",
            &caps[1],
            text.trim()
        ));
    }
    if !has_h2 {
        bail!("toc requested but the document has no second-level headings");
    }

    let toc = format!("<nav class=\"toc\"><ol>{items}</ol></nav>");
    let first_h2 = body.find("<h2");
    match first_h2 {
        Some(idx) => {
            let mut out = String::with_capacity(body.len() + toc.len());
            out.push_str(&body[..idx]);
            out.push_str(&toc);
            out.push_str(&body[idx..]);
            Ok(out)
        }
        None => bail!("toc requested but the document has no second-level headings"),
    }
}

fn extract_id(attrs: &str) -> Option<String> {
    let idx = attrs.find("id=\"")?;
    let rest = &attrs[idx + 4..];
    Some(rest[..rest.find('"')?].to_string())
}
