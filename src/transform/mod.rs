//! Ordered body transformations.
//!
//! Every HTML document body passes through [`PIPELINE`] before it is handed
//! to the layout. Each step is a pure function over a [`Page`]: it may only
//! derive its output from the page it was given and the per-build
//! [`RenderContext`], never from ambient state, so rebuilding one document
//! can never depend on which documents were rendered before it.
//!
//! Order matters and is fixed:
//!
//!   unescape_entities -> attach_post_vars -> attach_gallery_vars
//!     -> highlight_code -> smart_quotes
//!
//! Entities must be unescaped before highlighting sees code contents, and
//! smart quotes run last so they never touch pre-highlighted markup.

use crate::document::{Kind, Metadata};
use crate::site::context::RenderContext;
use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use syntect::html::highlighted_html_for_string;

/// A document body in flight through the pipeline, together with the
/// template variables accumulated for the layout.
pub struct Page {
    pub body: String,
    pub vars: tera::Context,
}

impl Page {
    pub fn new(body: String) -> Self {
        Self { body, vars: tera::Context::new() }
    }
}

pub type Transform = fn(&RenderContext, &Metadata, Page) -> Result<Page>;

/// The fixed transformation order applied to every HTML body.
pub const PIPELINE: &[Transform] = &[
    unescape_entities,
    attach_post_vars,
    attach_gallery_vars,
    highlight_code,
    smart_quotes,
];

/// Run the whole pipeline over a freshly loaded body.
pub fn run(ctx: &RenderContext, meta: &Metadata, body: String) -> Result<Page> {
    let mut page = Page::new(body);
    for step in PIPELINE {
        page = step(ctx, meta, page)?;
    }
    Ok(page)
}

// ============================================================================
// Steps
// ============================================================================

/// Turn numeric quote entities the markdown renderer emits back into
/// literal quotes so later steps see real characters. Ampersand and angle
/// bracket entities are left alone, they are load-bearing in HTML.
fn unescape_entities(_ctx: &RenderContext, _meta: &Metadata, mut page: Page) -> Result<Page> {
    for (entity, ch) in [
        ("&#34;", "\""),
        ("&#39;", "'"),
        ("&quot;", "\""),
        ("&apos;", "'"),
        ("&rsquo;", "\u{2019}"),
        ("&lsquo;", "\u{2018}"),
        ("&rdquo;", "\u{201d}"),
        ("&ldquo;", "\u{201c}"),
    ] {
        if page.body.contains(entity) {
            page.body = page.body.replace(entity, ch);
        }
    }
    Ok(page)
}

/// Expose the site's post listing to documents that declared `posts: true`
/// in their front matter. Pages that never asked see no `posts` variable.
fn attach_post_vars(ctx: &RenderContext, meta: &Metadata, mut page: Page) -> Result<Page> {
    if meta.lists_posts {
        page.vars.insert("posts", &ctx.posts);
    }
    Ok(page)
}

/// Hand gallery-kind pages a `photos` variable listing the site's
/// photographs. Photographs sharing the page's output directory form the
/// gallery; a gallery page with no neighbouring photographs lists them all.
fn attach_gallery_vars(ctx: &RenderContext, meta: &Metadata, mut page: Page) -> Result<Page> {
    if meta.kind != Kind::Gallery {
        return Ok(page);
    }
    let dir = meta
        .web_path
        .rsplit_once('/')
        .map(|(d, _)| d)
        .unwrap_or("");
    let mut photos: Vec<_> = ctx.images.iter().filter(|i| i.dir == dir).collect();
    if photos.is_empty() {
        photos = ctx.images.iter().collect();
    }
    page.vars.insert("photos", &photos);
    Ok(page)
}

static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<pre><code class="language-([^"]+)">(.*?)</code></pre>"#)
        .unwrap_or_else(|e| panic!("code block regex: {e}"))
});

/// Replace fenced code blocks with syntect-highlighted markup. Languages
/// the syntax set does not know are passed through untouched.
fn highlight_code(ctx: &RenderContext, _meta: &Metadata, mut page: Page) -> Result<Page> {
    if !page.body.contains("<pre><code") {
        return Ok(page);
    }

    let mut out = String::with_capacity(page.body.len());
    let mut last = 0;
    for caps in CODE_BLOCK.captures_iter(&page.body) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        let token = &caps[1];
        let syntax = ctx
            .syntaxes
            .find_syntax_by_token(token)
            .or_else(|| ctx.syntaxes.find_syntax_by_extension(token));
        let Some(syntax) = syntax else {
            continue;
        };

        // The renderer escaped the code contents for us, undo that before
        // the highlighter sees it.
        let code = caps[2]
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&");

        let html = highlighted_html_for_string(&code, &ctx.syntaxes, syntax, &ctx.theme)?;
        out.push_str(&page.body[last..whole.start()]);
        out.push_str(&html);
        last = whole.end();
    }
    if last == 0 {
        return Ok(page);
    }
    out.push_str(&page.body[last..]);
    page.body = out;
    Ok(page)
}

/// Curl straight quotes in prose. Tag innards and code blocks are left
/// alone so markup attributes and program text stay byte-exact.
fn smart_quotes(_ctx: &RenderContext, _meta: &Metadata, mut page: Page) -> Result<Page> {
    page.body = curl_quotes(&page.body);
    Ok(page)
}

fn curl_quotes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    let mut code_depth = 0usize;
    let mut prev: Option<char> = None;

    let lower = input.to_ascii_lowercase();
    let mut idx = 0;
    for ch in input.chars() {
        let at = &lower[idx..];
        match ch {
            '<' => {
                in_tag = true;
                if at.starts_with("<pre") || at.starts_with("<code") {
                    code_depth += 1;
                } else if at.starts_with("</pre") || at.starts_with("</code") {
                    code_depth = code_depth.saturating_sub(1);
                }
                out.push(ch);
            }
            '>' if in_tag => {
                in_tag = false;
                out.push(ch);
            }
            '"' if !in_tag && code_depth == 0 => {
                if opens_quote(prev) {
                    out.push('\u{201c}');
                } else {
                    out.push('\u{201d}');
                }
            }
            '\'' if !in_tag && code_depth == 0 => {
                if prev.is_some_and(|p| p.is_alphanumeric()) {
                    // Apostrophe or closing quote, same glyph either way.
                    out.push('\u{2019}');
                } else if opens_quote(prev) {
                    out.push('\u{2018}');
                } else {
                    out.push('\u{2019}');
                }
            }
            _ => out.push(ch),
        }
        prev = Some(ch);
        idx += ch.len_utf8();
    }
    out
}

fn opens_quote(prev: Option<char>) -> bool {
    match prev {
        None | Some('>') => true,
        Some(c) => c.is_whitespace() || matches!(c, '(' | '[' | '{' | '\u{2014}' | '-'),
    }
}
