//! RSS and Atom feed generation.
//!
//! Both feeds carry the same set of items: every post, newest first, with
//! its pipeline-transformed body as content. Written to `feed.rss` and
//! `feed.atom` at the output root on every full build.

use crate::document::Document;
use crate::log;
use crate::site::context::RenderContext;
use anyhow::{Context, Result};
use atom_syndication as atom;
use chrono::{Datelike, Utc};
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder};
use std::{fs, path::Path};

struct FeedItem {
    title: String,
    link: String,
    body: String,
    published: Option<chrono::DateTime<Utc>>,
}

/// Write `feed.rss` and `feed.atom` under `output_root`.
pub fn write_feeds<'a>(
    ctx: &RenderContext,
    docs: impl Iterator<Item = &'a dyn Document>,
    output_root: &Path,
) -> Result<()> {
    let base = ctx.cfg.base.url.clone().unwrap_or_default();
    let base = base.trim_end_matches('/');

    let mut items = Vec::new();
    for doc in docs {
        let meta = doc.metadata();
        if !meta.is_post() {
            continue;
        }
        let Some(body) = doc.feed_html(ctx)? else {
            continue;
        };
        items.push(FeedItem {
            title: meta.title.clone(),
            link: format!("{base}/{}", meta.web_path),
            body,
            published: meta.created_at,
        });
    }

    fs::create_dir_all(output_root)
        .with_context(|| format!("cannot create {}", output_root.display()))?;
    fs::write(output_root.join("feed.rss"), rss_feed(ctx, &items))?;
    fs::write(output_root.join("feed.atom"), atom_feed(ctx, &items))?;
    log!("build"; "wrote feeds with {} items", items.len());
    Ok(())
}

fn copyright(ctx: &RenderContext) -> String {
    let start = ctx.cfg.base.since;
    let now = ctx.now.year();
    if start < now {
        format!("Copyright {start}-{now} {}", ctx.cfg.base.author)
    } else {
        format!("Copyright {now} {}", ctx.cfg.base.author)
    }
}

fn rss_feed(ctx: &RenderContext, items: &[FeedItem]) -> String {
    let rss_items: Vec<rss::Item> = items
        .iter()
        .map(|item| {
            ItemBuilder::default()
                .title(Some(item.title.clone()))
                .link(Some(item.link.clone()))
                .guid(Some(
                    GuidBuilder::default()
                        .value(item.link.clone())
                        .permalink(true)
                        .build(),
                ))
                .pub_date(item.published.map(|d| d.to_rfc2822()))
                .content(Some(item.body.clone()))
                .build()
        })
        .collect();

    let channel = ChannelBuilder::default()
        .title(ctx.cfg.base.title.clone())
        .link(ctx.cfg.base.url.clone().unwrap_or_default())
        .description(ctx.cfg.base.description.clone())
        .language(Some(ctx.cfg.base.language.clone()))
        .copyright(Some(copyright(ctx)))
        .last_build_date(Some(ctx.now.to_rfc2822()))
        .items(rss_items)
        .build();
    channel.to_string()
}

fn atom_feed(ctx: &RenderContext, items: &[FeedItem]) -> String {
    let entries: Vec<atom::Entry> = items
        .iter()
        .map(|item| {
            atom::EntryBuilder::default()
                .title(atom::Text::plain(item.title.clone()))
                .id(item.link.clone())
                .links(vec![
                    atom::LinkBuilder::default().href(item.link.clone()).build(),
                ])
                .updated(item.published.unwrap_or(ctx.now).fixed_offset())
                .content(Some(
                    atom::ContentBuilder::default()
                        .value(Some(item.body.clone()))
                        .content_type(Some("html".to_string()))
                        .build(),
                ))
                .build()
        })
        .collect();

    let feed = atom::FeedBuilder::default()
        .title(atom::Text::plain(ctx.cfg.base.title.clone()))
        .id(ctx.cfg.base.url.clone().unwrap_or_default())
        .updated(ctx.now.fixed_offset())
        .authors(vec![
            atom::PersonBuilder::default()
                .name(ctx.cfg.base.author.clone())
                .email(Some(ctx.cfg.base.email.clone()))
                .build(),
        ])
        .rights(Some(atom::Text::plain(copyright(ctx))))
        .entries(entries)
        .build();
    feed.to_string()
}
