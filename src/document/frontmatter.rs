//! YAML frontmatter extraction.
//!
//! A text source may start with a `---` delimited YAML block:
//!
//! ```text
//! ---
//! type: post
//! date: 2023-04-01
//! ---
//! body...
//! ```
//!
//! Extraction is idempotent: a body that has already been stripped (or never
//! had frontmatter) passes through unchanged with default metadata, which
//! lets chained document variants each call [`extract`] safely.

use crate::document::Kind;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Parsed frontmatter fields. All optional; `type` defaults to draft.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrontMatter {
    #[serde(default, rename = "type")]
    pub kind: Kind,

    /// Explicit output path override, relative to the site root.
    pub filename: Option<String>,

    pub title: Option<String>,

    #[serde(default, deserialize_with = "flexible_date")]
    pub date: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "flexible_date")]
    pub updated: Option<DateTime<Utc>>,

    #[serde(default)]
    pub toc: bool,

    pub category: Option<String>,

    /// Filename component of another document this one is a child of.
    /// Parenthood is purely semantic and is not guaranteed to resolve.
    pub parent: Option<String>,

    pub preview: Option<String>,

    /// Layout template override, relative to the template directory.
    pub layout: Option<String>,

    /// Declares that this page lists posts. Any post changing triggers a
    /// rebuild of this page, and the post listing is injected into its
    /// template variables.
    #[serde(default)]
    pub posts: bool,
}

/// Split a source file into frontmatter and body.
///
/// Returns default frontmatter and the input unchanged when no `---` block
/// leads the file. An unterminated or unparseable block is an error.
pub fn extract(raw: &str) -> Result<(FrontMatter, String)> {
    let Some(rest) = raw.strip_prefix("---\n").or_else(|| raw.strip_prefix("---\r\n")) else {
        return Ok((FrontMatter::default(), raw.to_string()));
    };

    let (block, body) = match rest.find("\n---") {
        Some(idx) => {
            let block = &rest[..idx];
            let after = &rest[idx + "\n---".len()..];
            let body = after.strip_prefix('\n').unwrap_or(after);
            (block, body)
        }
        None => anyhow::bail!("unterminated frontmatter block"),
    };

    let meta: FrontMatter =
        serde_yml::from_str(block).context("cannot parse frontmatter")?;
    Ok((meta, body.to_string()))
}

/// Accept RFC 3339 (`2023-04-01T12:00:00Z`), a date-and-time
/// (`2023-04-01 12:00:00`), or a bare date (`2023-04-01`).
fn flexible_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_date(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("unparseable timestamp `{raw}`")))
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}
