//! URI stability ledger.
//!
//! Cool URIs don't change. The ledger file records every web path the site
//! has ever published, one per line, and is meant to be committed to source
//! control. After a build, every recorded path must still exist in the
//! output tree; a build that would drop one fails with the full list of
//! casualties. Paths are only ever added, never removed.

use crate::error::SiteError;
use anyhow::{Context, Result};
use std::{
    collections::BTreeSet,
    fs,
    path::Path,
};
use walkdir::WalkDir;

/// Check that every URI the ledger remembers still exists under
/// `output_root`. A missing ledger file means a first build and passes.
pub fn validate(ledger: &Path, output_root: &Path) -> Result<()> {
    let recorded = match fs::read_to_string(ledger) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            // First build: start an empty ledger so it gets committed.
            if let Some(parent) = ledger.parent() {
                fs::create_dir_all(parent).ok();
            }
            fs::write(ledger, "").ok();
            return Ok(());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("cannot read {}", ledger.display()));
        }
    };

    let missing: Vec<String> = recorded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|uri| !output_root.join(uri).exists())
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SiteError::UriRegression { missing }.into())
    }
}

/// Record every file currently under `output_root`, unioned with what the
/// ledger already holds, sorted, one per line. Idempotent.
pub fn save(ledger: &Path, output_root: &Path) -> Result<()> {
    let mut uris: BTreeSet<String> = match fs::read_to_string(ledger) {
        Ok(contents) => contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
        Err(err) => {
            return Err(err).with_context(|| format!("cannot read {}", ledger.display()));
        }
    };

    for entry in WalkDir::new(output_root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let rel = entry
            .path()
            .strip_prefix(output_root)
            .unwrap_or(entry.path());
        uris.insert(rel.to_string_lossy().replace('\\', "/"));
    }

    if let Some(parent) = ledger.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let mut contents = uris.into_iter().collect::<Vec<_>>().join("\n");
    contents.push('\n');
    fs::write(ledger, contents).with_context(|| format!("cannot write {}", ledger.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_ledger_passes_and_starts_empty() {
        let root = tempfile::tempdir().unwrap();
        let dist = root.path().join("dist");
        fs::create_dir_all(&dist).unwrap();
        let ledger = root.path().join("src").join("urls.txt");
        assert!(validate(&ledger, &dist).is_ok());
        assert_eq!(fs::read_to_string(&ledger).unwrap(), "");
    }

    #[test]
    fn test_validate_lists_all_missing() {
        let root = tempfile::tempdir().unwrap();
        let ledger = root.path().join("urls.txt");
        let dist = root.path().join("dist");
        fs::create_dir_all(dist.join("posts")).unwrap();
        fs::write(dist.join("index.html"), "x").unwrap();
        fs::write(&ledger, "index.html\nposts/gone.html\nalso-gone.html\n").unwrap();

        let err = validate(&ledger, &dist).unwrap_err();
        let site_err = err.downcast_ref::<SiteError>().unwrap();
        match site_err {
            SiteError::UriRegression { missing } => {
                assert_eq!(missing, &["posts/gone.html", "also-gone.html"]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_save_unions_and_sorts() {
        let root = tempfile::tempdir().unwrap();
        let ledger = root.path().join("urls.txt");
        let dist = root.path().join("dist");
        fs::create_dir_all(dist.join("sub")).unwrap();
        fs::write(dist.join("b.html"), "x").unwrap();
        fs::write(dist.join("sub").join("a.html"), "x").unwrap();
        fs::write(&ledger, "removed-long-ago.html\n").unwrap();

        save(&ledger, &dist).unwrap();
        let contents = fs::read_to_string(&ledger).unwrap();
        assert_eq!(contents, "b.html\nremoved-long-ago.html\nsub/a.html\n");

        // a second save changes nothing
        save(&ledger, &dist).unwrap();
        assert_eq!(fs::read_to_string(&ledger).unwrap(), contents);
    }
}
