//! Top-level build orchestration for the `build`, `freeze` and `clean`
//! commands.

use crate::cache::ThumbnailCache;
use crate::config::SiteConfig;
use crate::log;
use crate::site::Site;
use crate::uris;
use anyhow::{Context, Result};
use std::{fs, time::Instant};

/// Discover and build the whole site. Returns the populated registry so
/// `serve` can keep rebuilding it.
pub fn build_site(cfg: &'static SiteConfig) -> Result<Site> {
    let started = Instant::now();
    let mut site = Site::discover(cfg)?;
    site.build_all()?;
    log!("build"; "done in {:.2?}", started.elapsed());
    Ok(site)
}

/// Build, then commit every published output path to the URI ledger.
pub fn freeze_site(cfg: &'static SiteConfig) -> Result<()> {
    build_site(cfg)?;
    uris::save(&cfg.build.uris, &cfg.build.output)?;
    log!("build"; "froze published paths into {}", cfg.build.uris.display());
    Ok(())
}

/// Delete the output directory and the thumbnail cache.
pub fn clean_site(cfg: &SiteConfig) -> Result<()> {
    if cfg.build.output.is_dir() {
        fs::remove_dir_all(&cfg.build.output)
            .with_context(|| format!("cannot remove {}", cfg.build.output.display()))?;
        log!("build"; "removed {}", cfg.build.output.display());
    }
    ThumbnailCache::new(&cfg.cache_dir()).clear();
    Ok(())
}
