//! File system watcher driving incremental rebuilds.
//!
//! A single thread owns the event loop: notify events are debounced and
//! batched, each surviving path is handed to [`Site::rebuild`], and a
//! browser refresh is broadcast once per batch that rebuilt anything.
//! Running everything through one thread serializes rebuilds, so the site
//! registry never sees concurrent mutation.
//!
//! Failures are graded: an untracked path or a broken document is logged
//! and watching continues; only watcher-infrastructure errors end the loop.

use crate::config::SiteConfig;
use crate::error::SiteError;
use crate::livereload::Reloader;
use crate::log;
use crate::site::Site;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

const DEBOUNCE_MS: u64 = 300;
const REBUILD_COOLDOWN_MS: u64 = 800;

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
        || name.starts_with('#')
}

/// Batches rapid file events with debouncing and rebuild cooldown.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
    last_rebuild: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
            last_rebuild: None,
        }
    }

    fn in_cooldown(&self) -> bool {
        self.last_rebuild
            .is_some_and(|t| t.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS))
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) {
                self.pending.insert(path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        self.pending.drain().collect()
    }

    fn mark_rebuild(&mut self) {
        self.last_rebuild = Some(Instant::now());
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

/// Event paths come in absolute; documents remember the path they were
/// walked at. Make them comparable.
fn normalize(path: &Path) -> PathBuf {
    match std::env::current_dir() {
        Ok(cwd) => path.strip_prefix(&cwd).unwrap_or(path).to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}

/// Rebuild for one batch of changed paths. Returns whether anything was
/// rebuilt, so the caller knows to refresh browsers and start a cooldown.
fn handle_changes(
    paths: &[PathBuf],
    cfg: &'static SiteConfig,
    site: &Mutex<Site>,
) -> bool {
    let mut rebuilt = false;

    for path in paths {
        let path = normalize(path);

        if path == cfg.config_path
            || cfg.config_path.file_name().is_some_and(|n| path.ends_with(n))
        {
            log!("watch"; "config changed, full rebuild");
            match site.lock().build_all() {
                Ok(()) => rebuilt = true,
                Err(err) => log!("error"; "{err:#}"),
            }
            continue;
        }

        match site.lock().rebuild(&path) {
            Ok(()) => rebuilt = true,
            Err(err) => match err.downcast_ref::<SiteError>() {
                Some(SiteError::Untracked { .. }) => log!("watch"; "{err}"),
                Some(SiteError::Transform { .. }) => log!("error"; "{err:#}"),
                _ => log!("error"; "{err:#}"),
            },
        }
    }

    rebuilt
}

fn setup_watchers(watcher: &mut impl Watcher, cfg: &SiteConfig) -> Result<()> {
    let mut watched = Vec::new();
    for root in cfg.source_roots() {
        if root.exists() {
            watcher
                .watch(&root, RecursiveMode::Recursive)
                .with_context(|| format!("cannot watch {}", root.display()))?;
            watched.push(root.display().to_string());
        }
    }
    if cfg.build.public.exists() {
        watcher
            .watch(&cfg.build.public, RecursiveMode::Recursive)
            .with_context(|| format!("cannot watch {}", cfg.build.public.display()))?;
        watched.push(cfg.build.public.display().to_string());
    }
    if cfg.config_path.exists() {
        watcher
            .watch(&cfg.config_path, RecursiveMode::NonRecursive)
            .with_context(|| format!("cannot watch {}", cfg.config_path.display()))?;
        watched.push(cfg.config_path.display().to_string());
    }

    log!("watch"; "watching {}", watched.join(", "));
    Ok(())
}

const fn is_relevant(event: &Event) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
}

/// Start blocking file watcher with debouncing and live rebuild.
pub fn watch_for_changes_blocking(
    cfg: &'static SiteConfig,
    site: Arc<Mutex<Site>>,
    reloader: Reloader,
) -> Result<()> {
    if !cfg.serve.watch {
        return Ok(());
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("cannot create file watcher")?;
    setup_watchers(&mut watcher, cfg)?;

    let mut debouncer = Debouncer::new();

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) && !debouncer.in_cooldown() => {
                debouncer.add(event);
            }
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) if debouncer.ready() => {
                if handle_changes(&debouncer.take(), cfg, &site) {
                    reloader.broadcast();
                    debouncer.mark_rebuild();
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_file_detection() {
        assert!(is_temp_file(Path::new("src/a.md.swp")));
        assert!(is_temp_file(Path::new("src/a.md~")));
        assert!(is_temp_file(Path::new("src/.a.md")));
        assert!(is_temp_file(Path::new("src/#a.md#")));
        assert!(!is_temp_file(Path::new("src/a.md")));
    }

    #[test]
    fn test_debouncer_batches_until_quiet() {
        let mut debouncer = Debouncer::new();
        assert!(!debouncer.ready());

        debouncer.add(
            Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
                .add_path(PathBuf::from("src/a.md"))
                .add_path(PathBuf::from("src/a.md.swp")),
        );
        assert_eq!(debouncer.pending.len(), 1);
        assert!(!debouncer.ready());

        debouncer.last_event = Some(Instant::now() - Duration::from_millis(DEBOUNCE_MS + 1));
        assert!(debouncer.ready());
        assert_eq!(debouncer.take(), vec![PathBuf::from("src/a.md")]);
        assert!(!debouncer.ready());
    }

    #[test]
    fn test_cooldown_suppresses_events() {
        let mut debouncer = Debouncer::new();
        debouncer.mark_rebuild();
        assert!(debouncer.in_cooldown());
        debouncer.last_rebuild =
            Some(Instant::now() - Duration::from_millis(REBUILD_COOLDOWN_MS + 1));
        assert!(!debouncer.in_cooldown());
    }
}
