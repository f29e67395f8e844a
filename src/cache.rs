//! Content-hash cache for expensive derived assets.
//!
//! Photograph conversion dominates build time, so each source image's FNV
//! hash is remembered in a `.sum` file under the cache directory. A source
//! whose hash matches its `.sum` file (and whose output still exists) is
//! skipped on the next build.
//!
//! Cache IO never fails a build: an unreadable or unwritable `.sum` file
//! just means the asset counts as stale and gets regenerated.

use crate::log;
use fnv::FnvHasher;
use std::{
    fs,
    hash::Hasher,
    path::{Path, PathBuf},
};

pub struct ThumbnailCache {
    dir: PathBuf,
}

impl ThumbnailCache {
    pub fn new(cache_dir: &Path) -> Self {
        Self { dir: cache_dir.join("generated").join("img") }
    }

    /// Whether `contents` matches the remembered hash for `source`.
    pub fn is_fresh(&self, source: &Path, contents: &[u8]) -> bool {
        match fs::read_to_string(self.sum_path(source)) {
            Ok(recorded) => recorded.trim() == hash(contents),
            Err(_) => false,
        }
    }

    /// Remember the hash of `contents` for `source`.
    pub fn update(&self, source: &Path, contents: &[u8]) {
        let sum_path = self.sum_path(source);
        let result = fs::create_dir_all(&self.dir)
            .and_then(|()| fs::write(&sum_path, hash(contents)));
        if let Err(err) = result {
            log!("warn"; "cannot update cache entry {}: {err}", sum_path.display());
        }
    }

    /// Drop all remembered hashes.
    pub fn clear(&self) {
        if self.dir.is_dir()
            && let Err(err) = fs::remove_dir_all(&self.dir)
        {
            log!("warn"; "cannot clear cache {}: {err}", self.dir.display());
        }
    }

    /// Sum files are keyed by source basename, matching the flat layout of
    /// a photo directory.
    fn sum_path(&self, source: &Path) -> PathBuf {
        let basename = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.dir.join(format!("{basename}.sum"))
    }
}

fn hash(contents: &[u8]) -> String {
    let mut hasher = FnvHasher::default();
    hasher.write(contents);
    hasher.finish().to_string()
}
