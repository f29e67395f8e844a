//! The site registry and build orchestration.
//!
//! [`Site`] owns every discovered document and knows how to build all of
//! them, or to rebuild the smallest correct set after a single file change.
//! Rebuild selection is deliberate about its blast radius:
//!
//! 1. the changed file's own document,
//! 2. documents that declared a path dependency on the changed file,
//! 3. post-listing documents, when the changed document is a post,
//! 4. every laid-out document, when a template changed.
//!
//! Path dependencies resolve one hop only, and the changed file itself
//! need not be a document for its dependents to rebuild. A change to a
//! file nobody tracks or depends on triggers a single rediscovery pass
//! before giving up with [`SiteError::Untracked`].

pub mod context;
pub mod discover;

use crate::cache::ThumbnailCache;
use crate::config::SiteConfig;
use crate::document::{Dependency, Document};
use crate::error::SiteError;
use crate::log;
use crate::site::context::{GalleryEntry, PostEntry, RenderContext};
use crate::{feed, uris};
use anyhow::Result;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Component, Path, PathBuf},
};

pub struct Site {
    cfg: &'static SiteConfig,
    cache: ThumbnailCache,
    docs: Vec<Box<dyn Document>>,
}

impl Site {
    /// Discover all content under the configured roots.
    pub fn discover(cfg: &'static SiteConfig) -> Result<Self> {
        let mut site = Self {
            cfg,
            cache: ThumbnailCache::new(&cfg.cache_dir()),
            docs: Vec::new(),
        };
        for doc in discover::discover(cfg)? {
            site.add(doc);
        }
        log!("build"; "tracking {} documents", site.docs.len());
        Ok(site)
    }

    /// Register a document. A document with the same source path is
    /// replaced, never duplicated; ordering by creation date (newest
    /// first) is restored afterwards.
    pub fn add(&mut self, doc: Box<dyn Document>) {
        let source = doc.metadata().source_path.clone();
        self.docs.retain(|d| d.metadata().source_path != source);
        self.docs.push(doc);
        self.docs.sort_by(|a, b| {
            let (ma, mb) = (a.metadata(), b.metadata());
            mb.created_at
                .cmp(&ma.created_at)
                .then_with(|| ma.web_path.cmp(&mb.web_path))
        });
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Load every document, render everything, then check the output tree
    /// against the URI ledger.
    pub fn build_all(&mut self) -> Result<()> {
        if self.cfg.build.clean && self.cfg.build.output.is_dir() {
            fs::remove_dir_all(&self.cfg.build.output)?;
        }

        for idx in 0..self.docs.len() {
            self.load_doc(idx)?;
        }
        self.infer_parents();
        self.check_collisions()?;

        let ctx = self.context()?;
        self.docs
            .par_iter()
            .try_for_each(|doc| self.render_doc(&ctx, doc.as_ref()))?;

        feed::write_feeds(&ctx, self.documents(), &self.cfg.build.output)?;
        uris::validate(&self.cfg.build.uris, &self.cfg.build.output)?;

        log!("build"; "rendered {} documents into {}", self.docs.len(), self.cfg.build.output.display());
        Ok(())
    }

    /// Rebuild everything a single changed file can influence.
    pub fn rebuild(&mut self, changed: &Path) -> Result<()> {
        if is_under(changed, &self.cfg.build.templates) {
            return self.rebuild_laid_out();
        }

        let mut idx = self.index_for(changed);
        if idx.is_none() && self.rebuild_targets(None, changed).is_empty() {
            // A file nobody tracks or depends on. Rediscover once; it may
            // be brand new.
            for doc in discover::discover(self.cfg)? {
                if self.index_for(&doc.metadata().source_path).is_none() {
                    self.add(doc);
                }
            }
            idx = self.index_for(changed);
        }

        if let Some(idx) = idx {
            self.load_doc(idx)?;
            self.infer_parents();
            self.check_collisions()?;
        }

        // The changed file itself may not be a document; its declared
        // dependents still rebuild.
        let targets = self.rebuild_targets(self.index_for(changed), changed);
        if targets.is_empty() {
            return Err(SiteError::Untracked { path: changed.to_path_buf() }.into());
        }

        let ctx = self.context()?;
        for &i in &targets {
            self.render_doc(&ctx, self.docs[i].as_ref())?;
        }
        log!("build"; "rebuilt {} documents for {}", targets.len(), changed.display());
        Ok(())
    }

    /// Indices to re-render for a change: the changed file's own document
    /// (if any), every document with a path dependency on the changed file,
    /// and post-listing documents when the change is to a post.
    fn rebuild_targets(&self, direct: Option<usize>, changed: &Path) -> Vec<usize> {
        let direct_meta = direct.map(|i| self.docs[i].metadata());
        let is_post = direct_meta.is_some_and(|m| m.is_post());
        self.docs
            .iter()
            .enumerate()
            .filter(|(i, doc)| {
                Some(*i) == direct
                    || doc.dependencies().iter().any(|dep| match dep {
                        Dependency::Path(p) => {
                            matches_source(p, changed)
                                || direct_meta
                                    .is_some_and(|m| matches_source(p, &m.source_path))
                        }
                        Dependency::AnyPost => is_post,
                    })
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Fresh context for rendering: reloads templates, the post listing
    /// and the photograph listing.
    pub fn context(&self) -> Result<RenderContext> {
        Ok(RenderContext::assemble(self.cfg, self.post_entries())?
            .with_images(self.gallery_entries()))
    }

    /// A template changed: every document that executes a layout (or is
    /// itself a template page) is rendered again against fresh templates.
    fn rebuild_laid_out(&mut self) -> Result<()> {
        let ctx = self.context()?;
        let mut count = 0;
        for doc in &self.docs {
            let meta = doc.metadata();
            let uses_templates = meta.layout.is_some()
                || meta.source_path.extension().and_then(|e| e.to_str()) == Some("tmpl");
            if uses_templates {
                self.render_doc(&ctx, doc.as_ref())?;
                count += 1;
            }
        }
        log!("build"; "template change, rebuilt {count} documents");
        Ok(())
    }

    fn index_for(&self, changed: &Path) -> Option<usize> {
        self.docs
            .iter()
            .position(|d| matches_source(&d.metadata().source_path, changed))
    }

    fn load_doc(&mut self, idx: usize) -> Result<()> {
        let source = self.docs[idx].metadata().source_path.clone();
        let raw = fs::read(&source).map_err(|err| SiteError::Transform {
            path: source.clone(),
            step: "read".into(),
            source: err.into(),
        })?;
        self.docs[idx].load(&raw).map_err(|err| {
            SiteError::Transform { path: source, step: "load".into(), source: err }.into()
        })
    }

    /// Naming convention parenthood: `essay_notes.html` is a child of
    /// `essay.html` when that document exists. Explicit frontmatter wins.
    fn infer_parents(&mut self) {
        let known: FxHashSet<String> =
            self.docs.iter().map(|d| d.metadata().web_path.clone()).collect();
        for doc in &mut self.docs {
            let meta = doc.metadata_mut();
            if meta.parent.is_some() {
                continue;
            }
            let Some(stem) = meta.web_path.strip_suffix(".html") else {
                continue;
            };
            let Some((prefix, _)) = stem.split_once('_') else {
                continue;
            };
            let candidate = format!("{prefix}.html");
            if candidate != meta.web_path && known.contains(&candidate) {
                meta.parent = Some(candidate);
            }
        }
    }

    /// Exactly one document may claim each output path.
    fn check_collisions(&self) -> Result<()> {
        let mut seen: FxHashMap<&str, &Path> = FxHashMap::default();
        for doc in &self.docs {
            let meta = doc.metadata();
            if let Some(first) = seen.insert(&meta.web_path, &meta.source_path) {
                return Err(SiteError::OutputCollision {
                    web_path: meta.web_path.clone(),
                    first: first.to_path_buf(),
                    second: meta.source_path.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn render_doc(&self, ctx: &RenderContext, doc: &dyn Document) -> Result<()> {
        let meta = doc.metadata();
        let out_path = self.cfg.build.output.join(&meta.web_path);

        // Hash-gated documents are skipped when their source is unchanged
        // and the output is still on disk.
        let fresh_raw = match doc.freshness_key() {
            Some(key) => {
                let raw = fs::read(key).map_err(|err| SiteError::Transform {
                    path: key.to_path_buf(),
                    step: "read".into(),
                    source: err.into(),
                })?;
                if self.cache.is_fresh(key, &raw) && out_path.exists() {
                    log!("build"; "{} unchanged, skipping", meta.source_path.display());
                    return Ok(());
                }
                Some(raw)
            }
            None => None,
        };

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(&out_path)?;
        let mut writer = BufWriter::new(file);
        doc.render(ctx, &mut writer).map_err(|err| SiteError::Transform {
            path: meta.source_path.clone(),
            step: "render".into(),
            source: err,
        })?;
        writer.flush()?;

        doc.render_assets(ctx, &self.cfg.build.output)?;
        if let (Some(key), Some(raw)) = (doc.freshness_key(), fresh_raw) {
            self.cache.update(key, &raw);
        }
        Ok(())
    }

    fn post_entries(&self) -> Vec<PostEntry> {
        self.docs
            .iter()
            .map(|d| d.metadata())
            .filter(|m| m.is_post())
            .map(|m| PostEntry {
                title: m.title.clone(),
                web_path: m.web_path.clone(),
                category: m.category.clone(),
                preview: m.preview.clone(),
                date: m.created_at.map(|d| d.format("%Y-%m-%d").to_string()),
                created_at: m.created_at,
                updated_at: m.updated_at,
            })
            .collect()
    }

    /// Every tracked photograph, for gallery pages.
    fn gallery_entries(&self) -> Vec<GalleryEntry> {
        self.docs
            .iter()
            .map(|d| d.metadata())
            .filter(|m| {
                m.source_path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
            })
            .map(|m| {
                let (dir, file) = m
                    .web_path
                    .rsplit_once('/')
                    .unwrap_or(("", m.web_path.as_str()));
                let stem = file.strip_suffix(".webp").unwrap_or(file);
                let thumb_prefix = if dir.is_empty() {
                    format!("thumb/{stem}")
                } else {
                    format!("{dir}/thumb/{stem}")
                };
                GalleryEntry {
                    web_path: m.web_path.clone(),
                    thumb_prefix,
                    dir: dir.to_string(),
                }
            })
            .collect()
    }

    /// Documents that carry a feed-worthy body, newest first.
    pub fn documents(&self) -> impl Iterator<Item = &dyn Document> {
        self.docs.iter().map(|d| d.as_ref())
    }
}

/// Equality tolerant of one side being absolute: watcher events carry
/// absolute paths while documents remember the path they were walked at.
fn matches_source(doc_path: &Path, changed: &Path) -> bool {
    doc_path == changed || changed.ends_with(doc_path) || doc_path.ends_with(changed)
}

/// Containment check with the same tolerance, over components: `.` segments
/// are dropped from both sides first, since config paths often carry a
/// leading `./` that watcher events do not.
pub(crate) fn is_under(path: &Path, dir: &Path) -> bool {
    let strip = |p: &Path| -> PathBuf {
        p.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    };
    let dir = strip(dir);
    if dir.as_os_str().is_empty() {
        return false;
    }
    strip(path).ancestors().any(|a| a.ends_with(&dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Kind, MarkdownDocument};
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn leaked(cfg: SiteConfig) -> &'static SiteConfig {
        Box::leak(Box::new(cfg))
    }

    fn site_in(root: &Path) -> Site {
        let mut cfg = SiteConfig::default();
        cfg.build.root = Some(root.to_path_buf());
        cfg.build.src = vec![PathBuf::from("src")];
        cfg.build.public = root.join("public");
        cfg.build.templates = root.join("src").join("templates");
        cfg.build.output = root.join("dist");
        cfg.build.uris = root.join("urls.txt");
        cfg.build.cache_dir = root.join("cache").to_string_lossy().into_owned();
        Site::discover(leaked(cfg)).unwrap()
    }

    fn doc_with_date(src: &str, date: Option<(i32, u32, u32)>) -> Box<dyn Document> {
        let mut doc = MarkdownDocument::new(Path::new(src));
        doc.metadata_mut().created_at =
            date.map(|(y, m, d)| Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap());
        Box::new(doc)
    }

    /// A markdown page that also declares a dependency on a data file it
    /// renders from, the way a generated listing page would.
    struct SummaryDoc {
        inner: MarkdownDocument,
        data: PathBuf,
    }

    impl Document for SummaryDoc {
        fn load(&mut self, raw: &[u8]) -> anyhow::Result<()> {
            self.inner.load(raw)
        }

        fn render(&self, ctx: &RenderContext, out: &mut dyn Write) -> anyhow::Result<()> {
            self.inner.render(ctx, out)
        }

        fn metadata(&self) -> &crate::document::Metadata {
            self.inner.metadata()
        }

        fn metadata_mut(&mut self) -> &mut crate::document::Metadata {
            self.inner.metadata_mut()
        }

        fn dependencies(&self) -> Vec<Dependency> {
            let mut deps = self.inner.dependencies();
            deps.push(Dependency::Path(self.data.clone()));
            deps
        }
    }

    fn write_png(path: &Path, shade: u8) {
        let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([shade, 64, 128, 255]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        std::fs::write(path, png).unwrap();
    }

    #[test]
    fn test_add_dedupes_by_source_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut site = site_in(dir.path());
        site.add(doc_with_date("src/a.md", None));
        site.add(doc_with_date("src/a.md", Some((2023, 1, 1))));
        assert_eq!(site.len(), 1);
    }

    #[test]
    fn test_add_sorts_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut site = site_in(dir.path());
        site.add(doc_with_date("src/old.md", Some((2020, 1, 1))));
        site.add(doc_with_date("src/new.md", Some((2024, 1, 1))));
        site.add(doc_with_date("src/undated.md", None));
        let order: Vec<String> = site
            .documents()
            .map(|d| d.metadata().web_path.clone())
            .collect();
        assert_eq!(order, ["new.html", "old.html", "undated.html"]);
    }

    #[test]
    fn test_collision_detection_names_both() {
        let dir = tempfile::tempdir().unwrap();
        let mut site = site_in(dir.path());
        site.add(doc_with_date("src/cold/hello.md", None));
        site.add(doc_with_date("src/warm/hello.md", None));
        let err = site.check_collisions().unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("src/cold/hello.md"));
        assert!(msg.contains("src/warm/hello.md"));
    }

    #[test]
    fn test_rebuild_untracked_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let mut site = site_in(dir.path());
        let err = site.rebuild(&dir.path().join("src").join("nope.txt")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SiteError>(),
            Some(SiteError::Untracked { .. })
        ));
    }

    #[test]
    fn test_rebuild_picks_up_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        let mut site = site_in(dir.path());
        assert!(site.is_empty());

        let new_file = src.join("fresh.md");
        std::fs::write(&new_file, "# Fresh\n").unwrap();
        site.rebuild(&new_file).unwrap();
        assert_eq!(site.len(), 1);
        assert!(site.cfg.build.output.join("fresh.html").is_file());
    }

    #[test]
    fn test_full_build_renders_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(
            src.join("hello.md"),
            "---\ntype: post\ndate: 2023-04-01\n---\n# Hello\n\nWorld.\n",
        )
        .unwrap();

        let mut site = site_in(dir.path());
        site.build_all().unwrap();

        let html =
            std::fs::read_to_string(dir.path().join("dist").join("hello.html")).unwrap();
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("World."));
        assert!(dir.path().join("dist").join("feed.rss").is_file());
        assert!(dir.path().join("dist").join("feed.atom").is_file());
    }

    #[test]
    fn test_post_change_rebuilds_listing_page() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(
            src.join("post.md"),
            "---\ntype: post\ndate: 2023-04-01\ntitle: A Post\n---\nbody\n",
        )
        .unwrap();
        std::fs::write(
            src.join("index.html.tmpl"),
            "---\ntype: page\nposts: true\nlayout: \"\"\n---\n{% for p in posts %}{{ p.title }}{% endfor %}",
        )
        .unwrap();

        let mut site = site_in(dir.path());
        site.build_all().unwrap();

        std::fs::write(
            src.join("post.md"),
            "---\ntype: post\ndate: 2023-04-01\ntitle: Renamed\n---\nbody\n",
        )
        .unwrap();
        site.rebuild(&src.join("post.md")).unwrap();

        let index =
            std::fs::read_to_string(dir.path().join("dist").join("index.html")).unwrap();
        assert!(index.contains("Renamed"));
    }

    #[test]
    fn test_is_under_ignores_dot_segments() {
        assert!(is_under(Path::new("src/templates/a.tmpl"), Path::new("./src/templates")));
        assert!(is_under(Path::new("/site/src/templates/a.tmpl"), Path::new("src/templates")));
        assert!(!is_under(Path::new("src/pages/a.md"), Path::new("./src/templates")));
    }

    #[test]
    fn test_template_change_detected_despite_dot_segment_in_config() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("templates")).unwrap();
        std::fs::write(src.join("page.md"), "---\nlayout: wrap.html.tmpl\n---\n# Hi\n")
            .unwrap();
        std::fs::write(src.join("templates").join("wrap.html.tmpl"), "<main>{{ body }}</main>")
            .unwrap();

        let mut cfg = SiteConfig::default();
        cfg.build.root = Some(dir.path().to_path_buf());
        cfg.build.src = vec![PathBuf::from("src")];
        cfg.build.public = dir.path().join("public");
        // hand-written configs routinely spell the dir as "./src/templates"
        cfg.build.templates = dir.path().join("src").join(".").join("templates");
        cfg.build.output = dir.path().join("dist");
        cfg.build.uris = dir.path().join("urls.txt");
        cfg.build.cache_dir = dir.path().join("cache").to_string_lossy().into_owned();

        let mut site = Site::discover(leaked(cfg)).unwrap();
        assert_eq!(site.len(), 1);
        site.build_all().unwrap();

        std::fs::write(
            src.join("templates").join("wrap.html.tmpl"),
            "<article>{{ body }}</article>",
        )
        .unwrap();
        site.rebuild(&src.join("templates").join("wrap.html.tmpl")).unwrap();

        let html =
            std::fs::read_to_string(dir.path().join("dist").join("page.html")).unwrap();
        assert!(html.contains("<article>"));
    }

    #[test]
    fn test_change_to_declared_data_file_rebuilds_dependent() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("report.md"), "# Report\n").unwrap();
        let data = src.join("figures.txt");
        std::fs::write(&data, "1 2 3\n").unwrap();

        let mut site = site_in(dir.path());
        site.add(Box::new(SummaryDoc {
            inner: MarkdownDocument::new(&src.join("report.md")),
            data: data.clone(),
        }));
        site.build_all().unwrap();

        let out = dir.path().join("dist").join("report.html");
        std::fs::remove_file(&out).unwrap();
        site.rebuild(&data).unwrap();
        assert!(out.is_file());
    }

    #[test]
    fn test_unchanged_image_skips_thumbnail_regeneration() {
        let dir = tempfile::tempdir().unwrap();
        let img_dir = dir.path().join("src").join("img");
        std::fs::create_dir_all(&img_dir).unwrap();
        write_png(&img_dir.join("pic.png"), 10);

        let mut site = site_in(dir.path());
        site.build_all().unwrap();

        let thumb_dir = dir.path().join("dist").join("img").join("thumb");
        for w in [1u32, 2, 4] {
            assert!(thumb_dir.join(format!("pic-{w}.webp")).is_file());
        }

        // a skipped render must leave planted markers alone
        let marker = thumb_dir.join("pic-1.webp");
        std::fs::write(&marker, b"untouched").unwrap();
        site.build_all().unwrap();
        assert_eq!(std::fs::read(&marker).unwrap(), b"untouched");

        write_png(&img_dir.join("pic.png"), 200);
        site.build_all().unwrap();
        assert_ne!(std::fs::read(&marker).unwrap(), b"untouched");
        for w in [1u32, 2, 4] {
            assert!(thumb_dir.join(format!("pic-{w}.webp")).is_file());
        }
    }

    #[test]
    fn test_parent_inference_from_stem() {
        let dir = tempfile::tempdir().unwrap();
        let mut site = site_in(dir.path());
        site.add(doc_with_date("src/essay.md", None));
        site.add(doc_with_date("src/essay_notes.md", None));
        site.add(doc_with_date("src/orphan_notes.md", None));
        site.infer_parents();

        let parent_of = |web: &str| {
            site.documents()
                .find(|d| d.metadata().web_path == web)
                .unwrap()
                .metadata()
                .parent
                .clone()
        };
        assert_eq!(parent_of("essay_notes.html").as_deref(), Some("essay.html"));
        assert_eq!(parent_of("orphan_notes.html"), None);
        assert_eq!(parent_of("essay.html"), None);
    }

    #[test]
    fn test_kind_enum_roundtrip() {
        // rediscovery replaces a document wholesale, so a kind change is
        // just a replacement
        let dir = tempfile::tempdir().unwrap();
        let mut site = site_in(dir.path());
        let mut doc = MarkdownDocument::new(Path::new("src/a.md"));
        doc.metadata_mut().kind = Kind::Post;
        site.add(Box::new(doc));
        site.add(doc_with_date("src/a.md", None));
        assert_eq!(site.documents().next().unwrap().metadata().kind, Kind::Draft);
    }
}
