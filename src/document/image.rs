//! Photographs: WebP conversion and power-of-two thumbnail sets.
//!
//! A source photograph renders to a full-size WebP plus a ladder of
//! thumbnails at widths 1, 2, 4, ... strictly below the source width,
//! written to a `thumb/` directory beside the main output. Thumbnail
//! generation is the expensive part of a build, so it is gated by the
//! content-hash cache via [`Document::freshness_key`].

use crate::document::{Dependency, Document, Metadata};
use crate::log;
use crate::site::context::RenderContext;
use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use image::imageops::FilterType;
use rayon::prelude::*;
use std::{fs, io::Write, path::Path};

const WEBP_QUALITY: f32 = 90.0;

pub struct ImageDocument {
    meta: Metadata,
    raw: Vec<u8>,
}

impl ImageDocument {
    pub fn new(src: &Path) -> Self {
        let mut meta = Metadata::new(src);
        // Output is always WebP regardless of the source format. The web
        // path keeps the source's directory shape under the output root.
        let stem = src
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        // Photographs conventionally live in an img/ directory, which the
        // output tree mirrors.
        let dir = src
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|d| d.to_str())
            .filter(|d| *d == "img")
            .map(|d| format!("{d}/"))
            .unwrap_or_default();
        meta.web_path = format!("{dir}{stem}.webp");
        meta.layout = None;
        Self { meta, raw: Vec::new() }
    }

    fn decode(&self) -> Result<DynamicImage> {
        image::load_from_memory(&self.raw)
            .with_context(|| format!("cannot decode {}", self.meta.source_path.display()))
    }
}

impl Document for ImageDocument {
    fn load(&mut self, raw: &[u8]) -> Result<()> {
        self.raw = raw.to_vec();
        Ok(())
    }

    fn render(&self, _ctx: &RenderContext, out: &mut dyn Write) -> Result<()> {
        let img = self.decode()?;
        out.write_all(&encode_webp(&img)?)?;
        Ok(())
    }

    fn render_assets(&self, _ctx: &RenderContext, output_root: &Path) -> Result<()> {
        let img = self.decode()?;
        let (src_w, src_h) = (img.width(), img.height());

        let main = output_root.join(&self.meta.web_path);
        let thumb_dir = main
            .parent()
            .map(|p| p.join("thumb"))
            .ok_or_else(|| anyhow!("output path `{}` has no parent", main.display()))?;
        let stem = main
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        fs::create_dir_all(&thumb_dir)
            .with_context(|| format!("cannot create {}", thumb_dir.display()))?;

        let widths = thumbnail_widths(src_w);
        log!(
            "build";
            "thumbnails for {}: {} sizes",
            self.meta.source_path.display(),
            widths.len()
        );

        widths
            .par_iter()
            .try_for_each(|&w| -> Result<()> {
                let h = thumbnail_height(w, src_w, src_h);
                let thumb = img.resize_exact(w, h, FilterType::CatmullRom);
                let dest = thumb_dir.join(format!("{stem}-{w}.webp"));
                fs::write(&dest, encode_webp(&thumb)?)
                    .with_context(|| format!("cannot write {}", dest.display()))
            })
    }

    fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Path(self.meta.source_path.clone())]
    }

    fn freshness_key(&self) -> Option<&Path> {
        Some(&self.meta.source_path)
    }
}

fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>> {
    let rgba = img.to_rgba8();
    let encoded = webp::Encoder::from_rgba(rgba.as_raw(), img.width(), img.height())
        .encode(WEBP_QUALITY);
    Ok(encoded.to_vec())
}

/// Doubling widths starting at 1, strictly below the source width.
fn thumbnail_widths(src_width: u32) -> Vec<u32> {
    let mut widths = Vec::new();
    let mut w = 1;
    while w < src_width {
        widths.push(w);
        w *= 2;
    }
    widths
}

/// Aspect-preserving height rounded to the nearest even number, never zero.
fn thumbnail_height(width: u32, src_w: u32, src_h: u32) -> u32 {
    let exact = width as f64 * src_h as f64 / src_w as f64;
    let even = ((exact / 2.0).round() as u32) * 2;
    even.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths_double_below_source() {
        assert_eq!(thumbnail_widths(100), vec![1, 2, 4, 8, 16, 32, 64]);
        assert_eq!(thumbnail_widths(64), vec![1, 2, 4, 8, 16, 32]);
        assert_eq!(thumbnail_widths(1), Vec::<u32>::new());
    }

    #[test]
    fn test_height_preserves_aspect_nearest_even() {
        // 3:2 landscape at width 64 is exactly 42.67 high.
        assert_eq!(thumbnail_height(64, 3000, 2000), 42);
        // square stays square when even
        assert_eq!(thumbnail_height(64, 100, 100), 64);
        // never collapses to zero
        assert_eq!(thumbnail_height(1, 4000, 1000), 1);
    }

    #[test]
    fn test_web_path_is_webp() {
        let doc = ImageDocument::new(Path::new("src/img/eclipse.jpg"));
        assert_eq!(doc.metadata().web_path, "img/eclipse.webp");
        assert!(doc.metadata().layout.is_none());
    }

    #[test]
    fn test_render_produces_webp_bytes() {
        let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([10, 20, 30, 255]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let mut doc = ImageDocument::new(Path::new("src/img/dot.png"));
        doc.load(&png).unwrap();
        let cfg: &'static crate::config::SiteConfig =
            Box::leak(Box::new(crate::config::SiteConfig::default()));
        let ctx = RenderContext::assemble(cfg, Vec::new()).unwrap();
        let mut out = Vec::new();
        doc.render(&ctx, &mut out).unwrap();
        assert_eq!(&out[..4], b"RIFF");
        assert_eq!(&out[8..12], b"WEBP");
    }
}
