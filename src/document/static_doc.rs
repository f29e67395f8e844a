//! Static passthrough assets: stylesheets, scripts, fonts, favicons.

use crate::document::{Dependency, Document, Metadata};
use crate::site::context::RenderContext;
use anyhow::Result;
use std::{io::Write, path::Path};

pub struct StaticDocument {
    meta: Metadata,
    raw: Vec<u8>,
}

impl StaticDocument {
    /// `web_path` is the path relative to the public root, so nested assets
    /// keep their directory shape in the output tree.
    pub fn new(src: &Path, web_path: String) -> Self {
        let mut meta = Metadata::new(src);
        meta.web_path = web_path;
        meta.layout = None;
        Self { meta, raw: Vec::new() }
    }
}

impl Document for StaticDocument {
    fn load(&mut self, raw: &[u8]) -> Result<()> {
        self.raw = raw.to_vec();
        Ok(())
    }

    fn render(&self, _ctx: &RenderContext, out: &mut dyn Write) -> Result<()> {
        out.write_all(&self.raw)?;
        Ok(())
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;

    #[test]
    fn test_passthrough_bytes() {
        let mut doc = StaticDocument::new(
            Path::new("public/fonts/iosevka.woff2"),
            "fonts/iosevka.woff2".into(),
        );
        doc.load(&[0xde, 0x01]).unwrap();
        let cfg: &'static SiteConfig = Box::leak(Box::new(SiteConfig::default()));
        let ctx = RenderContext::assemble(cfg, Vec::new()).unwrap();
        let mut out = Vec::new();
        doc.render(&ctx, &mut out).unwrap();
        assert_eq!(out, vec![0xde, 0x01]);
        assert_eq!(doc.metadata().web_path, "fonts/iosevka.woff2");
    }
}
