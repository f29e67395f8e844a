//! Site configuration management for `permafrost.yml`.
//!
//! # Sections
//!
//! | Section   | Purpose                                        |
//! |-----------|------------------------------------------------|
//! | `base`    | Site metadata (title, author, url, since)      |
//! | `build`   | Source roots, template dir, output, ledger     |
//! | `serve`   | Development server (port, interface, watch)    |
//!
//! # Example
//!
//! ```yaml
//! base:
//!   title: My Blog
//!   description: A personal blog
//!   url: https://example.com
//!   since: 2019
//!
//! build:
//!   output: dist
//!   uris: src/urls.txt
//!
//! serve:
//!   port: 8100
//! ```

pub mod defaults;
mod error;

pub use error::ConfigError;

use crate::cli::{Cli, Commands};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing permafrost.yml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// CLI arguments reference
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Basic site information
    #[serde(default)]
    pub base: BaseConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

/// `base` section - basic site metadata.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BaseConfig {
    /// Site title displayed in feeds and page headers.
    pub title: String,

    /// Author name for feeds.
    #[serde(default = "defaults::base::author")]
    #[educe(Default = defaults::base::author())]
    pub author: String,

    /// Author email for feeds.
    #[serde(default = "defaults::base::email")]
    #[educe(Default = defaults::base::email())]
    pub email: String,

    /// Site description for feeds and meta tags.
    pub description: String,

    /// Base URL for absolute links in feeds.
    #[serde(default = "defaults::base::url")]
    #[educe(Default = defaults::base::url())]
    pub url: Option<String>,

    /// BCP 47 language code (e.g., "en-US").
    #[serde(default = "defaults::base::language")]
    #[educe(Default = defaults::base::language())]
    pub language: String,

    /// First year of publication, used for the feed copyright range.
    #[serde(default = "defaults::base::since")]
    #[educe(Default = defaults::base::since())]
    pub since: i32,
}

/// `build` section - paths and build behavior.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root. Set from the CLI, never from the config file.
    #[serde(skip)]
    pub root: Option<PathBuf>,

    /// Source roots scanned for content, relative to the project root.
    #[serde(default = "defaults::build::src")]
    #[educe(Default = defaults::build::src())]
    pub src: Vec<PathBuf>,

    /// Static passthrough assets directory.
    #[serde(default = "defaults::build::public")]
    #[educe(Default = defaults::build::public())]
    pub public: PathBuf,

    /// Directory holding page layouts and `_`-prefixed partials.
    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Output tree for rendered HTML and assets.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// URI stability ledger file. Intended to be checked into source control.
    #[serde(default = "defaults::build::uris")]
    #[educe(Default = defaults::build::uris())]
    pub uris: PathBuf,

    /// Process-wide thumbnail cache directory. Tilde-expanded.
    #[serde(default = "defaults::build::cache_dir")]
    #[educe(Default = defaults::build::cache_dir())]
    pub cache_dir: String,

    /// Clean the output directory completely before building.
    #[serde(default)]
    pub clean: bool,
}

/// `serve` section - development server settings.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// HTTP port number (default: 8100).
    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// Enable file watcher for live reload on changes.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub watch: bool,
}

impl SiteConfig {
    /// Parse configuration from a YAML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = serde_yml::from_str(content).map_err(ConfigError::Yaml)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config = Self::from_str(&content)?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Get the project root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// The thumbnail cache directory with `~` expanded.
    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.build.cache_dir).into_owned())
    }

    /// Source roots resolved against the project root.
    pub fn source_roots(&self) -> Vec<PathBuf> {
        let root = self.get_root();
        self.build.src.iter().map(|p| root.join(p)).collect()
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &'static Cli) {
        self.cli = Some(cli);

        if let Some(root) = &cli.root {
            self.build.root = Some(root.clone());
        }
        if let Some(output) = &cli.output {
            self.build.output = output.clone();
        }

        match &cli.command {
            Commands::Build { build_args } | Commands::Serve { build_args, .. } => {
                if build_args.clean {
                    self.build.clean = true;
                }
            }
            _ => {}
        }

        if let Commands::Serve {
            interface,
            port,
            watch,
            ..
        } = &cli.command
        {
            if let Some(interface) = interface {
                self.serve.interface = interface.clone();
            }
            if let Some(port) = port {
                self.serve.port = *port;
            }
            if let Some(watch) = watch {
                self.serve.watch = *watch;
            }
        }

        // Paths in the config file are relative to the project root.
        let root = self.get_root().to_path_buf();
        self.build.public = root.join(&self.build.public);
        self.build.templates = root.join(&self.build.templates);
        self.build.output = root.join(&self.build.output);
        self.build.uris = root.join(&self.build.uris);
    }

    /// Validate config invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.base.title.is_empty() {
            bail!(ConfigError::Validation("base.title must be set".into()));
        }
        if self.serve.interface.parse::<std::net::IpAddr>().is_err() {
            bail!(ConfigError::Validation(format!(
                "serve.interface `{}` is not an IP address",
                self.serve.interface
            )));
        }
        if self.build.src.is_empty() {
            bail!(ConfigError::Validation(
                "build.src must name at least one source root".into()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config = r#"
base:
  title: Frozen Thoughts
  description: a blog
  author: Alice
  email: alice@example.com
  url: https://example.com
  since: 2019

build:
  src: [src, notes]
  output: out
  uris: src/urls.txt

serve:
  interface: 0.0.0.0
  port: 3000
  watch: false
"#;
        let config = SiteConfig::from_str(config).unwrap();

        assert_eq!(config.base.title, "Frozen Thoughts");
        assert_eq!(config.base.author, "Alice");
        assert_eq!(config.base.since, 2019);
        assert_eq!(config.build.src.len(), 2);
        assert_eq!(config.build.output, PathBuf::from("out"));
        assert_eq!(config.serve.port, 3000);
        assert!(!config.serve.watch);
    }

    #[test]
    fn test_defaults() {
        let config = SiteConfig::from_str("base:\n  title: T\n  description: D\n").unwrap();

        assert_eq!(config.build.src, vec![PathBuf::from("src")]);
        assert_eq!(config.build.output, PathBuf::from("dist"));
        assert_eq!(config.build.uris, PathBuf::from("src/urls.txt"));
        assert_eq!(config.serve.interface, "127.0.0.1");
        assert_eq!(config.serve.port, 8100);
        assert!(config.serve.watch);
    }

    #[test]
    fn test_unknown_field_rejection() {
        let config = "base:\n  title: T\n  description: D\n  unknown_field: x\n";
        assert!(SiteConfig::from_str(config).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_interface() {
        let mut config = SiteConfig::from_str("base:\n  title: T\n  description: D\n").unwrap();
        config.serve.interface = "localhost".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_title() {
        let config = SiteConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cache_dir_expands_tilde() {
        let config = SiteConfig::from_str("base:\n  title: T\n  description: D\n").unwrap();
        let dir = config.cache_dir();
        assert!(!dir.to_string_lossy().contains('~'));
    }
}
