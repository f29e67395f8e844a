//! Permafrost - an incremental static site generator.

mod build;
mod cache;
mod cli;
mod config;
mod document;
mod error;
mod feed;
mod livereload;
mod logger;
mod serve;
mod site;
mod transform;
mod uris;
mod watch;

use anyhow::{Result, bail};
use build::{build_site, clean_site, freeze_site};
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use parking_lot::Mutex;
use serve::serve_site;
use std::{path::Path, sync::Arc};

fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    let config: &'static SiteConfig = Box::leak(Box::new(load_config(cli)?));

    match &cli.command {
        Commands::Build { .. } => build_site(config).map(|_| ()),
        Commands::Serve { .. } => {
            let site = Arc::new(Mutex::new(build_site(config)?));
            serve_site(config, site)
        }
        Commands::Freeze => freeze_site(config),
        Commands::Clean => clean_site(config),
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &'static Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    let mut config = if config_path.exists() {
        SiteConfig::from_path(&config_path)?
    } else if cli.is_build() || cli.is_serve() || cli.is_freeze() {
        bail!("config file {} not found", config_path.display());
    } else {
        SiteConfig::default()
    };
    config.update_with_cli(cli);
    if cli.is_build() || cli.is_serve() || cli.is_freeze() {
        config.validate()?;
    }

    Ok(config)
}
