//! CLI Commands

pub mod check;
pub mod list;
pub mod run;

use std::path::{Path, PathBuf};

use ariaprobe_harness::{HarnessError, HarnessResult, RunConfig, Site};
use clap::Args;

/// Settings that override the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Base URL relative visits resolve against
    #[arg(long, env = "ARIAPROBE_BASE_URL")]
    pub base_url: Option<String>,

    /// Scenario glob, relative to the configuration directory
    #[arg(long, env = "ARIAPROBE_SPEC")]
    pub spec: Option<String>,

    /// Site fixture for the simulated browser
    #[arg(long, env = "ARIAPROBE_SITE")]
    pub site: Option<PathBuf>,
}

/// Load the configuration file, apply overrides and validate
pub fn load_config(path: &Path, overrides: &Overrides) -> HarnessResult<RunConfig> {
    let mut config = RunConfig::load(path)?;

    if let Some(base_url) = &overrides.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(spec) = &overrides.spec {
        config.spec_pattern = spec.clone();
    }
    if let Some(site) = &overrides.site {
        config.site = Some(if site.is_absolute() {
            site.clone()
        } else {
            std::env::current_dir()?.join(site)
        });
    }

    config.validate()?;
    Ok(config)
}

pub fn load_site(config: &RunConfig) -> HarnessResult<Site> {
    let path = config.site_path().ok_or_else(|| {
        HarnessError::config("no site fixture configured (set `site` in the config or pass --site)")
    })?;
    Site::from_file(&path)
}
