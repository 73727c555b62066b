//! Run configuration (`ariaprobe.toml`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::dom::Viewport;
use crate::error::{HarnessError, HarnessResult};
use crate::retry::{Backoff, RetryPolicy};
use crate::scenario::LoadOptions;

pub const DEFAULT_CONFIG_FILE: &str = "ariaprobe.toml";

/// Run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RunConfig {
    /// Base URL relative `visit`s are resolved against
    pub base_url: String,

    /// Glob selecting scenario files, relative to the config directory
    pub spec_pattern: String,

    /// Global hooks file, or `false` for none
    pub support_file: SupportFile,

    /// Allow `{{ env.NAME }}` placeholders in scenario files
    pub allow_env: bool,

    /// Accepted for compatibility; recording is not supported
    pub video: bool,

    /// Assertion and readiness budget in ms
    pub default_command_timeout: u64,

    pub page_load_timeout: u64,

    /// Whole-scenario budget in ms
    pub scenario_timeout: Option<u64>,

    /// Retry interval in ms
    pub poll_interval: u64,

    pub backoff: BackoffKind,

    /// Upper bound for exponential backoff in ms
    pub max_poll_interval: u64,

    pub viewport_width: u32,

    pub viewport_height: u32,

    pub test_id_attribute: String,

    /// Site fixture for the simulated browser
    pub site: Option<PathBuf>,

    pub results_dir: PathBuf,

    /// Probe `baseUrl` over HTTP before running
    pub preflight: bool,

    /// Scenarios run concurrently, each in its own session
    pub jobs: usize,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SupportFile {
    Enabled(bool),
    Path(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4173".to_string(),
            spec_pattern: "scenarios/**/*.{yaml,yml}".to_string(),
            support_file: SupportFile::Enabled(false),
            allow_env: false,
            video: false,
            default_command_timeout: 4000,
            page_load_timeout: 60_000,
            scenario_timeout: None,
            poll_interval: 50,
            backoff: BackoffKind::Fixed,
            max_poll_interval: 1000,
            viewport_width: 1000,
            viewport_height: 660,
            test_id_attribute: "data-cy".to_string(),
            site: None,
            results_dir: PathBuf::from("ariaprobe-results"),
            preflight: false,
            jobs: 1,
            root: PathBuf::from("."),
        }
    }
}

impl RunConfig {
    /// Load configuration from file. A missing file yields the defaults,
    /// rooted at the file's directory.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
                .map_err(|e| HarnessError::config(format!("{}: {}", path.display(), e)))?
        } else {
            Self::default()
        };
        config.root = root;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> HarnessResult<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> HarnessResult<()> {
        let url = self.base_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HarnessError::config(format!(
                "baseUrl must be http or https, got {}",
                url
            )));
        }
        if self.spec_pattern.trim().is_empty() {
            return Err(HarnessError::config("specPattern is empty"));
        }
        if self.support_file == SupportFile::Enabled(true) {
            return Err(HarnessError::config(
                "supportFile must be a path or false",
            ));
        }
        if self.default_command_timeout == 0 || self.page_load_timeout == 0 {
            return Err(HarnessError::config("timeouts must be greater than zero"));
        }
        if self.poll_interval == 0 {
            return Err(HarnessError::config("pollInterval must be greater than zero"));
        }
        if self.max_poll_interval < self.poll_interval {
            return Err(HarnessError::config(
                "maxPollInterval must be at least pollInterval",
            ));
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(HarnessError::config("viewport dimensions must be non-zero"));
        }
        if self.test_id_attribute.trim().is_empty() {
            return Err(HarnessError::config("testIdAttribute is empty"));
        }
        if self.jobs == 0 {
            return Err(HarnessError::config("jobs must be at least 1"));
        }
        if self.video {
            warn!("video = true is accepted but recording is not supported");
        }
        Ok(())
    }

    pub fn base_url(&self) -> HarnessResult<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| HarnessError::config(format!("invalid baseUrl {:?}: {}", self.base_url, e)))
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.viewport_width, self.viewport_height)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let interval = Duration::from_millis(self.poll_interval);
        let backoff = match self.backoff {
            BackoffKind::Fixed => Backoff::Fixed(interval),
            BackoffKind::Exponential => Backoff::Exponential {
                initial: interval,
                factor: 2,
                max: Duration::from_millis(self.max_poll_interval),
            },
        };
        RetryPolicy {
            timeout: Duration::from_millis(self.default_command_timeout),
            backoff,
        }
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout)
    }

    pub fn scenario_timeout(&self) -> Option<Duration> {
        self.scenario_timeout.map(Duration::from_millis)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            test_id_attribute: self.test_id_attribute.clone(),
            allow_env: self.allow_env,
        }
    }

    /// Resolve a config-relative path
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn support_path(&self) -> Option<PathBuf> {
        match &self.support_file {
            SupportFile::Path(p) => Some(self.resolve(p)),
            SupportFile::Enabled(_) => None,
        }
    }

    pub fn site_path(&self) -> Option<PathBuf> {
        self.site.as_deref().map(|p| self.resolve(p))
    }

    pub fn results_path(&self) -> PathBuf {
        self.resolve(&self.results_dir)
    }
}
