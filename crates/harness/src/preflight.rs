//! Target reachability check before any scenario runs

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};
use url::Url;

use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Clone)]
pub struct PreflightConfig {
    /// Total time to keep probing
    pub timeout: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    pub interval: Duration,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(2),
            interval: Duration::from_millis(100),
        }
    }
}

/// Wait until `base_url` answers HTTP. Any response counts, error statuses
/// included: the server is up, and navigation reports page-level failures.
pub async fn wait_for_target(base_url: &Url, config: &PreflightConfig) -> HarnessResult<()> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(base_url.clone()).send().await {
            Ok(resp) => {
                if !resp.status().is_success() {
                    warn!("Preflight: {} returned {}", base_url, resp.status());
                }
                info!("Target {} is reachable", base_url);
                return Ok(());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} to respond...", base_url);
                }
                // Connection refused is expected while the target starts
                if !e.is_connect() {
                    warn!("Preflight error: {}", e);
                }
            }
        }

        if start.elapsed() >= config.timeout {
            break;
        }
        sleep(config.interval).await;
    }

    Err(HarnessError::TargetUnreachable {
        url: base_url.to_string(),
        attempts,
    })
}
