//! Viewport and navigation control for one session

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};
use url::Url;

use crate::dom::Viewport;
use crate::driver::{Driver, ReadyState};
use crate::error::{HarnessError, HarnessResult};

/// A driver session bound to a base URL
pub struct Session<D: Driver> {
    driver: D,
    base_url: Url,
    page_load_timeout: Duration,
    poll_interval: Duration,
    viewport: Viewport,
}

impl<D: Driver> Session<D> {
    pub const DEFAULT_PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(driver: D, base_url: Url, viewport: Viewport) -> Self {
        Self {
            driver,
            base_url,
            page_load_timeout: Self::DEFAULT_PAGE_LOAD_TIMEOUT,
            poll_interval: Duration::from_millis(50),
            viewport,
        }
    }

    pub fn with_page_load_timeout(mut self, timeout: Duration) -> Self {
        self.page_load_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn driver(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `target` against the base URL. Absolute URLs pass through.
    pub fn resolve_url(&self, target: &str) -> HarnessResult<Url> {
        match Url::parse(target) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(self.base_url.join(target)?),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn set_viewport(&mut self, viewport: Viewport) -> HarnessResult<()> {
        self.driver.set_viewport(viewport).await?;
        self.viewport = viewport;
        Ok(())
    }

    /// Load `target` and wait for the document to report ready
    pub async fn visit(&mut self, target: &str) -> HarnessResult<Url> {
        let url = self.resolve_url(target)?;
        info!("Visiting {}", url);

        self.driver.navigate(&url).await?;

        let start = Instant::now();
        loop {
            let snapshot = self.driver.snapshot().await?;
            if snapshot.ready == ReadyState::Complete {
                debug!("{} ready after {} ms", url, start.elapsed().as_millis());
                return Ok(url);
            }
            if start.elapsed() >= self.page_load_timeout {
                return Err(HarnessError::NavigationFailure {
                    url: url.to_string(),
                    reason: format!(
                        "page did not finish loading within {} ms",
                        self.page_load_timeout.as_millis()
                    ),
                });
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimulatedBrowser, Site};
    use std::sync::Arc;

    const SITE: &str = r#"
pages:
  - path: /
    load_ms: 400
  - path: /slow
    load_ms: 120000
"#;

    fn session() -> Session<SimulatedBrowser> {
        let site = Arc::new(Site::from_yaml(SITE).unwrap());
        Session::new(
            SimulatedBrowser::new(site, Viewport::default()),
            Url::parse("http://127.0.0.1:4173/app/").unwrap(),
            Viewport::default(),
        )
    }

    #[test]
    fn test_relative_urls_join_base() {
        let s = session();
        assert_eq!(s.resolve_url("/").unwrap().as_str(), "http://127.0.0.1:4173/");
        assert_eq!(
            s.resolve_url("stages").unwrap().as_str(),
            "http://127.0.0.1:4173/app/stages"
        );
        assert_eq!(
            s.resolve_url("https://example.com/x").unwrap().as_str(),
            "https://example.com/x"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_visit_waits_for_ready() {
        let mut s = session();
        let start = Instant::now();
        s.visit("/").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_visit_times_out_on_slow_page() {
        let mut s = session().with_page_load_timeout(Duration::from_secs(1));
        let err = s.visit("/slow").await.unwrap_err();
        assert!(matches!(err, HarnessError::NavigationFailure { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewport_survives_navigation() {
        let mut s = session();
        s.set_viewport(Viewport::new(1600, 900)).await.unwrap();
        s.visit("/").await.unwrap();
        let snapshot = s.driver().snapshot().await.unwrap();
        assert_eq!(snapshot.viewport, Viewport::new(1600, 900));
        assert_eq!(s.viewport(), Viewport::new(1600, 900));
    }
}
