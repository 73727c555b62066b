//! Retry-assertion evaluator
//!
//! Every assertion and every interaction readiness check goes through
//! [`evaluate`]: resolve the selector against a fresh snapshot, check the
//! predicate, and if it does not hold yet sleep one backoff interval and try
//! again until the policy's timeout is spent.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::dom::NodeId;
use crate::driver::{Driver, PageSnapshot};
use crate::error::{HarnessError, HarnessResult};
use crate::predicate::{Observation, Predicate};
use crate::selector::Selector;

/// Delay between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    /// `initial * factor^(attempt-1)`, never more than `max`
    Exponential {
        initial: Duration,
        factor: u32,
        max: Duration,
    },
}

impl Backoff {
    /// Delay after the `attempt`-th failed check (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(interval) => interval,
            Backoff::Exponential {
                initial,
                factor,
                max,
            } => {
                let exp = attempt.saturating_sub(1).min(16);
                let multiplier = factor.max(1).saturating_pow(exp);
                initial.saturating_mul(multiplier).min(max)
            }
        }
    }

    /// Longest single delay this backoff can produce
    pub fn max_interval(&self) -> Duration {
        match *self {
            Backoff::Fixed(interval) => interval,
            Backoff::Exponential { max, .. } => max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(4000);
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(50);

    pub fn fixed(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            backoff: Backoff::Fixed(interval),
        }
    }

    /// Same backoff, different budget
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Self::DEFAULT_TIMEOUT, Self::DEFAULT_INTERVAL)
    }
}

/// A passing evaluation, with the snapshot it passed on
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub nodes: Vec<NodeId>,
    pub snapshot: PageSnapshot,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Retry `predicate` on `selector` until it holds or `policy.timeout` elapses.
///
/// Fails with [`HarnessError::ElementNotFound`] when the last attempt matched
/// nothing, and [`HarnessError::PredicateTimeout`] (carrying the last
/// observed value) when elements matched but the predicate did not hold.
pub async fn evaluate<D: Driver + ?Sized>(
    driver: &mut D,
    selector: &Selector,
    predicate: &Predicate,
    policy: &RetryPolicy,
) -> HarnessResult<Evaluation> {
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let snapshot = driver.snapshot().await?;
        let nodes = selector.resolve(&snapshot);
        let observation = predicate.check(&snapshot, &nodes);

        if observation == Observation::Pass {
            trace!("{} -> {} passed after {} attempt(s)", selector, predicate, attempts);
            return Ok(Evaluation {
                nodes,
                snapshot,
                attempts,
                elapsed: start.elapsed(),
            });
        }

        let now = Instant::now();
        if now >= deadline {
            let timeout_ms = policy.timeout.as_millis() as u64;
            return Err(match observation {
                Observation::Mismatch(actual) => HarnessError::PredicateTimeout {
                    selector: selector.to_string(),
                    expected: predicate.to_string(),
                    actual,
                    timeout_ms,
                },
                _ => HarnessError::ElementNotFound {
                    selector: selector.to_string(),
                    timeout_ms,
                },
            });
        }

        // The last attempt lands exactly on the deadline.
        let delay = policy.backoff.delay(attempts).min(deadline - now);
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimulatedBrowser, Site};
    use std::sync::Arc;
    use url::Url;

    const SITE: &str = r#"
pages:
  - path: /
    elements:
      - tag: button
        attrs: { role: tab, data-cy: tab-dtse, aria-selected: "false" }
      - tag: div
        attrs: { data-cy: late-panel }
        mount_after_ms: 330
"#;

    async fn browser() -> SimulatedBrowser {
        let site = Arc::new(Site::from_yaml(SITE).unwrap());
        let mut b = SimulatedBrowser::new(site, Default::default());
        b.navigate(&Url::parse("http://localhost/").unwrap())
            .await
            .unwrap();
        b
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(10),
            factor: 2,
            max: Duration::from_millis(50),
        };
        let delays: Vec<u64> = (1..=5).map(|a| backoff.delay(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![10, 20, 40, 50, 50]);
        assert_eq!(backoff.max_interval(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_passes_once_element_mounts() {
        let mut b = browser().await;
        let policy = RetryPolicy::default();
        let eval = evaluate(
            &mut b,
            &Selector::parse(r#"[data-cy="late-panel"]"#).unwrap(),
            &Predicate::Exists,
            &policy,
        )
        .await
        .unwrap();

        assert_eq!(eval.nodes.len(), 1);
        assert!(eval.elapsed >= Duration::from_millis(330));
        assert!(eval.elapsed <= Duration::from_millis(330) + RetryPolicy::DEFAULT_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_matches_is_element_not_found() {
        let mut b = browser().await;
        let policy = RetryPolicy::default().with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        let err = evaluate(
            &mut b,
            &Selector::parse(r#"[data-cy="missing"]"#).unwrap(),
            &Predicate::Visible,
            &policy,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, HarnessError::ElementNotFound { timeout_ms: 200, .. }));
        assert!(started.elapsed() <= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatch_reports_last_observed_value() {
        let mut b = browser().await;
        let predicate = Predicate::from_chainer(
            "have.attr",
            &["aria-selected".to_string(), "true".to_string()],
        )
        .unwrap();
        let err = evaluate(
            &mut b,
            &Selector::parse(r#"[data-cy="tab-dtse"]"#).unwrap(),
            &predicate,
            &RetryPolicy::fixed(Duration::from_millis(100), Duration::from_millis(25)),
        )
        .await
        .unwrap_err();

        match err {
            HarnessError::PredicateTimeout { actual, .. } => {
                assert!(actual.contains("false"), "actual was {}", actual)
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_absence_passes_on_first_attempt() {
        let mut b = browser().await;
        let eval = evaluate(
            &mut b,
            &Selector::parse(r#"[data-cy="missing"]"#).unwrap(),
            &Predicate::NotExists,
            &RetryPolicy::default(),
        )
        .await
        .unwrap();
        assert_eq!(eval.attempts, 1);
        assert!(eval.nodes.is_empty());
    }
}
