//! Scenario runner: discovery, isolated execution, aggregation and results

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::RunConfig;
use crate::dom::Viewport;
use crate::driver::DriverFactory;
use crate::error::{FailureKind, HarnessError, HarnessResult};
use crate::navigation::Session;
use crate::pattern::SpecPattern;
use crate::queue::{CommandQueue, CommandRecord};
use crate::retry::RetryPolicy;
use crate::scenario::{self, LoadOptions, Scenario};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub file: PathBuf,
    pub status: ScenarioStatus,
    pub duration_ms: u64,
    pub commands: Vec<CommandRecord>,
    pub failure_kind: Option<FailureKind>,
    pub error: Option<String>,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.status == ScenarioStatus::Passed
    }
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub base_url: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl RunSummary {
    /// Skipped scenarios do not fail a run
    /// Every scenario ran and passed. A skipped scenario did not pass.
    pub fn success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }
}

/// Configuration for the scenario runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_url: Url,
    pub viewport: Viewport,
    pub retry: RetryPolicy,
    pub page_load_timeout: Duration,
    pub scenario_timeout: Option<Duration>,
    pub jobs: usize,
    pub output_dir: PathBuf,
}

impl RunnerConfig {
    /// Defaults for everything but the target
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            viewport: Viewport::default(),
            retry: RetryPolicy::default(),
            page_load_timeout: Duration::from_secs(60),
            scenario_timeout: None,
            jobs: 1,
            output_dir: PathBuf::from("ariaprobe-results"),
        }
    }

    pub fn from_run_config(config: &RunConfig) -> HarnessResult<Self> {
        Ok(Self {
            base_url: config.base_url()?,
            viewport: config.viewport(),
            retry: config.retry_policy(),
            page_load_timeout: config.page_load_timeout(),
            scenario_timeout: config.scenario_timeout(),
            jobs: config.jobs.max(1),
            output_dir: config.results_path(),
        })
    }
}

/// Find and load every scenario selected by the run configuration
pub fn discover(config: &RunConfig) -> HarnessResult<Vec<Scenario>> {
    let opts: LoadOptions = config.load_options();
    let hooks = match config.support_path() {
        Some(path) => scenario::load_support_file(&path, &opts)?,
        None => Vec::new(),
    };

    let pattern = SpecPattern::new(&config.spec_pattern)?;
    let files = pattern.collect(&config.root)?;
    if files.is_empty() {
        return Err(HarnessError::config(format!(
            "no scenario files match specPattern {:?} under {}",
            pattern.as_str(),
            config.root.display()
        )));
    }

    let mut scenarios = Vec::new();
    for file in &files {
        scenarios.extend(scenario::load_file(file, &opts, &hooks)?);
    }
    info!(
        "Discovered {} scenario(s) in {} file(s)",
        scenarios.len(),
        files.len()
    );
    Ok(scenarios)
}

/// Keep scenarios whose name contains `filter`
pub fn filter_scenarios(scenarios: Vec<Scenario>, filter: Option<&str>) -> Vec<Scenario> {
    match filter {
        Some(needle) => scenarios
            .into_iter()
            .filter(|s| s.name.contains(needle))
            .collect(),
        None => scenarios,
    }
}

/// Runs scenarios, each in a fresh session from the factory
pub struct TestRunner<F: DriverFactory> {
    factory: F,
    config: RunnerConfig,
}

impl<F: DriverFactory> TestRunner<F> {
    pub fn with_config(factory: F, config: RunnerConfig) -> Self {
        Self { factory, config }
    }

    /// Run scenarios and aggregate. Results keep declaration order even
    /// when several sessions run at once.
    pub async fn run_scenarios(&self, scenarios: &[Scenario]) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            "Running {} scenario(s) against {} (run {})",
            scenarios.len(),
            self.config.base_url,
            run_id
        );

        let results: Vec<ScenarioResult> = stream::iter(scenarios)
            .map(|s| self.run_scenario(s))
            .buffered(self.config.jobs.max(1))
            .collect()
            .await;

        let mut passed = 0;
        let mut failed = 0;
        let mut skipped = 0;
        for result in &results {
            match result.status {
                ScenarioStatus::Passed => {
                    passed += 1;
                    info!("✓ {} ({} ms)", result.name, result.duration_ms);
                }
                ScenarioStatus::Failed => {
                    failed += 1;
                    error!(
                        "✗ {} - {}",
                        result.name,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
                ScenarioStatus::Skipped => {
                    skipped += 1;
                    info!("- {} (skipped)", result.name);
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Scenario results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        RunSummary {
            run_id,
            started_at,
            base_url: self.config.base_url.to_string(),
            total: results.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        }
    }

    /// Run one scenario in its own session. Never fails: every error ends
    /// up in the returned result.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let start = Instant::now();
        let mut result = ScenarioResult {
            name: scenario.name.clone(),
            file: scenario.file.clone(),
            status: ScenarioStatus::Skipped,
            duration_ms: 0,
            commands: Vec::new(),
            failure_kind: None,
            error: None,
        };
        if scenario.skip {
            return result;
        }
        debug!("Running scenario: {}", scenario.name);

        let mut queue = CommandQueue::new(self.config.retry);
        for step in scenario.all_steps() {
            queue.enqueue(step.clone());
        }

        let outcome = match self.factory.open(self.config.viewport) {
            Ok(driver) => {
                let mut session = Session::new(driver, self.config.base_url.clone(), self.config.viewport)
                    .with_page_load_timeout(self.config.page_load_timeout)
                    .with_poll_interval(self.config.retry.backoff.delay(1));
                match self.config.scenario_timeout {
                    Some(budget) => {
                        let timed = tokio::time::timeout(budget, queue.run(&mut session)).await;
                        timed.unwrap_or_else(|_| {
                            queue.abort();
                            Err(HarnessError::ScenarioTimeout {
                                budget_ms: budget.as_millis() as u64,
                            })
                        })
                    }
                    None => queue.run(&mut session).await,
                }
            }
            Err(e) => Err(e),
        };

        result.commands = queue.records().to_vec();
        result.duration_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(()) => result.status = ScenarioStatus::Passed,
            Err(e) => {
                if queue.skipped() > 0 {
                    warn!("{}: {} command(s) skipped after failure", scenario.name, queue.skipped());
                }
                result.status = ScenarioStatus::Failed;
                result.failure_kind = Some(e.kind());
                result.error = Some(e.to_string());
            }
        }
        result
    }

    /// Write results to `<output_dir>/results.json`
    pub fn write_results(&self, summary: &RunSummary) -> HarnessResult<PathBuf> {
        write_results(&self.config.output_dir, summary)
    }
}

pub fn write_results(output_dir: &Path, summary: &RunSummary) -> HarnessResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("results.json");
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimulatedBrowserFactory, Site};

    const SITE: &str = r#"
pages:
  - path: /
    elements:
      - tag: button
        attrs: { data-cy: go }
"#;

    const SCENARIOS: &str = r#"
suite: runner
before_each:
  - visit: /
scenarios:
  - it: passes
    steps:
      - get: '[data-cy="go"]'
        then: [click, { should: have.focus }]
  - it: fails
    steps:
      - get: '[data-cy="missing"]'
        timeout_ms: 100
  - it: skipped
    skip: true
    steps:
      - visit: /
"#;

    fn runner(jobs: usize) -> TestRunner<SimulatedBrowserFactory> {
        let factory = SimulatedBrowserFactory::new(Site::from_yaml(SITE).unwrap());
        TestRunner::with_config(
            factory,
            RunnerConfig {
                jobs,
                ..RunnerConfig::new(Url::parse("http://127.0.0.1:4173").unwrap())
            },
        )
    }

    fn scenarios() -> Vec<Scenario> {
        scenario::load_str(SCENARIOS, Path::new("runner.yaml"), &LoadOptions::default(), &[])
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggregates_outcomes_in_order() {
        let summary = runner(3).run_scenarios(&scenarios()).await;
        assert_eq!((summary.total, summary.passed, summary.failed, summary.skipped), (3, 1, 1, 1));
        assert!(!summary.success());
        assert_eq!(summary.exit_code(), 1);

        let names: Vec<_> = summary.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["runner > passes", "runner > fails", "runner > skipped"]);
        assert_eq!(summary.results[1].failure_kind, Some(FailureKind::ElementNotFound));
        assert_eq!(summary.results[0].commands.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_scenario_fails_the_run() {
        let all = scenarios();
        let subset = vec![all[0].clone(), all[2].clone()];
        let summary = runner(1).run_scenarios(&subset).await;

        assert_eq!((summary.passed, summary.failed, summary.skipped), (1, 0, 1));
        assert!(!summary.success());
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_filter_by_name() {
        let filtered = filter_scenarios(scenarios(), Some("fail"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filter_scenarios(scenarios(), None).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_results_json() {
        let dir = tempfile::tempdir().unwrap();
        let summary = runner(1).run_scenarios(&scenarios()[..1]).await;
        assert!(summary.success());

        let path = write_results(dir.path(), &summary).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["passed"], 1);
        assert_eq!(json["results"][0]["status"], "passed");
        assert_eq!(json["results"][0]["commands"][0]["label"], "visit /");
    }
}
