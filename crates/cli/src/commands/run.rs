//! `ariaprobe run`

use std::path::{Path, PathBuf};

use anyhow::Result;
use ariaprobe_harness::preflight::{wait_for_target, PreflightConfig};
use ariaprobe_harness::runner::{self, filter_scenarios};
use ariaprobe_harness::{
    RunSummary, RunnerConfig, ScenarioResult, ScenarioStatus, SimulatedBrowserFactory, TestRunner,
};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use super::{load_config, load_site, Overrides};
use crate::output::{print_rows, print_value, print_warning, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub overrides: Overrides,

    /// Run only scenarios whose name contains this text
    #[arg(short, long)]
    pub grep: Option<String>,

    /// Scenarios to run concurrently
    #[arg(short, long, env = "ARIAPROBE_JOBS")]
    pub jobs: Option<usize>,

    /// Directory for results.json
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Probe the base URL before running
    #[arg(long)]
    pub preflight: bool,
}

/// One row of the report
#[derive(Serialize)]
pub struct ScenarioRow {
    pub name: String,
    pub status: ScenarioStatus,
    pub duration_ms: u64,
    pub reason: String,
}

impl From<&ScenarioResult> for ScenarioRow {
    fn from(result: &ScenarioResult) -> Self {
        Self {
            name: result.name.clone(),
            status: result.status,
            duration_ms: result.duration_ms,
            reason: result.error.clone().unwrap_or_default(),
        }
    }
}

impl TableDisplay for ScenarioRow {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Status", "Duration", "Reason"]
    }

    fn row(&self) -> Vec<String> {
        let status = match self.status {
            ScenarioStatus::Passed => "✓ passed".green().to_string(),
            ScenarioStatus::Failed => "✗ failed".red().to_string(),
            ScenarioStatus::Skipped => "- skipped".yellow().to_string(),
        };
        vec![
            self.name.clone(),
            status,
            format!("{}ms", self.duration_ms),
            self.reason.clone(),
        ]
    }
}

/// Run the selected scenarios; returns the process exit code
pub async fn execute(args: RunArgs, config_path: &Path, format: OutputFormat) -> Result<i32> {
    let mut config = load_config(config_path, &args.overrides)?;
    if let Some(jobs) = args.jobs {
        config.jobs = jobs.max(1);
    }
    if let Some(output) = args.output {
        config.results_dir = output;
    }
    if args.preflight {
        config.preflight = true;
    }

    let site = load_site(&config)?;
    let scenarios = filter_scenarios(runner::discover(&config)?, args.grep.as_deref());
    if scenarios.is_empty() {
        print_warning("No scenarios matched");
    }

    let runner_config = RunnerConfig::from_run_config(&config)?;
    if config.preflight {
        wait_for_target(&runner_config.base_url, &PreflightConfig::default()).await?;
    }

    let runner = TestRunner::with_config(SimulatedBrowserFactory::new(site), runner_config);
    let summary = runner.run_scenarios(&scenarios).await;
    let results_path = runner.write_results(&summary)?;
    info!("Run {} finished", summary.run_id);

    report(&summary, format);
    if !format.is_machine_readable() {
        println!("Results: {}", results_path.display());
    }
    Ok(summary.exit_code())
}

fn report(summary: &RunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Yaml => print_value(summary, format),
        OutputFormat::Table | OutputFormat::Plain => {
            let rows: Vec<ScenarioRow> = summary.results.iter().map(ScenarioRow::from).collect();
            print_rows(&rows, format, "No scenarios ran.");

            let line = format!(
                "{} passed, {} failed, {} skipped ({} ms)",
                summary.passed, summary.failed, summary.skipped, summary.duration_ms
            );
            if summary.success() {
                println!("{}", line.green().bold());
            } else {
                println!("{}", line.red().bold());
            }
        }
    }
}
