//! `ariaprobe list`

use std::path::Path;

use anyhow::Result;
use ariaprobe_harness::runner::{self, filter_scenarios};
use ariaprobe_harness::Scenario;
use clap::Args;
use serde::Serialize;

use super::{load_config, Overrides};
use crate::output::{print_rows, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub overrides: Overrides,

    /// Only scenarios whose name contains this text
    #[arg(short, long)]
    pub grep: Option<String>,
}

#[derive(Serialize)]
pub struct ScenarioEntry {
    pub name: String,
    pub file: String,
    pub steps: usize,
    pub skip: bool,
}

impl From<&Scenario> for ScenarioEntry {
    fn from(scenario: &Scenario) -> Self {
        Self {
            name: scenario.name.clone(),
            file: scenario.file.display().to_string(),
            steps: scenario.all_steps().count(),
            skip: scenario.skip,
        }
    }
}

impl TableDisplay for ScenarioEntry {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "File", "Steps", "Skip"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.file.clone(),
            self.steps.to_string(),
            if self.skip { "yes" } else { "" }.to_string(),
        ]
    }
}

pub fn execute(args: ListArgs, config_path: &Path, format: OutputFormat) -> Result<i32> {
    let config = load_config(config_path, &args.overrides)?;
    let scenarios = filter_scenarios(runner::discover(&config)?, args.grep.as_deref());
    let entries: Vec<ScenarioEntry> = scenarios.iter().map(ScenarioEntry::from).collect();
    print_rows(&entries, format, "No scenarios found.");
    Ok(0)
}
