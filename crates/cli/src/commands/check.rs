//! `ariaprobe check`: validate config, site fixture and scenario files without running

use std::path::Path;

use anyhow::Result;
use ariaprobe_harness::runner;
use clap::Args;

use super::{load_config, load_site, Overrides};
use crate::output::{print_success, print_warning};

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub overrides: Overrides,
}

pub fn execute(args: CheckArgs, config_path: &Path) -> Result<i32> {
    let config = load_config(config_path, &args.overrides)?;
    let site = load_site(&config)?;
    let scenarios = runner::discover(&config)?;

    if config.video {
        print_warning("video = true has no effect");
    }
    print_success(&format!(
        "{} scenario(s) and site fixture {:?} ({} page(s)) are valid",
        scenarios.len(),
        site.name,
        site.pages.len()
    ));
    Ok(0)
}
