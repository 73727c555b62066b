//! ariaprobe CLI - Main Entry Point
//!
//! Exit codes: 0 when every scenario passed, 1 when any failed or was
//! skipped, 2 when nothing could run (configuration or preflight errors).

use std::path::PathBuf;

use ariaprobe_harness::config::DEFAULT_CONFIG_FILE;
use ariaprobe_harness::HarnessError;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{check, list, run};

/// Declarative UI-assertion runner
#[derive(Parser)]
#[command(name = "ariaprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, env = "ARIAPROBE_CONFIG", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios
    Run(run::RunArgs),

    /// List discovered scenarios
    List(list::ListArgs),

    /// Validate configuration, site fixture and scenario files
    Check(check::CheckArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Commands::Run(args) => run::execute(args, &cli.config, cli.format).await,
        Commands::List(args) => list::execute(args, &cli.config, cli.format),
        Commands::Check(args) => check::execute(args, &cli.config),
    };

    let code = match outcome {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            exit_code_for(&e)
        }
    };
    std::process::exit(code);
}

/// Scenario-level failures map to 1; anything that stopped the run from starting maps to 2
fn exit_code_for(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<HarnessError>() {
        Some(e) if !e.is_fatal() => 1,
        _ => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_for_errors() {
        let config = anyhow::Error::from(HarnessError::config("bad specPattern"));
        assert_eq!(exit_code_for(&config), 2);

        let timeout = anyhow::Error::from(HarnessError::ScenarioTimeout { budget_ms: 10 });
        assert_eq!(exit_code_for(&timeout), 1);

        assert_eq!(exit_code_for(&anyhow::anyhow!("disk full")), 2);
    }

    #[test]
    fn test_default_config_file() {
        let cli = Cli::try_parse_from(["ariaprobe", "list"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }
}
