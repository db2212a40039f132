use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vmoptcheck::cli::{Cli, Config};
use vmoptcheck::{AssertionFailure, ProcessAssertionHarness, ProcessRunner, SuiteRunner};

type Result<T> = color_eyre::eyre::Result<T>;

/// Exit status when the VM violated an expectation.
const EXIT_ASSERTION_FAILED: u8 = 1;
/// Exit status when the checks could not be run at all.
const EXIT_HARNESS_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize error handling and logging
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            return Ok(ExitCode::from(EXIT_HARNESS_ERROR));
        }
    };

    match run(config).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("Error: {:?}", e);
            if e.downcast_ref::<AssertionFailure>().is_some() {
                Ok(ExitCode::from(EXIT_ASSERTION_FAILED))
            } else {
                Ok(ExitCode::from(EXIT_HARNESS_ERROR))
            }
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let checks = config.suite.checks(&config.base_options)?;

    if config.list_only {
        for check in &checks {
            println!("{}\t{}", check.name(), check.description());
        }
        return Ok(());
    }

    info!(
        "Checking {} with {} base options",
        config.runner.executable.display(),
        config.base_options.len()
    );

    let harness = ProcessAssertionHarness::new(ProcessRunner::new(config.runner))?;
    match SuiteRunner::run(&harness, &checks).await {
        Ok(report) => {
            println!("{}", report.summary());
            Ok(())
        }
        Err(e) => {
            error!("Suite aborted");
            Err(e)
        }
    }
}
