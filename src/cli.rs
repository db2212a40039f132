use clap::Parser;
use eyre::eyre;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::base_options::BaseOptions;
use crate::process_runner::RunnerConfig;
use crate::survivor_alignment::{SuiteConfig, FILTERED_OPTIONS};

type Result<T> = color_eyre::eyre::Result<T>;

/// Checks how a VM processes the SurvivorAlignmentInBytes option
#[derive(Parser, Debug)]
#[command(name = "vmoptcheck")]
#[command(about = "Checks how a VM processes the SurvivorAlignmentInBytes option")]
#[command(version)]
pub struct Cli {
    /// VM launcher to test (default: $TESTJAVA/bin/java, else java from PATH)
    #[arg(long)]
    pub java: Option<PathBuf>,

    /// JDK home used to locate the launcher when --java is not given
    #[arg(long, env = "TESTJAVA", hide_env_values = true)]
    pub test_java: Option<PathBuf>,

    /// Timeout for a single VM launch (seconds), scaled by TESTTIMEOUTFACTOR
    #[arg(long, default_value = "120")]
    pub timeout_secs: u64,

    /// Object alignment baseline for the too-small check
    #[arg(long, default_value = "8")]
    pub object_alignment: u64,

    /// Read printed flag values from stdout only
    #[arg(long)]
    pub ignore_stderr: bool,

    /// List the checks and exit
    #[arg(long)]
    pub list: bool,
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub runner: RunnerConfig,
    pub suite: SuiteConfig,
    /// Baseline options, read once
    pub base_options: BaseOptions,
    pub list_only: bool,
}

impl Config {
    /// Resolve command line arguments and environment into configuration
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.timeout_secs == 0 {
            return Err(eyre!("Timeout must be at least one second"));
        }

        let executable = cli.java.unwrap_or_else(|| match cli.test_java {
            Some(home) => home.join("bin").join("java"),
            None => PathBuf::from("java"),
        });

        // The checks match the VM's English diagnostics.
        let mut environment = HashMap::new();
        environment.insert("LC_ALL".to_string(), "C".to_string());

        let runner = RunnerConfig {
            executable,
            timeout: Duration::from_secs(cli.timeout_secs),
            environment,
        }
        .with_timeout_factor_from_env()?;

        let suite = SuiteConfig {
            object_alignment: cli.object_alignment,
            ignore_stderr: cli.ignore_stderr,
            ..Default::default()
        };
        suite.validate()?;

        Ok(Config {
            runner,
            suite,
            base_options: BaseOptions::from_env(&FILTERED_OPTIONS),
            list_only: cli.list,
        })
    }
}
