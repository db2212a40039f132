use super::Result;
use crate::expectation::{ExpectationSet, ProcessOutput};
use crate::harness::ProcessAssertionHarness;
use crate::invocation::Invocation;
use eyre::WrapErr;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{error, info};

/// One VM launch and what it must produce.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub invocation: Invocation,
    pub expectations: ExpectationSet,
}

/// One VM launch whose printed flag table must report `expected_value`.
#[derive(Debug, Clone)]
pub struct OptionReadback {
    pub name: String,
    pub option: String,
    pub expected_value: String,
    pub ignore_stderr: bool,
    pub invocation: Invocation,
}

#[derive(Debug, Clone)]
pub enum Check {
    Startup(Scenario),
    Readback(OptionReadback),
}

impl Check {
    pub fn name(&self) -> &str {
        match self {
            Check::Startup(scenario) => &scenario.name,
            Check::Readback(readback) => &readback.name,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Check::Startup(scenario) => scenario.description.clone(),
            Check::Readback(readback) => format!(
                "{} reads back as {}",
                readback.option, readback.expected_value
            ),
        }
    }

    pub fn invocation(&self) -> &Invocation {
        match self {
            Check::Startup(scenario) => &scenario.invocation,
            Check::Readback(readback) => &readback.invocation,
        }
    }

    async fn run(&self, harness: &ProcessAssertionHarness) -> Result<ProcessOutput> {
        match self {
            Check::Startup(scenario) => {
                harness
                    .verify_startup(&scenario.expectations, &scenario.invocation)
                    .await
            }
            Check::Readback(readback) => {
                harness
                    .verify_option_value(
                        &readback.option,
                        &readback.expected_value,
                        readback.ignore_stderr,
                        &readback.invocation,
                    )
                    .await
            }
        }
    }
}

/// Outcome of a check that passed.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    pub passed: Vec<CheckResult>,
}

impl SuiteReport {
    pub fn summary(&self) -> String {
        let mut summary = String::new();
        for result in &self.passed {
            let _ = writeln!(summary, "PASSED {} ({:?})", result.name, result.duration);
        }
        let _ = write!(summary, "{} checks passed", self.passed.len());
        summary
    }
}

/// Runs checks one after another and stops at the first failure.
pub struct SuiteRunner;

impl SuiteRunner {
    pub async fn run(harness: &ProcessAssertionHarness, checks: &[Check]) -> Result<SuiteReport> {
        let mut report = SuiteReport::default();

        for check in checks {
            info!("Running check {}: {}", check.name(), check.description());
            let output = match check.run(harness).await {
                Ok(output) => output,
                Err(e) => {
                    error!("Check {} failed: {}", check.name(), e);
                    return Err(e).wrap_err_with(|| {
                        format!(
                            "check '{}' ({}) failed with arguments: {}",
                            check.name(),
                            check.description(),
                            check.invocation()
                        )
                    });
                }
            };
            info!("Check {} passed in {:?}", check.name(), output.duration);
            report.passed.push(CheckResult {
                name: check.name().to_string(),
                duration: output.duration,
            });
        }

        Ok(report)
    }
}
