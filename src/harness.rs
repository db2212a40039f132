use super::Result;
use crate::expectation::{AssertionFailure, ExitCode, ExpectationSet, ProcessOutput};
use crate::flags::{FlagTable, PRINT_FLAGS_FINAL};
use crate::invocation::Invocation;
use crate::process_runner::ProcessRunner;
use tracing::{debug, error};

/// Arguments appended to every launch so the VM exits after option processing.
pub const DEFAULT_STARTUP_ARGS: [&str; 1] = ["-version"];

/// Spawns the VM once per call and asserts on what it did.
///
/// Calls are self-contained: nothing carries over from one launch to the next.
pub struct ProcessAssertionHarness {
    runner: ProcessRunner,
    startup_args: Vec<String>,
    flag_table: FlagTable,
}

impl ProcessAssertionHarness {
    pub fn new(runner: ProcessRunner) -> Result<Self> {
        Ok(Self {
            runner,
            startup_args: DEFAULT_STARTUP_ARGS.iter().map(|s| s.to_string()).collect(),
            flag_table: FlagTable::new()?,
        })
    }

    /// Replaces the arguments appended after each invocation.
    pub fn with_startup_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.startup_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Launches the VM with `invocation` and checks the result against
    /// `expectations`.
    ///
    /// An [`AssertionFailure`] inside the returned error means the VM misbehaved;
    /// any other error means it could not be run at all.
    pub async fn verify_startup(
        &self,
        expectations: &ExpectationSet,
        invocation: &Invocation,
    ) -> Result<ProcessOutput> {
        let args = invocation.to_vec_with(&self.startup_args);
        let output = self.runner.run(&args).await?;

        if let Err(failure) = expectations.evaluate(&output) {
            error!("Startup check failed: {}", failure);
            debug!("stdout:\n{}", output.stdout);
            debug!("stderr:\n{}", output.stderr);
            return Err(failure.into());
        }

        Ok(output)
    }

    /// Launches the VM with the flag table dump enabled and checks that
    /// `option_name` is reported with `expected_value`.
    pub async fn verify_option_value(
        &self,
        option_name: &str,
        expected_value: &str,
        ignore_stderr: bool,
        invocation: &Invocation,
    ) -> Result<ProcessOutput> {
        let invocation = invocation.clone().arg(PRINT_FLAGS_FINAL);
        let expectations = ExpectationSet::new(ExitCode::Ok).stdout_only(ignore_stderr);
        let output = self.verify_startup(&expectations, &invocation).await?;

        let reported: Vec<_> = self
            .flag_table
            .lookup(output.lines(ignore_stderr), option_name)
            .collect();

        if reported.is_empty() {
            return Err(AssertionFailure::OptionValueMissing {
                option: option_name.to_string(),
                expected: expected_value.to_string(),
            }
            .into());
        }

        if let Some(flag) = reported.iter().find(|flag| flag.value != expected_value) {
            return Err(AssertionFailure::OptionValueMismatch {
                option: option_name.to_string(),
                expected: expected_value.to_string(),
                actual: flag.value.clone(),
            }
            .into());
        }

        debug!("{} reported as {}", option_name, expected_value);
        Ok(output)
    }
}
