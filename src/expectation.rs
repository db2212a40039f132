use regex::Regex;
use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

use super::Result;

/// Symbolic exit code of a VM launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// The VM started and exited normally.
    Ok,
    /// The VM refused to start.
    Fail,
}

impl ExitCode {
    /// Numeric value the VM uses for this outcome.
    pub fn value(self) -> i32 {
        match self {
            ExitCode::Ok => 0,
            ExitCode::Fail => 1,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCode::Ok => write!(f, "OK ({})", self.value()),
            ExitCode::Fail => write!(f, "FAIL ({})", self.value()),
        }
    }
}

/// Captured result of one VM launch.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutput {
    /// Exit code, or `None` when the process was killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Lines subject to pattern checks: stdout, then stderr unless `stdout_only`.
    pub fn lines(&self, stdout_only: bool) -> impl Iterator<Item = &str> {
        let stderr = if stdout_only { "" } else { self.stderr.as_str() };
        self.stdout.lines().chain(stderr.lines())
    }

    fn describe_status(&self) -> String {
        match (self.status.code(), self.status.signal()) {
            (Some(code), _) => code.to_string(),
            (None, Some(signal)) => format!("killed by signal {}", signal),
            (None, None) => "unknown".to_string(),
        }
    }
}

/// A check the VM's behaviour did not satisfy.
///
/// Distinct from harness errors (spawn failures, timeouts): these mean the VM
/// was run fine and did the wrong thing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssertionFailure {
    #[error("none of the expected patterns matched the output: {}", .patterns.join(", "))]
    MissingPattern { patterns: Vec<String> },

    #[error("forbidden pattern '{pattern}' matched output line: {line}")]
    ForbiddenPattern { pattern: String, line: String },

    #[error("expected exit code {expected}, got {actual}")]
    ExitCodeMismatch { expected: String, actual: String },

    #[error("no value reported for option {option} (expected {expected})")]
    OptionValueMissing { option: String, expected: String },

    #[error("option {option} reported value {actual}, expected {expected}")]
    OptionValueMismatch {
        option: String,
        expected: String,
        actual: String,
    },
}

/// What a single VM launch must (and must not) produce.
#[derive(Debug, Clone)]
pub struct ExpectationSet {
    pub must_match: Vec<Regex>,
    pub must_not_match: Vec<Regex>,
    pub exit_code: ExitCode,
    pub stdout_only: bool,
}

impl ExpectationSet {
    pub fn new(exit_code: ExitCode) -> Self {
        Self {
            must_match: Vec::new(),
            must_not_match: Vec::new(),
            exit_code,
            stdout_only: false,
        }
    }

    /// Adds a pattern of which at least one (across all `must_match` entries)
    /// has to appear.
    pub fn must_match(mut self, pattern: &str) -> Result<Self> {
        self.must_match.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Adds a pattern no output line may match.
    pub fn must_not_match(mut self, pattern: &str) -> Result<Self> {
        self.must_not_match.push(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn stdout_only(mut self, stdout_only: bool) -> Self {
        self.stdout_only = stdout_only;
        self
    }

    /// Checks `output` against the patterns, then the exit code.
    ///
    /// Returns the first unmet expectation.
    pub fn evaluate(&self, output: &ProcessOutput) -> std::result::Result<(), AssertionFailure> {
        if !self.must_match.is_empty() {
            let found = output
                .lines(self.stdout_only)
                .any(|line| self.must_match.iter().any(|re| re.is_match(line)));
            if !found {
                return Err(AssertionFailure::MissingPattern {
                    patterns: self.must_match.iter().map(|re| re.as_str().to_string()).collect(),
                });
            }
        }

        for line in output.lines(self.stdout_only) {
            if let Some(re) = self.must_not_match.iter().find(|re| re.is_match(line)) {
                return Err(AssertionFailure::ForbiddenPattern {
                    pattern: re.as_str().to_string(),
                    line: line.to_string(),
                });
            }
        }

        if output.code() != Some(self.exit_code.value()) {
            return Err(AssertionFailure::ExitCodeMismatch {
                expected: self.exit_code.to_string(),
                actual: output.describe_status(),
            });
        }

        Ok(())
    }
}
