//! Regression checks for a virtual machine's command-line option parser.
//!
//! The core is [`harness::ProcessAssertionHarness`]: it launches the VM with an
//! argument vector, captures its output and exit code, and asserts them against
//! an [`expectation::ExpectationSet`]. The `SurvivorAlignmentInBytes` checks in
//! [`survivor_alignment`] are plain data fed through it.

pub type Result<T> = color_eyre::eyre::Result<T>;

pub mod base_options;
pub mod cli;
pub mod expectation;
pub mod flags;
pub mod harness;
pub mod invocation;
pub mod process_runner;
pub mod scenario;
pub mod survivor_alignment;

pub use base_options::BaseOptions;
pub use expectation::{AssertionFailure, ExitCode, ExpectationSet, ProcessOutput};
pub use harness::ProcessAssertionHarness;
pub use invocation::Invocation;
pub use process_runner::{ProcessRunner, RunnerConfig};
pub use scenario::{Check, OptionReadback, Scenario, SuiteReport, SuiteRunner};
pub use survivor_alignment::SuiteConfig;
