//! Option-processing checks for `SurvivorAlignmentInBytes`.
//!
//! The flag is experimental, must be a power of 2 and must not be below the
//! object alignment. Every check runs the VM with the experimental options
//! unlocked unless it explicitly locks them again.

use super::Result;
use crate::base_options::BaseOptions;
use crate::expectation::{ExitCode, ExpectationSet};
use crate::flags::{
    experimental_option_error_pattern, prepare_boolean_flag, prepare_numeric_flag,
    UNLOCK_EXPERIMENTAL_VM_OPTIONS,
};
use crate::invocation::Invocation;
use crate::scenario::{Check, OptionReadback, Scenario};
use eyre::eyre;

pub const SURVIVOR_ALIGNMENT_IN_BYTES: &str = "SurvivorAlignmentInBytes";
pub const OBJECT_ALIGNMENT_IN_BYTES: &str = "ObjectAlignmentInBytes";
pub const UNLOCK_EXPERIMENTAL_OPTIONS_NAME: &str = "UnlockExperimentalVMOptions";

/// Flags stripped from the inherited base options.
pub const FILTERED_OPTIONS: [&str; 3] = [
    UNLOCK_EXPERIMENTAL_OPTIONS_NAME,
    SURVIVOR_ALIGNMENT_IN_BYTES,
    OBJECT_ALIGNMENT_IN_BYTES,
];

/// Object alignment the VM uses when none is given.
pub const DEFAULT_OBJECT_ALIGNMENT: u64 = 8;

#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub option_name: String,
    /// Object alignment passed explicitly to the too-small check.
    pub object_alignment: u64,
    /// Valid value used for the unlock checks.
    pub gate_value: u64,
    pub too_small_value: u64,
    pub non_power_of_two_value: u64,
    pub accepted_value: u64,
    pub readback_values: Vec<u64>,
    /// Pattern proving the VM got past option processing.
    pub confirmation_pattern: String,
    pub ignore_stderr: bool,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            option_name: SURVIVOR_ALIGNMENT_IN_BYTES.to_string(),
            object_alignment: DEFAULT_OBJECT_ALIGNMENT,
            gate_value: 64,
            too_small_value: 2,
            non_power_of_two_value: 127,
            accepted_value: 128,
            readback_values: vec![32, 64, 128],
            confirmation_pattern: "(?i)version".to_string(),
            ignore_stderr: false,
        }
    }
}

impl SuiteConfig {
    /// Rejects values that would make a check test something other than what
    /// its name says.
    pub fn validate(&self) -> Result<()> {
        if !self.object_alignment.is_power_of_two() {
            return Err(eyre!(
                "Object alignment {} is not a power of 2",
                self.object_alignment
            ));
        }
        if !self.too_small_value.is_power_of_two() || self.too_small_value >= self.object_alignment {
            return Err(eyre!(
                "Too-small value {} must be a power of 2 below the object alignment {}",
                self.too_small_value,
                self.object_alignment
            ));
        }
        if self.non_power_of_two_value.is_power_of_two() {
            return Err(eyre!(
                "Non-power-of-2 value {} is a power of 2",
                self.non_power_of_two_value
            ));
        }
        let valid = [self.gate_value, self.accepted_value]
            .into_iter()
            .chain(self.readback_values.iter().copied());
        for value in valid {
            if !value.is_power_of_two() || value < self.object_alignment {
                return Err(eyre!(
                    "Value {} must be a power of 2 not below the object alignment {}",
                    value,
                    self.object_alignment
                ));
            }
        }
        Ok(())
    }

    fn flag(&self, value: u64) -> String {
        prepare_numeric_flag(&self.option_name, value)
    }

    /// `base ++ [unlock] ++ args`
    fn invocation<I, S>(&self, base: &BaseOptions, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::with_base(base)
            .arg(UNLOCK_EXPERIMENTAL_VM_OPTIONS)
            .args(args)
    }

    /// Builds every check in run order.
    pub fn checks(&self, base: &BaseOptions) -> Result<Vec<Check>> {
        self.validate()?;

        let name = &self.option_name;
        let escaped = regex::escape(name);
        let gate = experimental_option_error_pattern(name);
        let too_small = format!(
            ".*{}=.*must be greater than {}.*",
            escaped, OBJECT_ALIGNMENT_IN_BYTES
        );
        let not_power_of_two = format!(".*{}=.*must be power of 2.*", escaped);

        let mut checks = vec![
            Check::Startup(Scenario {
                name: "experimental-gate".to_string(),
                description: format!("{} is rejected while experimental options are locked", name),
                invocation: self.invocation(
                    base,
                    [
                        prepare_boolean_flag(UNLOCK_EXPERIMENTAL_OPTIONS_NAME, false),
                        self.flag(self.gate_value),
                    ],
                ),
                expectations: ExpectationSet::new(ExitCode::Fail).must_match(&gate)?,
            }),
            Check::Startup(Scenario {
                name: "unlocked".to_string(),
                description: format!("{} is accepted once experimental options are unlocked", name),
                invocation: self.invocation(base, [self.flag(self.gate_value)]),
                expectations: ExpectationSet::new(ExitCode::Ok).must_not_match(&gate)?,
            }),
            Check::Startup(Scenario {
                name: "too-small".to_string(),
                description: format!(
                    "{}={} is rejected below {}={}",
                    name, self.too_small_value, OBJECT_ALIGNMENT_IN_BYTES, self.object_alignment
                ),
                invocation: self.invocation(
                    base,
                    [
                        prepare_numeric_flag(OBJECT_ALIGNMENT_IN_BYTES, self.object_alignment),
                        self.flag(self.too_small_value),
                    ],
                ),
                expectations: ExpectationSet::new(ExitCode::Fail).must_match(&too_small)?,
            }),
            Check::Startup(Scenario {
                name: "not-power-of-two".to_string(),
                description: format!("{}={} is rejected as not a power of 2", name, self.non_power_of_two_value),
                invocation: self.invocation(base, [self.flag(self.non_power_of_two_value)]),
                expectations: ExpectationSet::new(ExitCode::Fail).must_match(&not_power_of_two)?,
            }),
            Check::Startup(Scenario {
                name: "accepted".to_string(),
                description: format!("{}={} starts cleanly", name, self.accepted_value),
                invocation: self.invocation(base, [self.flag(self.accepted_value)]),
                expectations: ExpectationSet::new(ExitCode::Ok)
                    .must_match(&self.confirmation_pattern)?
                    .must_not_match(&format!(".*{}.*", escaped))?,
            }),
        ];

        for value in &self.readback_values {
            checks.push(Check::Readback(OptionReadback {
                name: format!("readback-{}", value),
                option: name.clone(),
                expected_value: value.to_string(),
                ignore_stderr: self.ignore_stderr,
                invocation: self.invocation(base, [self.flag(*value)]),
            }));
        }

        Ok(checks)
    }
}
