use regex::Regex;
use std::fmt;

use super::Result;

/// Switch that unlocks experimental VM options.
pub const UNLOCK_EXPERIMENTAL_VM_OPTIONS: &str = "-XX:+UnlockExperimentalVMOptions";

/// Switch that makes the VM print every flag with its final value.
pub const PRINT_FLAGS_FINAL: &str = "-XX:+PrintFlagsFinal";

/// A single `-XX:` flag token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmFlag {
    /// `-XX:+Name` or `-XX:-Name`
    Bool { name: String, enabled: bool },
    /// `-XX:Name=Value`
    Value { name: String, value: String },
}

impl VmFlag {
    pub fn boolean(name: impl Into<String>, enabled: bool) -> Self {
        VmFlag::Bool {
            name: name.into(),
            enabled,
        }
    }

    pub fn numeric(name: impl Into<String>, value: impl fmt::Display) -> Self {
        VmFlag::Value {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

impl fmt::Display for VmFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmFlag::Bool { name, enabled } => {
                write!(f, "-XX:{}{}", if *enabled { '+' } else { '-' }, name)
            }
            VmFlag::Value { name, value } => write!(f, "-XX:{}={}", name, value),
        }
    }
}

/// Formats `-XX:Name=Value`.
pub fn prepare_numeric_flag(name: &str, value: impl fmt::Display) -> String {
    VmFlag::numeric(name, value).to_string()
}

/// Formats `-XX:+Name` or `-XX:-Name`.
pub fn prepare_boolean_flag(name: &str, enabled: bool) -> String {
    VmFlag::boolean(name, enabled).to_string()
}

/// Builds the pattern matching the VM's complaint about an experimental option
/// used without [`UNLOCK_EXPERIMENTAL_VM_OPTIONS`].
pub fn experimental_option_error_pattern(option_name: &str) -> String {
    let message = format!(
        "VM option '{}' is experimental and must be enabled via {}.",
        option_name, UNLOCK_EXPERIMENTAL_VM_OPTIONS
    );
    format!(".*{}.*", regex::escape(&message))
}

/// One line of `-XX:+PrintFlagsFinal` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagValue {
    pub name: String,
    pub value: String,
}

/// Parses `PrintFlagsFinal` lines. Other lines are skipped.
///
/// Older VMs print `<type> <name> [:]= <value> {<kind>}`; newer ones print
/// `<type> <name> = <value> {<kind>} {<origin>}`. Both are accepted, as is
/// an empty value.
pub struct FlagTable {
    line_re: Regex,
}

impl FlagTable {
    pub fn new() -> Result<Self> {
        Ok(Self {
            line_re: Regex::new(r"^\s*\S+\s+(\w+)\s+:?=\s*([^\s{]\S*)?(?:\s*\{[^}]*\})*\s*$")?,
        })
    }

    pub fn parse_line(&self, line: &str) -> Option<FlagValue> {
        let caps = self.line_re.captures(line)?;
        Some(FlagValue {
            name: caps[1].to_string(),
            value: caps.get(2).map_or("", |m| m.as_str()).to_string(),
        })
    }

    /// Every flag line naming `option_name`, in output order.
    pub fn lookup<'a>(
        &'a self,
        lines: impl Iterator<Item = &'a str> + 'a,
        option_name: &'a str,
    ) -> impl Iterator<Item = FlagValue> + 'a {
        lines
            .filter_map(move |line| self.parse_line(line))
            .filter(move |flag| flag.name == option_name)
    }
}
