use std::fmt;

use crate::base_options::BaseOptions;

/// Ordered argument vector handed to the VM.
///
/// Later flags override earlier ones, so base options always come first and
/// whatever a check appends wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    args: Vec<String>,
}

impl Invocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an invocation from the baseline options.
    pub fn with_base(base: &BaseOptions) -> Self {
        Self {
            args: base.as_slice().to_vec(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn as_slice(&self) -> &[String] {
        &self.args
    }

    /// Copy of the arguments followed by `trailing`.
    pub fn to_vec_with(&self, trailing: &[String]) -> Vec<String> {
        self.args.iter().chain(trailing).cloned().collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}
