use tracing::debug;

/// Environment variables carrying the baseline VM options of a test run.
pub const BASE_OPTION_VARIABLES: [&str; 2] = ["TESTVMOPTS", "TESTJAVAOPTS"];

/// Baseline VM options prepended to every invocation.
///
/// Computed once when the suite starts and never mutated afterwards. Options
/// that mention any of the filtered flag names are dropped, so the flags a
/// check is about are always the ones it sets itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseOptions(Vec<String>);

impl BaseOptions {
    /// Creates an empty option list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Reads [`BASE_OPTION_VARIABLES`] from the process environment.
    ///
    /// # Arguments
    /// * `filtered` - Flag names whose options must not be inherited
    pub fn from_env(filtered: &[&str]) -> Self {
        let tokens: Vec<String> = BASE_OPTION_VARIABLES
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .flat_map(|value| {
                value
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();

        let options = Self::from_tokens(tokens, filtered);
        debug!("base VM options: {:?}", options.as_slice());
        options
    }

    /// Builds the option list from already split tokens.
    ///
    /// Order is preserved; a token is dropped when it contains any of the
    /// `filtered` names.
    pub fn from_tokens<I, S>(tokens: I, filtered: &[&str]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            tokens
                .into_iter()
                .map(Into::into)
                .filter(|token| !token.is_empty())
                .filter(|token| !filtered.iter().any(|name| token.contains(name)))
                .collect(),
        )
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
