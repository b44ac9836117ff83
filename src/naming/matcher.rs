use crate::core::{AdapterError, RegexFilter, Result};
use regex::Regex;

/// Matches a regex either positively or negatively
#[derive(Debug, Clone)]
pub struct ReMatcher {
    regex: Regex,
    positive: bool,
}

impl ReMatcher {
    /// Compiles a series filter. Exactly one of `is`/`isNot` must be set.
    pub fn new(filter: &RegexFilter) -> Result<Self> {
        match (filter.is.is_empty(), filter.is_not.is_empty()) {
            (false, false) => Err(AdapterError::filter(format!(
                "cannot have both an `is` ({:?}) and `isNot` ({:?}) expression in a single filter",
                filter.is, filter.is_not
            ))),
            (true, true) => Err(AdapterError::filter(
                "must have either an `is` or `isNot` expression in a filter",
            )),
            (false, true) => Self::compile(&filter.is, true),
            (true, false) => Self::compile(&filter.is_not, false),
        }
    }

    /// Matcher accepting values that match `pattern`
    pub fn positive(pattern: &str) -> Result<Self> {
        Self::compile(pattern, true)
    }

    fn compile(pattern: &str, positive: bool) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| AdapterError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(ReMatcher { regex, positive })
    }

    /// Returns true if `value` satisfies this matcher
    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value) == self.positive
    }
}
