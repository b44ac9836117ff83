//! Error type shared by the whole crate.

use thiserror::Error;

/// Errors raised by the adapter
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A rule failed to compile
    #[error("rule {index} (series query {series_query:?}): {source}")]
    Rule {
        /// Position of the rule in the rule set
        index: usize,
        /// The rule's series query
        series_query: String,
        /// What went wrong
        #[source]
        source: Box<AdapterError>,
    },

    /// Template parse or render failure
    #[error("Template error: {0}")]
    Template(String),

    /// A regex did not compile
    #[error("unable to compile regular expression {pattern:?}: {source}")]
    InvalidRegex {
        /// The offending pattern
        pattern: String,
        /// Compiler error
        #[source]
        source: regex::Error,
    },

    /// A series filter sets neither or both of `is` and `isNot`
    #[error("Series filter error: {0}")]
    Filter(String),

    /// A series name does not fit the rule's name pattern
    #[error("series name {series:?} did not match expected pattern {pattern:?}")]
    NameMismatch {
        /// Series name
        series: String,
        /// Name rule pattern
        pattern: String,
    },

    /// No label can be derived for a resource
    #[error("unable to convert resource {resource} into label: {reason}")]
    NoLabel {
        /// Resource that has no label
        resource: String,
        /// Why
        reason: String,
    },

    /// The resource mapper does not know a resource
    #[error("unable to normalize group-resource {resource}: {reason}")]
    Normalize {
        /// Resource as given
        resource: String,
        /// Mapper error
        reason: String,
    },

    /// The resource mapper has no singular name for a resource
    #[error("unable to singularize resource {resource}: {reason}")]
    Singularize {
        /// Resource as given
        resource: String,
        /// Mapper error
        reason: String,
    },

    /// The query template rendered nothing
    #[error("Empty query produced by metrics query template")]
    EmptyQuery,

    /// A query was requested for zero objects
    #[error("at least one object name is required to build a query")]
    NoTargets,

    /// No discovered metric matches
    #[error("Metric not found: {0}")]
    MetricNotFound(String),

    /// The series backend failed
    #[error("Series source error: {0}")]
    Client(String),

    /// I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;

impl AdapterError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new template error
    pub fn template<S: Into<String>>(msg: S) -> Self {
        Self::Template(msg.into())
    }

    /// Creates a new series filter error
    pub fn filter<S: Into<String>>(msg: S) -> Self {
        Self::Filter(msg.into())
    }

    /// Creates a new series source error
    pub fn client<S: Into<String>>(msg: S) -> Self {
        Self::Client(msg.into())
    }

    /// Wraps an error with the index and series query of the rule that produced it
    pub fn in_rule(self, index: usize, series_query: &str) -> Self {
        Self::Rule {
            index,
            series_query: series_query.to_string(),
            source: Box::new(self),
        }
    }

    /// Returns true if this error only affects a single lookup or request.
    ///
    /// Configuration errors abort a rule-set build and are never recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::NameMismatch { .. }
            | Self::NoLabel { .. }
            | Self::Normalize { .. }
            | Self::Singularize { .. }
            | Self::EmptyQuery
            | Self::NoTargets
            | Self::MetricNotFound(_)
            | Self::Client(_) => true,
            Self::Rule { .. }
            | Self::Config(_)
            | Self::Template(_)
            | Self::InvalidRegex { .. }
            | Self::Filter(_)
            | Self::Io(_)
            | Self::Serialization(_) => false,
        }
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Rule { source, .. } => source.category(),
            Self::Config(_) => "config",
            Self::Template(_) | Self::InvalidRegex { .. } | Self::Filter(_) => "rule",
            Self::NameMismatch { .. }
            | Self::NoLabel { .. }
            | Self::Normalize { .. }
            | Self::Singularize { .. }
            | Self::EmptyQuery
            | Self::NoTargets => "resolution",
            Self::MetricNotFound(_) => "not_found",
            Self::Client(_) => "client",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = AdapterError::config("no rules");
        assert_eq!(err.to_string(), "Configuration error: no rules");
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_error_recoverability() {
        assert!(AdapterError::EmptyQuery.is_recoverable());
        assert!(AdapterError::NameMismatch {
            series: "up".to_string(),
            pattern: "^foo$".to_string(),
        }
        .is_recoverable());
        assert!(!AdapterError::filter("both set").is_recoverable());
    }

    #[test]
    fn test_rule_context_keeps_inner_category() {
        let err = AdapterError::template("unclosed action").in_rule(3, "{__name__=~\"^foo\"}");
        assert_eq!(err.category(), "rule");
        assert!(!err.is_recoverable());
        let msg = err.to_string();
        assert!(msg.starts_with("rule 3"), "unexpected message: {msg}");
        assert!(msg.contains("unclosed action"));
    }
}
