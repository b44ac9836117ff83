//! Core domain types, errors and configuration.
//!
//! Everything else in the crate builds on the types defined here: the
//! series and resource identifiers flowing through the naming rules, the
//! error taxonomy, and the declarative rule set.

pub mod config;
pub mod defaults;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    Config, ConfigBuilder, ConfigOverrides, ConfigWatcher, DiscoveryRule, LogLevel,
    LoggingConfig, NameMapping, RegexFilter, ResourceMapping,
};
pub use error::{AdapterError, Result};
pub use types::{GroupResource, MetricInfo, Series, NAME_LABEL};
