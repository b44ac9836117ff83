//! Configuration management for the adapter.
//!
//! This module provides configuration handling with:
//! - YAML rule-set files in the adapter's discovery format
//! - CLI argument overrides
//! - Built-in default rules when no file supplies any
//! - Validation and file watching for reloads

use crate::core::defaults;
use crate::core::{AdapterError, GroupResource, Result};
use crate::mapper::{self, ResourceEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration: the discovery rule set plus the ambient settings around it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Ordered discovery rules; earlier rules take priority
    pub rules: Vec<DiscoveryRule>,
    /// Known resource kinds for the static resource mapper
    pub resource_mappings: Vec<ResourceEntry>,
    /// Discovery settings
    pub discovery: DiscoveryConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// One declarative rule describing how a family of series becomes metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRule {
    /// Series selector used to fetch candidate series
    pub series_query: String,
    /// Extra filters applied to the series name, ANDed in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series_filters: Vec<RegexFilter>,
    /// How labels map onto resources
    #[serde(default)]
    pub resources: ResourceMapping,
    /// How series names map onto metric names
    #[serde(default)]
    pub name: NameMapping,
    /// Query template producing one value per target object
    pub metrics_query: String,
}

/// A positive (`is`) or negative (`isNot`) regex filter. Exactly one must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegexFilter {
    /// Keep names matching this pattern
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub is: String,
    /// Drop names matching this pattern
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub is_not: String,
}

impl RegexFilter {
    /// Filter keeping names that match `pattern`
    pub fn is(pattern: impl Into<String>) -> Self {
        RegexFilter {
            is: pattern.into(),
            is_not: String::new(),
        }
    }

    /// Filter dropping names that match `pattern`
    pub fn is_not(pattern: impl Into<String>) -> Self {
        RegexFilter {
            is: String::new(),
            is_not: pattern.into(),
        }
    }
}

/// Label to resource mapping for a rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMapping {
    /// Label name template, e.g. `kube_<<.Group>>_<<.Resource>>`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template: String,
    /// Explicit label name to resource overrides
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, GroupResource>,
}

/// Series name to metric name mapping for a rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NameMapping {
    /// Regex the series name must match
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub matches: String,
    /// Substitution producing the metric name (`$1`, `${name}`, ...)
    #[serde(default, rename = "as", skip_serializing_if = "String::is_empty")]
    pub as_: String,
}

/// Discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiscoveryConfig {
    /// Interval between discovery passes
    #[serde(with = "humantime_serde")]
    pub update_interval: Duration,
    /// Rate window used by the default rules
    #[serde(with = "humantime_serde")]
    pub rate_interval: Duration,
    /// Prefix of resource labels used by the default rules
    pub label_prefix: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured logging format
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything
    Trace,
    /// Cache and rule details
    Debug,
    /// Reloads and discovery passes
    Info,
    /// Skipped labels and series
    Warn,
    /// Failures only
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rules: Vec::new(),
            resource_mappings: mapper::default_entries(),
            discovery: DiscoveryConfig::default(),
            logging: LoggingConfig::default(),
            debug: false,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            update_interval: Duration::from_secs(10 * 60),
            rate_interval: Duration::from_secs(60),
            label_prefix: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with the default rules
    pub fn new() -> Result<Self> {
        ConfigBuilder::new().build()
    }

    /// Validate the configuration.
    ///
    /// Regexes and templates are checked when the rules are compiled into namers.
    pub fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(AdapterError::config("at least one discovery rule is required"));
        }

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.series_query.trim().is_empty() {
                return Err(AdapterError::config(format!(
                    "rule {} has an empty seriesQuery",
                    index
                )));
            }
            if rule.metrics_query.trim().is_empty() {
                return Err(AdapterError::config("metricsQuery must not be empty")
                    .in_rule(index, &rule.series_query));
            }
        }

        if self.discovery.update_interval.is_zero() {
            return Err(AdapterError::config("updateInterval must be greater than 0"));
        }

        if self.discovery.rate_interval.is_zero() {
            return Err(AdapterError::config("rateInterval must be greater than 0"));
        }

        for entry in &self.resource_mappings {
            if entry.resource.is_empty() || entry.singular.is_empty() {
                return Err(AdapterError::config(format!(
                    "resource mapping in group {:?} needs both resource and singular names",
                    entry.group
                )));
            }
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| AdapterError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Load configuration from a YAML file
    pub fn from_file(self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AdapterError::config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        self.from_yaml(&content)
    }

    /// Replace the rule set
    pub fn rules(mut self, rules: Vec<DiscoveryRule>) -> Self {
        self.config.rules = rules;
        self
    }

    /// Append one rule
    pub fn rule(mut self, rule: DiscoveryRule) -> Self {
        self.config.rules.push(rule);
        self
    }

    /// Set the label prefix used by the default rules
    pub fn label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.discovery.label_prefix = prefix.into();
        self
    }

    /// Set the rate window used by the default rules
    pub fn rate_interval(mut self, interval: Duration) -> Self {
        self.config.discovery.rate_interval = interval;
        self
    }

    /// Set the discovery interval
    pub fn update_interval(mut self, interval: Duration) -> Self {
        self.config.discovery.update_interval = interval;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration.
    ///
    /// An empty rule set is replaced by the default rules for the configured
    /// rate interval and label prefix.
    pub fn build(mut self) -> Result<Config> {
        if self.config.rules.is_empty() {
            self.config.rules = defaults::default_rules(
                self.config.discovery.rate_interval,
                &self.config.discovery.label_prefix,
            );
        }
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings given on the command line that win over the rule file.
///
/// Kept alongside the watcher so a reloaded file is rebuilt with the same
/// prefix and rate window the process started with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    /// Label prefix for the default rules
    pub label_prefix: Option<String>,
    /// Rate window for the default rules
    pub rate_interval: Option<Duration>,
    /// Debug mode
    pub debug: bool,
}

impl ConfigOverrides {
    /// Apply the overrides on top of a builder
    pub fn apply(&self, mut builder: ConfigBuilder) -> ConfigBuilder {
        if let Some(prefix) = &self.label_prefix {
            builder = builder.label_prefix(prefix.clone());
        }
        if let Some(interval) = self.rate_interval {
            builder = builder.rate_interval(interval);
        }
        builder.debug(self.debug)
    }

    /// Build a config from YAML text with the overrides applied
    pub fn rebuild(&self, yaml: &str) -> Result<Config> {
        self.apply(ConfigBuilder::new().from_yaml(yaml)?).build()
    }
}

/// Watch configuration file for changes
pub struct ConfigWatcher {
    path: PathBuf,
    overrides: ConfigOverrides,
    tx: tokio::sync::watch::Sender<Config>,
    rx: tokio::sync::watch::Receiver<Config>,
}

impl ConfigWatcher {
    /// Create a new configuration watcher
    pub fn new(path: PathBuf, initial: Config) -> Self {
        let (tx, rx) = tokio::sync::watch::channel(initial);
        ConfigWatcher {
            path,
            overrides: ConfigOverrides::default(),
            tx,
            rx,
        }
    }

    /// Reapply these overrides to every reloaded file
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Get a receiver for configuration updates
    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<Config> {
        self.rx.clone()
    }

    /// Start watching for configuration changes
    pub async fn watch(self) -> Result<()> {
        use notify::{RecursiveMode, Watcher};

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        })
        .map_err(|e| AdapterError::config(format!("Failed to create file watcher: {}", e)))?;

        watcher
            .watch(&self.path, RecursiveMode::NonRecursive)
            .map_err(|e| AdapterError::config(format!("Failed to watch config file: {}", e)))?;

        tracing::info!("Watching configuration file: {:?}", self.path);

        while let Some(event) = rx.recv().await {
            let notify::Event { kind, .. } = event;
            if !matches!(kind, notify::EventKind::Modify(_)) {
                continue;
            }

            tracing::info!("Configuration file changed, reloading...");

            let content = match tokio::fs::read_to_string(&self.path).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::error!("Failed to read configuration file: {}", e);
                    continue;
                },
            };

            match self.overrides.rebuild(&content) {
                Ok(new_config) => {
                    if self.tx.send(new_config).is_err() {
                        tracing::warn!("No subscribers left, stopping configuration watcher");
                        break;
                    }
                    tracing::info!("Configuration reloaded successfully");
                },
                Err(e) => {
                    tracing::error!("Invalid configuration, keeping previous rules: {}", e);
                },
            }
        }

        Ok(())
    }
}
