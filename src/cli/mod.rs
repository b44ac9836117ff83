//! Command-line interface for promdapt.
//!
//! Loads and validates a discovery rule set, optionally classifies a
//! dump of series against it, and can keep the rules reloaded while the
//! file changes. Run `promdapt --print-default-config` for a starting point.

use crate::core::config::ConfigBuilder;
use crate::core::{AdapterError, Config, ConfigOverrides, ConfigWatcher, LoggingConfig, Result};
use crate::provider::{MetricsProvider, StaticSeriesClient};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Maps flat Prometheus series onto resource-scoped custom metrics
#[derive(Parser, Debug)]
#[command(name = "promdapt")]
#[command(version, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Rule set file (default: ~/.config/promdapt/config.yaml)
    #[arg(short, long, env = "PROMDAPT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "PROMDAPT_DEBUG")]
    pub debug: bool,

    /// Prefix of resource labels used by the default rules
    #[arg(long, env = "PROMDAPT_LABEL_PREFIX")]
    pub label_prefix: Option<String>,

    /// Rate window used by the default rules (e.g. "1m", "90s")
    #[arg(long, env = "PROMDAPT_RATE_INTERVAL", value_parser = humantime::parse_duration)]
    pub rate_interval: Option<Duration>,

    /// Compile the rules and exit
    #[arg(long)]
    pub check_config: bool,

    /// Print the built-in rule set as YAML and exit
    #[arg(long)]
    pub print_default_config: bool,

    /// Classify the series in this JSON file (series API response) and print the metrics found
    #[arg(long, value_name = "FILE")]
    pub series: Option<PathBuf>,

    /// Keep reloading the rule file on change until interrupted
    #[arg(long)]
    pub watch: bool,

    /// Show version information
    #[arg(short = 'V', long = "show-version")]
    pub version: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Default rule file location
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("promdapt").join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("~/.config/promdapt/config.yaml"))
    }

    /// The rule file to read, if any: the explicit path, else the default
    /// location when it exists.
    pub fn config_path(&self) -> Option<PathBuf> {
        match &self.config {
            Some(path) => Some(path.clone()),
            None => Some(Self::default_config_path()).filter(|p| p.exists()),
        }
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables
    /// 3. Config file
    /// 4. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let Some(config_path) = self.config_path() else {
            return self.build_config_from_args(builder);
        };

        match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => {
                builder = builder.from_yaml(&content)?;
            },
            Err(e) => {
                return Err(AdapterError::config(format!(
                    "Failed to read config file {:?}: {}",
                    config_path, e
                )));
            },
        }

        self.build_config_from_args(builder)
    }

    /// Settings from the command line that win over the rule file
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            label_prefix: self.label_prefix.clone(),
            rate_interval: self.rate_interval,
            debug: self.debug,
        }
    }

    fn build_config_from_args(&self, builder: ConfigBuilder) -> Result<Config> {
        self.overrides().apply(builder).build()
    }

    /// Fallback log filter when `RUST_LOG` is unset: `--debug`, then
    /// `PROMDAPT_LOG_LEVEL`, then the `logging.level` of the rule file.
    pub fn log_level(&self, env_level: Option<String>, logging: &LoggingConfig) -> String {
        if self.debug {
            return "debug".to_string();
        }
        env_level.unwrap_or_else(|| logging.level.as_str().to_string())
    }

    /// Initialize logging based on flags, environment and the loaded config.
    pub fn init_logging(&self, logging: &LoggingConfig) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let log_level = self.log_level(std::env::var("PROMDAPT_LOG_LEVEL").ok(), logging);
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let json_layer = logging.structured.then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(self.debug)
                .with_writer(std::io::stderr)
                .json()
        });
        let compact_layer = (!logging.structured).then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(self.debug)
                .with_writer(std::io::stderr)
                .compact()
        });

        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .with(compact_layer)
            .try_init()
            .map_err(|e| AdapterError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Execute the command.
pub async fn execute(cli: Cli) -> Result<()> {
    if cli.version {
        println!("promdapt {}", env!("CARGO_PKG_VERSION"));
        println!("Prometheus series to custom metrics rule engine");
        return Ok(());
    }

    if cli.print_default_config {
        let config = cli.build_config_from_args(ConfigBuilder::new())?;
        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| AdapterError::config(format!("Failed to render config: {}", e)))?;
        print!("{}", yaml);
        return Ok(());
    }

    let config = cli.load_config().await?;
    cli.init_logging(&config.logging)?;
    match cli.config_path() {
        Some(path) => tracing::info!("Loaded configuration from: {:?}", path),
        None => tracing::debug!("No config file found, using default rules"),
    }

    let provider = MetricsProvider::from_config(&config)?;

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  Rules: {}", config.rules.len());
        println!("  Known resources: {}", config.resource_mappings.len());
        println!("  Rate interval: {}", humantime::format_duration(config.discovery.rate_interval));
        println!("  Update interval: {}", humantime::format_duration(config.discovery.update_interval));
        return Ok(());
    }

    if let Some(path) = &cli.series {
        let client = StaticSeriesClient::from_file(path).await?;
        tracing::info!(series = client.len(), "Classifying series from {:?}", path);
        provider.update_metrics(&client).await?;
        print_metrics(&provider);
    } else if !cli.watch {
        print_rules(&provider);
    }

    if cli.watch {
        let path = cli.config_path().ok_or_else(|| {
            AdapterError::config("--watch needs a config file (use --config)")
        })?;
        watch_rules(path, config, cli.overrides(), provider).await?;
    }

    Ok(())
}

fn print_rules(provider: &MetricsProvider) {
    let namers = provider.namers();
    println!("{} discovery rules:", namers.len());
    for (index, namer) in namers.iter().enumerate() {
        println!("  [{}] {}", index, namer.selector());
    }
}

fn print_metrics(provider: &MetricsProvider) {
    let metrics = provider.list_all_metrics();
    println!("{} metrics discovered:", metrics.len());
    for info in &metrics {
        println!("  {}", info);
        let namespace = if info.namespaced { "<namespace>" } else { "" };
        match provider.query_for_metric(info, namespace, &["<name>"]) {
            Ok(query) => println!("      {}", query),
            Err(e) => println!("      (no query: {})", e),
        }
    }
}

async fn watch_rules(
    path: PathBuf,
    config: Config,
    overrides: ConfigOverrides,
    provider: MetricsProvider,
) -> Result<()> {
    let watcher = ConfigWatcher::new(path, config).with_overrides(overrides);
    let mut updates = watcher.subscribe();
    let watch_handle = tokio::spawn(watcher.watch());

    tracing::info!("Watching rule file, press Ctrl-C to stop");

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    tracing::warn!("Configuration watcher stopped");
                    break;
                }
                let config = updates.borrow_and_update().clone();
                if let Err(e) = provider.reload(&config) {
                    tracing::error!(category = e.category(), "Rejected reloaded rules: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal, stopping...");
                break;
            }
        }
    }

    watch_handle.abort();
    Ok(())
}
