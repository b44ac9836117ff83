//! promdapt - Prometheus series to custom metrics rule engine.
//!
//! promdapt turns the flat Prometheus series namespace (a name plus a label
//! set) into metrics scoped to cluster resources, driven by a declarative
//! rule set, and renders the queries that aggregate a series down to one
//! value per target object.
//!
//! # Architecture
//!
//! - `core`: domain types, errors, configuration and the default rules
//! - `query`: selector rendering, `<<.Field>>` templates, selector evaluation
//! - `mapper`: resource name normalization
//! - `naming`: rule compilation and the per-rule naming engine
//! - `provider`: discovery passes and the index of discovered metrics
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use promdapt_lib::core::Config;
//! use promdapt_lib::provider::{MetricsProvider, StaticSeriesClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new()?;
//!     let provider = MetricsProvider::from_config(&config)?;
//!     let client = StaticSeriesClient::from_json(r#"[{"__name__": "up", "namespace": "default"}]"#)?;
//!     provider.update_metrics(&client).await?;
//!     for metric in provider.list_all_metrics() {
//!         println!("{}", metric);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod mapper;
pub mod naming;
pub mod provider;
pub mod query;

// Re-export core types for convenience
pub use crate::core::{AdapterError, Config, Result};
