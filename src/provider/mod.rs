//! The surface consulted by discovery and serving.
//!
//! [`MetricsProvider`] owns the compiled rules and the index of discovered
//! metrics. Rule reloads build a complete new [`NamerSet`] and swap it in;
//! requests already holding the previous set finish against it.

mod client;
mod lister;
mod registry;

pub use client::{SeriesClient, StaticSeriesClient};
pub use lister::MetricsLister;
pub use registry::{SeriesInfo, SeriesRegistry};

use crate::core::{Config, MetricInfo, Result};
use crate::mapper::{ResourceMapper, StaticResourceMapper};
use crate::naming::NamerSet;
use crate::query::Selector;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Compiled rules, resource mapper and discovered metrics
pub struct MetricsProvider {
    namers: ArcSwap<NamerSet>,
    mapper: Arc<dyn ResourceMapper>,
    registry: Arc<SeriesRegistry>,
}

impl MetricsProvider {
    /// Builds a provider whose mapper is the config's static resource table
    pub fn from_config(config: &Config) -> Result<Self> {
        let mapper: Arc<dyn ResourceMapper> =
            Arc::new(StaticResourceMapper::new(config.resource_mappings.clone()));
        Self::new(config, mapper)
    }

    /// Builds a provider around an existing resource mapper
    pub fn new(config: &Config, mapper: Arc<dyn ResourceMapper>) -> Result<Self> {
        let namers = NamerSet::from_rules(&config.rules, Arc::clone(&mapper))?;
        Ok(MetricsProvider {
            namers: ArcSwap::from_pointee(namers),
            mapper,
            registry: Arc::new(SeriesRegistry::new()),
        })
    }

    /// The current namer set
    pub fn namers(&self) -> Arc<NamerSet> {
        self.namers.load_full()
    }

    /// The resource mapper shared by every namer
    pub fn mapper(&self) -> &Arc<dyn ResourceMapper> {
        &self.mapper
    }

    /// Index of discovered metrics
    pub fn registry(&self) -> &Arc<SeriesRegistry> {
        &self.registry
    }

    /// Compiles `config`'s rules and swaps them in.
    ///
    /// On error the current rules stay in place. The mapper is kept; the
    /// registry keeps serving the last pass until the next update.
    pub fn reload(&self, config: &Config) -> Result<()> {
        let namers = NamerSet::from_rules(&config.rules, Arc::clone(&self.mapper))?;
        tracing::info!(rules = namers.len(), "swapping in reloaded discovery rules");
        self.namers.store(Arc::new(namers));
        Ok(())
    }

    /// A lister bound to the current namer set
    pub fn lister(&self) -> MetricsLister {
        MetricsLister::new(self.namers(), Arc::clone(&self.registry))
    }

    /// Runs one discovery pass with the current rules
    pub async fn update_metrics(&self, client: &dyn SeriesClient) -> Result<usize> {
        self.lister().update_metrics(client).await
    }

    /// All metrics from the last discovery pass, sorted
    pub fn list_all_metrics(&self) -> Vec<MetricInfo> {
        self.registry.list_all_metrics()
    }

    /// Builds the query for a discovered metric restricted to the named objects
    pub fn query_for_metric<S: AsRef<str>>(
        &self,
        info: &MetricInfo,
        namespace: &str,
        names: &[S],
    ) -> Result<Selector> {
        self.registry.query_for_metric(info, namespace, names)
    }
}

impl std::fmt::Debug for MetricsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsProvider")
            .field("rules", &self.namers.load().len())
            .field("metrics", &self.registry.len())
            .finish_non_exhaustive()
    }
}
