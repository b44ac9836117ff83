//! Index of discovered metrics.

use crate::core::{AdapterError, GroupResource, MetricInfo, Result, Series};
use crate::naming::{MetricNamer, NamerSet};
use crate::query::Selector;
use ahash::AHashMap;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Where a discovered metric comes from
#[derive(Debug, Clone)]
pub struct SeriesInfo {
    /// Backend series name
    pub series_name: String,
    /// Namer of the rule that claimed the series
    pub namer: Arc<MetricNamer>,
}

#[derive(Debug, Default)]
struct RegistryIndex {
    info: AHashMap<MetricInfo, SeriesInfo>,
    metrics: Vec<MetricInfo>,
}

/// Holds the metrics found by the last discovery pass.
///
/// Readers always see one complete pass; [`set_series`](Self::set_series)
/// builds a new index and swaps it in atomically.
#[derive(Debug, Default)]
pub struct SeriesRegistry {
    index: ArcSwap<RegistryIndex>,
}

impl SeriesRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the index with the given series.
    ///
    /// `new_series[i]` must hold the already filtered series for the i-th
    /// namer. When two rules produce the same metric the earlier rule keeps it.
    pub fn set_series(&self, new_series: &[Vec<Series>], namers: &NamerSet) -> Result<()> {
        if new_series.len() != namers.len() {
            return Err(AdapterError::config(format!(
                "need one set of series per namer ({} namers, {} series sets)",
                namers.len(),
                new_series.len()
            )));
        }

        let mut info: AHashMap<MetricInfo, SeriesInfo> = AHashMap::new();
        for (series_set, namer) in new_series.iter().zip(namers) {
            for series in series_set {
                let name = match namer.metric_name_for_series(series) {
                    Ok(name) => name,
                    Err(e) => {
                        tracing::error!(series = %series.name, error = %e, "unable to name series, skipping");
                        continue;
                    },
                };

                let (resources, namespaced) = namer.resources_for_series(series);
                for resource in resources {
                    // namespaces themselves are never namespaced
                    let namespaced = namespaced && !resource.is_namespaces();
                    info.entry(MetricInfo::new(resource, namespaced, name.clone()))
                        .or_insert_with(|| SeriesInfo {
                            series_name: series.name.clone(),
                            namer: Arc::clone(namer),
                        });
                }
            }
        }

        let mut metrics: Vec<MetricInfo> = info.keys().cloned().collect();
        metrics.sort();

        tracing::debug!(metrics = metrics.len(), "publishing discovered metrics");
        self.index.store(Arc::new(RegistryIndex { info, metrics }));
        Ok(())
    }

    /// All metrics from the last pass, sorted
    pub fn list_all_metrics(&self) -> Vec<MetricInfo> {
        self.index.load().metrics.clone()
    }

    /// Number of known metrics
    pub fn len(&self) -> usize {
        self.index.load().metrics.len()
    }

    /// Returns true if no metrics are known
    pub fn is_empty(&self) -> bool {
        self.index.load().metrics.is_empty()
    }

    /// Returns the series name and namer behind a metric
    pub fn series_for_metric(&self, info: &MetricInfo) -> Result<SeriesInfo> {
        self.index
            .load()
            .info
            .get(info)
            .cloned()
            .ok_or_else(|| AdapterError::MetricNotFound(info.to_string()))
    }

    /// Builds the query for `info` restricted to the named objects
    pub fn query_for_metric<S: AsRef<str>>(
        &self,
        info: &MetricInfo,
        namespace: &str,
        names: &[S],
    ) -> Result<Selector> {
        let SeriesInfo { series_name, namer } = self.series_for_metric(info)?;
        let resource: &GroupResource = &info.group_resource;
        namer.query_for_series(&series_name, resource, namespace, names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConfigBuilder, DiscoveryRule, NameMapping, ResourceMapping};
    use crate::mapper::{ResourceMapper, StaticResourceMapper};

    fn namers() -> NamerSet {
        let config = ConfigBuilder::new().build().unwrap();
        let mapper: Arc<dyn ResourceMapper> = Arc::new(StaticResourceMapper::default());
        NamerSet::from_rules(&config.rules, mapper).unwrap()
    }

    #[test]
    fn test_mismatched_lengths() {
        let registry = SeriesRegistry::new();
        assert!(registry.set_series(&[Vec::new()], &namers()).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_metric() {
        let registry = SeriesRegistry::new();
        let info = MetricInfo::new(GroupResource::core("pods"), true, "nope");
        let err = registry.query_for_metric(&info, "default", &["a"]).unwrap_err();
        assert!(matches!(err, AdapterError::MetricNotFound(_)));
    }

    #[test]
    fn test_earlier_rule_wins() {
        let rule = |aggregation: &str| DiscoveryRule {
            series_query: r#"{__name__=~"^requests_.*"}"#.to_string(),
            resources: ResourceMapping {
                template: "<<.Resource>>".to_string(),
                ..Default::default()
            },
            name: NameMapping {
                matches: "^(.*)_total$".to_string(),
                as_: String::new(),
            },
            metrics_query: format!("{}(<<.Series>>{{<<.LabelMatchers>>}}) by (<<.GroupBy>>)", aggregation),
            ..Default::default()
        };
        let mapper: Arc<dyn ResourceMapper> = Arc::new(StaticResourceMapper::default());
        let namers = NamerSet::from_rules(&[rule("sum"), rule("max")], mapper).unwrap();

        let series = Series::new("requests_total", [("namespace", "ns"), ("pod", "p")]);
        let registry = SeriesRegistry::new();
        registry
            .set_series(&[vec![series.clone()], vec![series]], &namers)
            .unwrap();

        let info = MetricInfo::new(GroupResource::core("pods"), true, "requests");
        let owner = registry.series_for_metric(&info).unwrap();
        assert!(Arc::ptr_eq(&owner.namer, namers.get(0).unwrap()));

        let query = registry.query_for_metric(&info, "ns", &["p"]).unwrap();
        assert_eq!(
            query.as_str(),
            r#"sum(requests_total{namespace="ns",pod="p"}) by (pod)"#
        );
        assert_eq!(registry.len(), 2);
    }
}
