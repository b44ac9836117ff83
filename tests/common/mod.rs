//! Common test utilities and fixtures.

#![allow(dead_code)]

use ahash::AHashMap;
use parking_lot::Mutex;
use promdapt_lib::core::{
    AdapterError, DiscoveryRule, GroupResource, NameMapping, Result, ResourceMapping, Series,
};
use promdapt_lib::mapper::{ResourceMapper, StaticResourceMapper};
use promdapt_lib::query::Selector;
use promdapt_lib::provider::SeriesClient;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Resource mapper wrapping the static table and counting calls.
#[derive(Default)]
pub struct CountingMapper {
    inner: StaticResourceMapper,
    pub normalize_calls: AtomicUsize,
    pub singularize_calls: AtomicUsize,
}

impl CountingMapper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn singularize_count(&self) -> usize {
        self.singularize_calls.load(Ordering::SeqCst)
    }
}

impl ResourceMapper for CountingMapper {
    fn normalize(&self, resource: &GroupResource) -> Result<GroupResource> {
        self.normalize_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.normalize(resource)
    }

    fn singularize(&self, resource: &str) -> Result<String> {
        self.singularize_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.singularize(resource)
    }
}

pub fn static_mapper() -> Arc<dyn ResourceMapper> {
    Arc::new(StaticResourceMapper::default())
}

/// Series client answering by exact selector text, like a recorded backend.
#[derive(Default)]
pub struct FakeSeriesClient {
    pub series: AHashMap<String, Vec<Series>>,
    pub errors: AHashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSeriesClient {
    pub fn with_series(mut self, selector: &Selector, series: Vec<Series>) -> Self {
        self.series.insert(selector.as_str().to_string(), series);
        self
    }

    pub fn with_error(mut self, selector: &Selector, msg: &str) -> Self {
        self.errors.insert(selector.as_str().to_string(), msg.to_string());
        self
    }
}

#[async_trait::async_trait]
impl SeriesClient for FakeSeriesClient {
    async fn series(&self, selectors: &[Selector]) -> Result<Vec<Series>> {
        let mut out = Vec::new();
        for sel in selectors {
            self.calls.lock().push(sel.as_str().to_string());
            if let Some(msg) = self.errors.get(sel.as_str()) {
                return Err(AdapterError::client(msg.clone()));
            }
            if let Some(series) = self.series.get(sel.as_str()) {
                out.extend(series.iter().cloned());
            }
        }
        Ok(out)
    }
}

/// A rule over `app_*` series with a generic `<<.Resource>>` label template.
pub fn templated_rule(metrics_query: &str) -> DiscoveryRule {
    DiscoveryRule {
        series_query: r#"{__name__=~"^app_.*"}"#.to_string(),
        resources: ResourceMapping {
            template: "<<.Resource>>".to_string(),
            ..Default::default()
        },
        name: NameMapping::default(),
        metrics_query: metrics_query.to_string(),
        ..Default::default()
    }
}

pub const SUM_QUERY: &str = "sum(<<.Series>>{<<.LabelMatchers>>}) by (<<.GroupBy>>)";
