//! One discovery pass: fetch, filter, publish.

use super::client::SeriesClient;
use super::registry::SeriesRegistry;
use crate::core::{AdapterError, Result, Series};
use crate::naming::NamerSet;
use crate::query::Selector;
use ahash::AHashMap;
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Instant;

/// Refreshes a [`SeriesRegistry`] from a [`SeriesClient`].
///
/// Scheduling belongs to the caller; each [`update_metrics`](Self::update_metrics)
/// call is one complete pass over the namer set it was created with.
pub struct MetricsLister {
    namers: Arc<NamerSet>,
    registry: Arc<SeriesRegistry>,
}

impl MetricsLister {
    /// Creates a lister publishing into `registry`
    pub fn new(namers: Arc<NamerSet>, registry: Arc<SeriesRegistry>) -> Self {
        MetricsLister { namers, registry }
    }

    /// Runs one discovery pass and returns the number of metrics published.
    ///
    /// Rules sharing a selector share one backend call. Any fetch failure
    /// aborts the pass and leaves the previous index in place.
    pub async fn update_metrics(&self, client: &dyn SeriesClient) -> Result<usize> {
        let start = Instant::now();

        let mut selectors: Vec<&Selector> = Vec::new();
        for namer in self.namers.as_ref() {
            if !selectors.contains(&namer.selector()) {
                selectors.push(namer.selector());
            }
        }

        let fetched = try_join_all(selectors.iter().map(|sel| async move {
            let series = client.series(std::slice::from_ref(*sel)).await?;
            tracing::debug!(selector = %sel, series = series.len(), "fetched series");
            Ok::<_, AdapterError>((*sel, series))
        }))
        .await?;
        let by_selector: AHashMap<&Selector, Vec<Series>> = fetched.into_iter().collect();

        let new_series: Vec<Vec<Series>> = self
            .namers
            .iter()
            .map(|namer| {
                by_selector
                    .get(namer.selector())
                    .map(|series| namer.filter_series(series).into_iter().cloned().collect())
                    .unwrap_or_default()
            })
            .collect();

        self.registry.set_series(&new_series, &self.namers)?;
        let published = self.registry.len();

        tracing::info!(
            selectors = by_selector.len(),
            metrics = published,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "updated list of available metrics"
        );
        Ok(published)
    }
}
