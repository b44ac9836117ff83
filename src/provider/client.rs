//! The backend seam used by discovery.

use crate::core::{AdapterError, Result, Series};
use crate::query::{Selector, SeriesMatcher};
use serde::Deserialize;
use std::path::Path;

/// Source of series metadata, normally the Prometheus `/api/v1/series` endpoint.
#[async_trait::async_trait]
pub trait SeriesClient: Send + Sync {
    /// Returns every series matching any of `selectors`
    async fn series(&self, selectors: &[Selector]) -> Result<Vec<Series>>;
}

/// A [`SeriesClient`] answering from a fixed list of series.
///
/// Selectors are evaluated locally, so only plain label matchers are
/// supported.
#[derive(Debug, Clone, Default)]
pub struct StaticSeriesClient {
    series: Vec<Series>,
}

/// Either a bare series list or a full API response wrapping one
#[derive(Deserialize)]
#[serde(untagged)]
enum SeriesDocument {
    List(Vec<Series>),
    Response { data: Vec<Series> },
}

impl StaticSeriesClient {
    /// Creates a client over the given series
    pub fn new(series: Vec<Series>) -> Self {
        StaticSeriesClient { series }
    }

    /// Parses a series API response, or just its `data` array
    pub fn from_json(json: &str) -> Result<Self> {
        let series = match serde_json::from_str(json)? {
            SeriesDocument::List(series) | SeriesDocument::Response { data: series } => series,
        };
        Ok(Self::new(series))
    }

    /// Loads series from a JSON file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AdapterError::client(format!("Failed to read series file {:?}: {}", path, e))
        })?;
        Self::from_json(&content)
    }

    /// Number of series held
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Returns true if no series are held
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[async_trait::async_trait]
impl SeriesClient for StaticSeriesClient {
    async fn series(&self, selectors: &[Selector]) -> Result<Vec<Series>> {
        let matchers = selectors
            .iter()
            .map(SeriesMatcher::parse)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| AdapterError::client(e.to_string()))?;

        Ok(self
            .series
            .iter()
            .filter(|s| matchers.iter().any(|m| m.matches(s)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_api_response() {
        let json = r#"{
            "status": "success",
            "data": [
                {"__name__": "up", "job": "api"},
                {"__name__": "http_requests_total", "job": "api", "pod": "web-0"}
            ]
        }"#;
        let client = StaticSeriesClient::from_json(json).unwrap();
        assert_eq!(client.len(), 2);

        let found = client
            .series(&[Selector::from(r#"{__name__=~"http_.*"}"#)])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].labels.get("pod").map(String::as_str), Some("web-0"));
    }

    #[tokio::test]
    async fn test_bare_list_and_union() {
        let client =
            StaticSeriesClient::from_json(r#"[{"__name__": "a"}, {"__name__": "b"}]"#).unwrap();
        let found = client
            .series(&[Selector::from("a"), Selector::from("b")])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_selector() {
        let client = StaticSeriesClient::default();
        let err = client
            .series(&[Selector::from("rate(x[1m])")])
            .await
            .unwrap_err();
        assert_eq!(err.category(), "client");
    }
}
