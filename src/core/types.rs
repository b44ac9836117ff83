//! Identifiers for series, resources and discovered metrics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label carrying the series name in the Prometheus series API.
pub const NAME_LABEL: &str = "__name__";

/// A kind of cluster object, identified by API group and plural resource name.
///
/// Values handed out by the naming layer are always normalized through a
/// [`ResourceMapper`](crate::mapper::ResourceMapper) first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupResource {
    /// API group, empty for the core group
    #[serde(default)]
    pub group: String,
    /// Resource name (plural once normalized)
    pub resource: String,
}

impl GroupResource {
    /// Creates a group-resource from its parts
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        GroupResource {
            group: group.into(),
            resource: resource.into(),
        }
    }

    /// Creates a group-resource in the core (empty) group
    pub fn core(resource: impl Into<String>) -> Self {
        Self::new("", resource)
    }

    /// The well-known namespaces resource
    pub fn namespaces() -> Self {
        Self::core("namespaces")
    }

    /// Returns true if this is the namespaces resource
    pub fn is_namespaces(&self) -> bool {
        self.group.is_empty() && self.resource == "namespaces"
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}

/// A named time series and its label set, as returned by the backend's series API.
///
/// Serialized in the backend's wire form: a flat object whose `__name__`
/// entry holds the series name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Series {
    /// Series (metric) name
    pub name: String,
    /// Label names to values, excluding the name label
    pub labels: BTreeMap<String, String>,
}

impl Series {
    /// Creates a series from a name and label pairs
    pub fn new<I, K, V>(name: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Series {
            name: name.into(),
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<BTreeMap<String, String>> for Series {
    fn from(mut labels: BTreeMap<String, String>) -> Self {
        let name = labels.remove(NAME_LABEL).unwrap_or_default();
        Series { name, labels }
    }
}

impl From<Series> for BTreeMap<String, String> {
    fn from(series: Series) -> Self {
        let mut labels = series.labels;
        labels.insert(NAME_LABEL.to_string(), series.name);
        labels
    }
}

/// A metric as presented by the custom metrics API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricInfo {
    /// Resource the metric describes
    pub group_resource: GroupResource,
    /// Whether objects of that resource live inside a namespace
    pub namespaced: bool,
    /// Externally visible metric name
    pub metric: String,
}

impl MetricInfo {
    /// Creates a new metric descriptor
    pub fn new(group_resource: GroupResource, namespaced: bool, metric: impl Into<String>) -> Self {
        MetricInfo {
            group_resource,
            namespaced,
            metric: metric.into(),
        }
    }
}

impl fmt::Display for MetricInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespaced {
            write!(f, "{}/{}(namespaced)", self.group_resource, self.metric)
        } else {
            write!(f, "{}/{}", self.group_resource, self.metric)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_resource_display() {
        assert_eq!(GroupResource::core("pods").to_string(), "pods");
        assert_eq!(
            GroupResource::new("apps", "deployments").to_string(),
            "deployments.apps"
        );
    }

    #[test]
    fn test_namespaces_resource() {
        assert!(GroupResource::namespaces().is_namespaces());
        assert!(!GroupResource::new("example.com", "namespaces").is_namespaces());
    }

    #[test]
    fn test_series_wire_format() {
        let json = r#"{"__name__":"http_requests_total","pod":"web-0","namespace":"prod"}"#;
        let series: Series = serde_json::from_str(json).unwrap();
        assert_eq!(series.name, "http_requests_total");
        assert_eq!(series.labels.len(), 2);
        assert_eq!(series.labels.get("pod").map(String::as_str), Some("web-0"));

        let back = serde_json::to_string(&series).unwrap();
        assert!(back.contains(r#""__name__":"http_requests_total""#));
    }

    #[test]
    fn test_metric_info_ordering() {
        let a = MetricInfo::new(GroupResource::core("namespaces"), false, "hits");
        let b = MetricInfo::new(GroupResource::core("pods"), true, "hits");
        assert!(a < b);
        assert_eq!(b.to_string(), "pods/hits(namespaced)");
    }
}
