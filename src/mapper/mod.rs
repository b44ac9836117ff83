//! Resource name normalization.
//!
//! The naming rules never compare or cache a [`GroupResource`] until a
//! [`ResourceMapper`] has turned it into its canonical (plural, fully
//! grouped) form. In a cluster that job belongs to the API discovery
//! client; [`StaticResourceMapper`] answers from a fixed table instead.

use crate::core::{AdapterError, GroupResource, Result};
use serde::{Deserialize, Serialize};

/// Maps resource names to their canonical forms. Must be safe for concurrent use.
pub trait ResourceMapper: Send + Sync {
    /// Returns the canonical (plural, grouped) form of `resource`
    fn normalize(&self, resource: &GroupResource) -> Result<GroupResource>;

    /// Returns the singular name of a plural resource
    fn singularize(&self, resource: &str) -> Result<String>;
}

/// One known resource kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// API group, empty for the core group
    #[serde(default)]
    pub group: String,
    /// Plural resource name
    pub resource: String,
    /// Singular resource name
    pub singular: String,
}

impl ResourceEntry {
    /// Creates a new table entry
    pub fn new(group: &str, resource: &str, singular: &str) -> Self {
        ResourceEntry {
            group: group.to_string(),
            resource: resource.to_string(),
            singular: singular.to_string(),
        }
    }

    fn names(&self, name: &str) -> bool {
        self.resource.eq_ignore_ascii_case(name) || self.singular.eq_ignore_ascii_case(name)
    }
}

/// Well-known Kubernetes resources, in lookup priority order
pub fn default_entries() -> Vec<ResourceEntry> {
    vec![
        ResourceEntry::new("", "namespaces", "namespace"),
        ResourceEntry::new("", "pods", "pod"),
        ResourceEntry::new("", "services", "service"),
        ResourceEntry::new("", "nodes", "node"),
        ResourceEntry::new("", "persistentvolumeclaims", "persistentvolumeclaim"),
        ResourceEntry::new("", "persistentvolumes", "persistentvolume"),
        ResourceEntry::new("", "replicationcontrollers", "replicationcontroller"),
        ResourceEntry::new("apps", "deployments", "deployment"),
        ResourceEntry::new("apps", "statefulsets", "statefulset"),
        ResourceEntry::new("apps", "daemonsets", "daemonset"),
        ResourceEntry::new("apps", "replicasets", "replicaset"),
        ResourceEntry::new("batch", "jobs", "job"),
        ResourceEntry::new("batch", "cronjobs", "cronjob"),
        ResourceEntry::new("networking.k8s.io", "ingresses", "ingress"),
        ResourceEntry::new("autoscaling", "horizontalpodautoscalers", "horizontalpodautoscaler"),
    ]
}

/// A [`ResourceMapper`] backed by a fixed table.
///
/// An empty group in a lookup resolves to the first entry with a matching
/// plural or singular name.
#[derive(Debug, Clone)]
pub struct StaticResourceMapper {
    entries: Vec<ResourceEntry>,
}

impl StaticResourceMapper {
    /// Creates a mapper over the given entries
    pub fn new(entries: Vec<ResourceEntry>) -> Self {
        StaticResourceMapper { entries }
    }

    /// Number of known resources
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no resources are known
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StaticResourceMapper {
    fn default() -> Self {
        Self::new(default_entries())
    }
}

impl ResourceMapper for StaticResourceMapper {
    fn normalize(&self, resource: &GroupResource) -> Result<GroupResource> {
        self.entries
            .iter()
            .find(|e| {
                e.names(&resource.resource)
                    && (resource.group.is_empty() || e.group.eq_ignore_ascii_case(&resource.group))
            })
            .map(|e| GroupResource::new(e.group.clone(), e.resource.clone()))
            .ok_or_else(|| AdapterError::Normalize {
                resource: resource.to_string(),
                reason: "no matches for resource".to_string(),
            })
    }

    fn singularize(&self, resource: &str) -> Result<String> {
        self.entries
            .iter()
            .find(|e| e.resource.eq_ignore_ascii_case(resource))
            .map(|e| e.singular.clone())
            .ok_or_else(|| AdapterError::Singularize {
                resource: resource.to_string(),
                reason: "unknown resource".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_singular_and_plural() {
        let mapper = StaticResourceMapper::default();
        assert_eq!(
            mapper.normalize(&GroupResource::core("pod")).unwrap(),
            GroupResource::core("pods")
        );
        assert_eq!(
            mapper.normalize(&GroupResource::core("Pods")).unwrap(),
            GroupResource::core("pods")
        );
    }

    #[test]
    fn test_normalize_fills_group() {
        let mapper = StaticResourceMapper::default();
        assert_eq!(
            mapper.normalize(&GroupResource::core("deployment")).unwrap(),
            GroupResource::new("apps", "deployments")
        );
    }

    #[test]
    fn test_normalize_respects_explicit_group() {
        let mapper = StaticResourceMapper::default();
        assert!(mapper
            .normalize(&GroupResource::new("extensions", "deployments"))
            .is_err());
    }

    #[test]
    fn test_first_entry_wins() {
        let mapper = StaticResourceMapper::new(vec![
            ResourceEntry::new("extensions", "ingresses", "ingress"),
            ResourceEntry::new("networking.k8s.io", "ingresses", "ingress"),
        ]);
        assert_eq!(
            mapper.normalize(&GroupResource::core("ingress")).unwrap().group,
            "extensions"
        );
    }

    #[test]
    fn test_singularize() {
        let mapper = StaticResourceMapper::default();
        assert_eq!(mapper.singularize("pods").unwrap(), "pod");
        assert!(mapper.singularize("widgets").is_err());
    }
}
