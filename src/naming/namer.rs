use super::extractor::LabelResourceExtractor;
use super::matcher::ReMatcher;
use crate::core::{AdapterError, GroupResource, Result, Series};
use crate::mapper::ResourceMapper;
use crate::query::{label_eq, label_matches, QueryTemplateArgs, Selector, Template};
use ahash::AHashMap;
use parking_lot::RwLock;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Label names may not contain `.` or `-`, so both become `_` when a
/// group is rendered into a label.
fn sanitize_group(group: &str) -> String {
    group.replace(['.', '-'], "_")
}

/// Both directions of the label/resource association.
///
/// Forward entries are authoritative: an entry seeded from an override is
/// never replaced by one derived from the template.
#[derive(Debug, Default)]
pub(super) struct LabelResourceCache {
    pub(super) label_to_resource: AHashMap<String, GroupResource>,
    pub(super) resource_to_label: AHashMap<GroupResource, String>,
}

/// Converts series names and label names into custom-metrics resources and
/// metric names, and back into queries.
///
/// A namer is the compiled form of one discovery rule. Everything except the
/// label/resource cache is fixed at build time, and the cache is guarded by a
/// single reader/writer lock that is never held across a call into the
/// resource mapper, so a namer can be shared freely between threads.
/// Group-resources returned by a namer are normalized, and group-resources
/// passed to it must be normalized too.
pub struct MetricNamer {
    pub(super) series_query: Selector,
    pub(super) label_template: Option<Template>,
    pub(super) label_extractor: Option<LabelResourceExtractor>,
    pub(super) metrics_query: Template,
    pub(super) name_matches: Regex,
    pub(super) name_as: String,
    pub(super) series_matchers: Vec<ReMatcher>,
    pub(super) cache: RwLock<LabelResourceCache>,
    pub(super) mapper: Arc<dyn ResourceMapper>,
}

impl MetricNamer {
    /// Selector matching every series this namer can handle
    pub fn selector(&self) -> &Selector {
        &self.series_query
    }

    /// Returns the series whose names pass every configured filter, in order.
    ///
    /// The series are assumed to already match [`selector`](Self::selector).
    pub fn filter_series<'a>(&self, series: &'a [Series]) -> Vec<&'a Series> {
        series
            .iter()
            .filter(|s| self.series_matchers.iter().all(|m| m.matches(&s.name)))
            .collect()
    }

    /// Returns the resources associated with a series' labels, and whether
    /// one of them is the namespaces resource.
    pub fn resources_for_series(&self, series: &Series) -> (Vec<GroupResource>, bool) {
        let mut resources = Vec::new();
        let mut namespaced = false;
        // newly discovered labels are staged here and merged in one write at the end
        let mut updates: AHashMap<&str, GroupResource> = AHashMap::new();

        for label in series.labels.keys() {
            let cached = self.cache.read().label_to_resource.get(label).cloned();

            let resource = if let Some(resource) = cached {
                resource
            } else if let Some(resource) = updates.get(label.as_str()) {
                resource.clone()
            } else if let Some(resource) = self.resolve_label(label) {
                updates.insert(label.as_str(), resource.clone());
                resource
            } else {
                continue;
            };

            if resource.is_namespaces() {
                namespaced = true;
            }
            resources.push(resource);
        }

        // Concurrent callers may stage the same label; the values are
        // identical, so whichever write lands last is fine.
        if !updates.is_empty() {
            let mut cache = self.cache.write();
            for (label, resource) in updates {
                tracing::debug!(label, %resource, "caching label resource");
                cache.label_to_resource.insert(label.to_string(), resource);
            }
        }

        (resources, namespaced)
    }

    /// Runs a label through the template extractor and the resource mapper.
    /// Must not be called with the cache lock held.
    fn resolve_label(&self, label: &str) -> Option<GroupResource> {
        let raw = self.label_extractor.as_ref()?.extract(label)?;
        match self.mapper.normalize(&raw) {
            Ok(resource) => Some(resource),
            Err(e) => {
                tracing::error!(
                    label,
                    resource = %raw,
                    error = %e,
                    "unable to normalize group-resource from label, skipping"
                );
                None
            },
        }
    }

    /// Returns the label carrying the name of objects of `resource`.
    pub fn label_for_resource(&self, resource: &GroupResource) -> Result<String> {
        let cached = self.cache.read().resource_to_label.get(resource).cloned();
        if let Some(label) = cached {
            return Ok(label);
        }

        // Another caller may render the same label in the meantime; the
        // result is the same either way.
        self.make_label_for_resource(resource)
            .map_err(|e| AdapterError::NoLabel {
                resource: resource.to_string(),
                reason: e.to_string(),
            })
    }

    /// Renders the label for `resource` from the template and caches it.
    /// Must not be called with the cache lock held.
    fn make_label_for_resource(&self, resource: &GroupResource) -> Result<String> {
        let template = self.label_template.as_ref().ok_or_else(|| {
            AdapterError::config("no generic resource label form specified for this metric")
        })?;

        let singular = self.mapper.singularize(&resource.resource)?;
        let args = GroupResource::new(sanitize_group(&resource.group), singular);

        let label = template.render(&args)?;
        if label.is_empty() {
            return Err(AdapterError::template("empty label produced by label template"));
        }

        let mut cache = self.cache.write();
        cache
            .resource_to_label
            .insert(resource.clone(), label.clone());
        cache
            .label_to_resource
            .entry(label.clone())
            .or_insert_with(|| resource.clone());
        Ok(label)
    }

    /// Returns the metric name (as presented by the API) for a series.
    pub fn metric_name_for_series(&self, series: &Series) -> Result<String> {
        let caps = self
            .name_matches
            .captures(&series.name)
            .ok_or_else(|| AdapterError::NameMismatch {
                series: series.name.clone(),
                pattern: self.name_matches.as_str().to_string(),
            })?;

        let mut name = String::new();
        caps.expand(&self.name_as, &mut name);
        Ok(name)
    }

    /// Builds the query for `series` (a series name, not a metric name)
    /// restricted to the named objects of `resource`, inside `namespace`
    /// unless it is empty.
    pub fn query_for_series<S: AsRef<str>>(
        &self,
        series: &str,
        resource: &GroupResource,
        namespace: &str,
        names: &[S],
    ) -> Result<Selector> {
        let mut exprs = Vec::with_capacity(2);

        if !namespace.is_empty() {
            let namespace_label = self.label_for_resource(&GroupResource::namespaces())?;
            exprs.push(label_eq(&namespace_label, namespace));
        }

        let resource_label = self.label_for_resource(resource)?;
        let expr = match names {
            [] => return Err(AdapterError::NoTargets),
            [name] => label_eq(&resource_label, name.as_ref()),
            _ => {
                let values: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
                label_matches(&resource_label, &values.join("|"))
            },
        };
        exprs.push(expr);

        let args = QueryTemplateArgs {
            series: series.to_string(),
            label_matchers: exprs.join(","),
            group_by: vec![resource_label],
        };
        let query = self.metrics_query.render(&args)?;
        if query.is_empty() {
            return Err(AdapterError::EmptyQuery);
        }

        Ok(Selector::new(query))
    }
}

impl fmt::Debug for MetricNamer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricNamer")
            .field("series_query", &self.series_query)
            .field("label_template", &self.label_template.as_ref().map(Template::as_str))
            .field("metrics_query", &self.metrics_query.as_str())
            .field("name_matches", &self.name_matches.as_str())
            .field("name_as", &self.name_as)
            .field("series_matchers", &self.series_matchers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_group() {
        assert_eq!(sanitize_group("networking.k8s.io"), "networking_k8s_io");
        assert_eq!(sanitize_group("my-group.example.com"), "my_group_example_com");
        assert_eq!(sanitize_group(""), "");
    }
}
