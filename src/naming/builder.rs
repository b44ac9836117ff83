//! Compiles discovery rules into [`MetricNamer`]s.

use super::extractor::LabelResourceExtractor;
use super::matcher::ReMatcher;
use super::namer::{LabelResourceCache, MetricNamer};
use crate::core::{AdapterError, DiscoveryRule, Result};
use crate::mapper::ResourceMapper;
use crate::query::{Selector, Template};
use parking_lot::RwLock;
use regex::Regex;
use std::sync::Arc;

/// An ordered, immutable set of compiled rules. Earlier namers come from
/// earlier rules and take priority when several claim the same series.
#[derive(Debug, Clone, Default)]
pub struct NamerSet {
    namers: Vec<Arc<MetricNamer>>,
}

impl NamerSet {
    /// Compiles every rule in order, failing on the first invalid one
    pub fn from_rules(rules: &[DiscoveryRule], mapper: Arc<dyn ResourceMapper>) -> Result<Self> {
        let namers = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                compile_rule(rule, Arc::clone(&mapper))
                    .map(Arc::new)
                    .map_err(|e| e.in_rule(index, &rule.series_query))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(rules = namers.len(), "compiled discovery rules");
        Ok(NamerSet { namers })
    }

    /// Number of namers
    pub fn len(&self) -> usize {
        self.namers.len()
    }

    /// Returns true if there are no namers
    pub fn is_empty(&self) -> bool {
        self.namers.is_empty()
    }

    /// Namer for the rule at `index`
    pub fn get(&self, index: usize) -> Option<&Arc<MetricNamer>> {
        self.namers.get(index)
    }

    /// Iterates over the namers in rule order
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<MetricNamer>> {
        self.namers.iter()
    }
}

impl<'a> IntoIterator for &'a NamerSet {
    type Item = &'a Arc<MetricNamer>;
    type IntoIter = std::slice::Iter<'a, Arc<MetricNamer>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| AdapterError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

/// Compiles a single rule into a namer
pub fn compile_rule(rule: &DiscoveryRule, mapper: Arc<dyn ResourceMapper>) -> Result<MetricNamer> {
    let (label_template, label_extractor) = if rule.resources.template.is_empty() {
        (None, None)
    } else {
        let template = Template::label(&rule.resources.template).map_err(|e| {
            AdapterError::template(format!(
                "unable to parse label template {:?}: {}",
                rule.resources.template, e
            ))
        })?;
        let extractor = LabelResourceExtractor::new(&template)?;
        (Some(template), Some(extractor))
    };

    let metrics_query = Template::query(&rule.metrics_query).map_err(|e| {
        AdapterError::template(format!(
            "unable to parse metrics query template {:?}: {}",
            rule.metrics_query, e
        ))
    })?;

    let mut series_matchers = rule
        .series_filters
        .iter()
        .map(ReMatcher::new)
        .collect::<Result<Vec<_>>>()?;

    // series the name rule can't handle are dropped from this rule entirely
    let name_matches = if rule.name.matches.is_empty() {
        compile_regex(".*")?
    } else {
        series_matchers.push(ReMatcher::positive(&rule.name.matches)?);
        compile_regex(&rule.name.matches)?
    };

    let name_as = if rule.name.as_.is_empty() {
        // captures_len counts the implicit whole-match group
        match name_matches.captures_len() {
            1 => "$0".to_string(),
            2 => "$1".to_string(),
            _ => {
                return Err(AdapterError::config(format!(
                    "must specify an 'as' value for name matcher {:?}",
                    rule.name.matches
                )))
            },
        }
    } else {
        rule.name.as_.clone()
    };

    let mut cache = LabelResourceCache::default();
    for (label, raw) in &rule.resources.overrides {
        let resource = mapper.normalize(raw)?;
        cache.label_to_resource.insert(label.clone(), resource.clone());
        cache.resource_to_label.insert(resource, label.clone());
    }

    tracing::debug!(
        series_query = %rule.series_query,
        filters = series_matchers.len(),
        overrides = cache.label_to_resource.len(),
        "compiled discovery rule"
    );

    Ok(MetricNamer {
        series_query: Selector::new(rule.series_query.clone()),
        label_template,
        label_extractor,
        metrics_query,
        name_matches,
        name_as,
        series_matchers,
        cache: RwLock::new(cache),
        mapper,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GroupResource, NameMapping, RegexFilter, ResourceMapping, Series};
    use crate::mapper::StaticResourceMapper;

    fn mapper() -> Arc<dyn ResourceMapper> {
        Arc::new(StaticResourceMapper::default())
    }

    fn rule(name: &str, as_: &str) -> DiscoveryRule {
        DiscoveryRule {
            series_query: r#"{__name__=~"^app_.*"}"#.to_string(),
            resources: ResourceMapping {
                template: "<<.Resource>>".to_string(),
                ..Default::default()
            },
            name: NameMapping {
                matches: name.to_string(),
                as_: as_.to_string(),
            },
            metrics_query: "sum(<<.Series>>{<<.LabelMatchers>>}) by (<<.GroupBy>>)".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_name_without_captures() {
        let namer = compile_rule(&rule("^app_.*_bytes$", ""), mapper()).unwrap();
        assert_eq!(namer.name_as, "$0");
        let series = Series::new("app_heap_bytes", [("pod", "p")]);
        assert_eq!(namer.metric_name_for_series(&series).unwrap(), "app_heap_bytes");
    }

    #[test]
    fn test_default_name_with_one_capture() {
        let namer = compile_rule(&rule("^app_(.*)_total$", ""), mapper()).unwrap();
        assert_eq!(namer.name_as, "$1");
    }

    #[test]
    fn test_two_captures_need_explicit_as() {
        let err = compile_rule(&rule("^(app)_(.*)$", ""), mapper()).unwrap_err();
        assert!(err.to_string().contains("'as'"));

        let namer = compile_rule(&rule("^(app)_(.*)$", "${2}_from_$1"), mapper()).unwrap();
        let series = Series::new("app_requests", [("pod", "p")]);
        assert_eq!(namer.metric_name_for_series(&series).unwrap(), "requests_from_app");
    }

    #[test]
    fn test_name_rule_becomes_filter() {
        let namer = compile_rule(&rule("^app_(.*)_total$", ""), mapper()).unwrap();
        let series = vec![
            Series::new("app_hits_total", [("pod", "a")]),
            Series::new("app_memory_bytes", [("pod", "a")]),
        ];
        let kept = namer.filter_series(&series);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "app_hits_total");
    }

    #[test]
    fn test_no_name_rule_passes_name_through() {
        let namer = compile_rule(&rule("", ""), mapper()).unwrap();
        let series = Series::new("whatever_metric", [("pod", "a")]);
        assert_eq!(namer.metric_name_for_series(&series).unwrap(), "whatever_metric");
        assert!(namer.series_matchers.is_empty());
    }

    #[test]
    fn test_overrides_are_normalized() {
        let mut r = rule("", "");
        r.resources.template.clear();
        r.resources
            .overrides
            .insert("kubernetes_pod_name".to_string(), GroupResource::core("pod"));
        let namer = compile_rule(&r, mapper()).unwrap();
        assert_eq!(
            namer.label_for_resource(&GroupResource::core("pods")).unwrap(),
            "kubernetes_pod_name"
        );
    }

    #[test]
    fn test_error_identifies_rule() {
        let mut bad = rule("", "");
        bad.series_filters.push(RegexFilter::default());
        let rules = vec![rule("", ""), bad];

        let err = NamerSet::from_rules(&rules, mapper()).unwrap_err();
        match err {
            AdapterError::Rule { index, source, .. } => {
                assert_eq!(index, 1);
                assert!(matches!(*source, AdapterError::Filter(_)));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_override_resource_fails_build() {
        let mut r = rule("", "");
        r.resources
            .overrides
            .insert("thing".to_string(), GroupResource::core("widgets"));
        assert!(NamerSet::from_rules(&[r], mapper()).is_err());
    }
}
