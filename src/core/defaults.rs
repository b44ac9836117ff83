//! Built-in discovery rules.
//!
//! Used whenever no rule set is configured. Container series from cAdvisor
//! carry `pod_name`/`namespace` labels; everything else is expected to carry
//! `<prefix><resource>` labels. Series ending in `_total` are treated as
//! counters and wrapped in `rate()`.

use crate::core::config::{DiscoveryRule, NameMapping, RegexFilter, ResourceMapping};
use crate::core::GroupResource;
use crate::query::{
    label_neq, match_series, name_matches, name_not_matches, prom_duration,
};
use std::collections::BTreeMap;
use std::time::Duration;

fn container_selector() -> String {
    match_series(
        "",
        [
            name_matches("^container_.*"),
            label_neq("container_name", "POD"),
            label_neq("namespace", ""),
            label_neq("pod_name", ""),
        ],
    )
    .into_inner()
}

fn container_resources() -> ResourceMapping {
    let mut overrides = BTreeMap::new();
    overrides.insert("namespace".to_string(), GroupResource::core("namespace"));
    overrides.insert("pod_name".to_string(), GroupResource::core("pod"));
    ResourceMapping {
        template: String::new(),
        overrides,
    }
}

fn namespaced_selector(label_prefix: &str) -> String {
    match_series(
        "",
        [
            label_neq(&format!("{}namespace", label_prefix), ""),
            name_not_matches("^container_.*"),
        ],
    )
    .into_inner()
}

fn templated_resources(label_prefix: &str) -> ResourceMapping {
    ResourceMapping {
        template: format!("{}<<.Resource>>", label_prefix),
        overrides: BTreeMap::new(),
    }
}

fn name_rule(matches: &str) -> NameMapping {
    NameMapping {
        matches: matches.to_string(),
        as_: String::new(),
    }
}

/// Returns the default rule set for the given rate window and label prefix.
pub fn default_rules(rate_interval: Duration, label_prefix: &str) -> Vec<DiscoveryRule> {
    let rate = prom_duration(rate_interval);
    let container_rate_query = format!(
        r#"sum(rate(<<.Series>>{{<<.LabelMatchers>>,container_name!="POD"}}[{}])) by (<<.GroupBy>>)"#,
        rate
    );
    let rate_query = format!(
        "sum(rate(<<.Series>>{{<<.LabelMatchers>>}}[{}])) by (<<.GroupBy>>)",
        rate
    );

    vec![
        // container seconds counters
        DiscoveryRule {
            series_query: container_selector(),
            series_filters: Vec::new(),
            resources: container_resources(),
            name: name_rule("^container_(.*)_seconds_total$"),
            metrics_query: container_rate_query.clone(),
        },
        // container counters
        DiscoveryRule {
            series_query: container_selector(),
            series_filters: vec![RegexFilter::is_not("^container_.*_seconds_total$")],
            resources: container_resources(),
            name: name_rule("^container_(.*)_total$"),
            metrics_query: container_rate_query,
        },
        // container gauges
        DiscoveryRule {
            series_query: container_selector(),
            series_filters: vec![RegexFilter::is_not("^container_.*_total$")],
            resources: container_resources(),
            name: name_rule("^container_(.*)$"),
            metrics_query: r#"sum(<<.Series>>{<<.LabelMatchers>>,container_name!="POD"}) by (<<.GroupBy>>)"#
                .to_string(),
        },
        // gauges
        DiscoveryRule {
            series_query: namespaced_selector(label_prefix),
            series_filters: vec![RegexFilter::is_not(".*_total$")],
            resources: templated_resources(label_prefix),
            name: NameMapping::default(),
            metrics_query: "sum(<<.Series>>{<<.LabelMatchers>>}) by (<<.GroupBy>>)".to_string(),
        },
        // counters
        DiscoveryRule {
            series_query: namespaced_selector(label_prefix),
            series_filters: vec![RegexFilter::is_not(".*_seconds_total")],
            resources: templated_resources(label_prefix),
            name: name_rule("^(.*)_total$"),
            metrics_query: rate_query.clone(),
        },
        // seconds counters
        DiscoveryRule {
            series_query: namespaced_selector(label_prefix),
            series_filters: Vec::new(),
            resources: templated_resources(label_prefix),
            name: name_rule("^(.*)_seconds_total$"),
            metrics_query: rate_query,
        },
    ]
}
