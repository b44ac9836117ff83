//! Shared namers under concurrent resolution.

mod common;

use common::{templated_rule, CountingMapper, SUM_QUERY};
use promdapt_lib::core::{GroupResource, Series};
use promdapt_lib::naming::NamerSet;
use std::sync::Arc;

const THREADS: usize = 8;
const ROUNDS: usize = 200;

fn resources() -> Vec<GroupResource> {
    vec![
        GroupResource::namespaces(),
        GroupResource::core("pods"),
        GroupResource::core("services"),
        GroupResource::core("nodes"),
        GroupResource::new("apps", "deployments"),
        GroupResource::new("batch", "jobs"),
    ]
}

#[test]
fn test_concurrent_resolution_reaches_serial_fixed_point() {
    let mut rule = templated_rule(SUM_QUERY);
    rule.resources
        .overrides
        .insert("kubernetes_pod_name".to_string(), GroupResource::core("pod"));
    let mapper = CountingMapper::new();
    let namers = NamerSet::from_rules(&[rule], mapper).unwrap();
    let namer = Arc::clone(namers.get(0).unwrap());

    let series = Series::new(
        "app_requests",
        [
            ("namespace", "ns"),
            ("pod", "p"),
            ("kubernetes_pod_name", "p"),
            ("service", "s"),
            ("deployment", "d"),
            ("job", "j"),
            ("instance", "i"),
        ],
    );

    std::thread::scope(|scope| {
        for t in 0..THREADS {
            let namer = &namer;
            let series = &series;
            scope.spawn(move || {
                let all = resources();
                for round in 0..ROUNDS {
                    if (t + round) % 2 == 0 {
                        let (found, namespaced) = namer.resources_for_series(series);
                        assert_eq!(found.len(), 6);
                        assert!(namespaced);
                    } else {
                        let resource = &all[(t + round) % all.len()];
                        namer.label_for_resource(resource).unwrap();
                    }
                }
            });
        }
    });

    // every answer matches what a single caller sees on a fresh namer
    let fresh_set = NamerSet::from_rules(
        &[{
            let mut rule = templated_rule(SUM_QUERY);
            rule.resources
                .overrides
                .insert("kubernetes_pod_name".to_string(), GroupResource::core("pod"));
            rule
        }],
        CountingMapper::new(),
    )
    .unwrap();
    let fresh = fresh_set.get(0).unwrap();

    assert_eq!(
        namer.resources_for_series(&series),
        fresh.resources_for_series(&series)
    );
    for resource in resources() {
        assert_eq!(
            namer.label_for_resource(&resource).unwrap(),
            fresh.label_for_resource(&resource).unwrap(),
            "{resource}"
        );
    }
}

#[test]
fn test_concurrent_queries_share_labels() {
    let namers = NamerSet::from_rules(&[templated_rule(SUM_QUERY)], CountingMapper::new()).unwrap();
    let namer = namers.get(0).unwrap();

    let queries: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    namer
                        .query_for_series("app_x", &GroupResource::core("pods"), "ns", &["a", "b"])
                        .unwrap()
                        .into_inner()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(queries
        .iter()
        .all(|q| q == r#"sum(app_x{namespace="ns",pod=~"a|b"}) by (pod)"#));
}
