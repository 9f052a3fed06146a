// Pathfinder Contract Tests
//
// Penalty maps are consumed by the simulation's train routing as raw
// numbers, one PENALTY_SCALE per edge crossing. These tests pin the scale,
// the hop counting and the convergence behavior.

use std::collections::BTreeMap;
use universal_edges::controller::pathfinder::{self, MAX_ITERATIONS, PENALTY_SCALE};
use universal_edges::{Edge, EdgeTargetSpecification, InstanceId, LinkDestination};

fn endpoint(instance_id: InstanceId) -> EdgeTargetSpecification {
    EdgeTargetSpecification {
        instance_id,
        origin: [0.0, 0.0],
        surface: 1,
        direction: 0,
        ready: true,
    }
}

/// Edge with one destination node at offset 0
fn node(id: &str, targets: &[&str], sources: &[&str], instance: InstanceId) -> Edge {
    let mut edge = Edge::new(id, endpoint(instance), endpoint(instance + 1), 10.0);
    edge.set_link_destination(
        0,
        LinkDestination {
            reachable_targets: targets.iter().map(|s| s.to_string()).collect(),
            reachable_sources: sources.iter().map(|s| s.to_string()).collect(),
            source_instance_id: instance,
        },
    );
    edge
}

fn penalties(outcome: &pathfinder::PathfinderOutcome, edge_id: &str) -> BTreeMap<String, u64> {
    outcome
        .assignment(edge_id, 0)
        .map(|a| a.update.penalty_map.clone())
        .unwrap_or_default()
}

/// RULE: scale factor is a fixed protocol constant
#[test]
fn penalty_scale_is_protocol_constant() {
    assert_eq!(PENALTY_SCALE, 100_000);
    assert_eq!(MAX_ITERATIONS, 100);
}

/// RULE: chain A <- B <- C with "X" direct at A gives B one hop, C two
#[test]
fn linear_chain_scales_hops() {
    let edges = vec![
        node("A", &["X"], &[], 1),
        node("B", &[], &["A 0"], 2),
        node("C", &[], &["B 0"], 3),
    ];
    let outcome = pathfinder::run(&edges);

    assert!(outcome.converged);
    assert!(outcome.iterations <= 3);
    assert_eq!(penalties(&outcome, "B")["X"], PENALTY_SCALE);
    assert_eq!(penalties(&outcome, "C")["X"], 2 * PENALTY_SCALE);
}

/// RULE: node order does not change the result, only the pass count
#[test]
fn reversed_chain_reaches_same_fixed_point() {
    let edges = vec![
        node("A", &[], &["B 0"], 1),
        node("B", &[], &["C 0"], 2),
        node("C", &["X"], &[], 3),
    ];
    let outcome = pathfinder::run(&edges);

    assert!(outcome.converged);
    assert!(outcome.iterations <= 3);
    assert_eq!(penalties(&outcome, "B")["X"], PENALTY_SCALE);
    assert_eq!(penalties(&outcome, "A")["X"], 2 * PENALTY_SCALE);
}

/// RULE: cycles terminate at the minimum hop count
/// BREAKS: ever-growing penalties or a hung controller
#[test]
fn cycle_converges_to_minimum() {
    let edges = vec![
        node("A", &["X"], &["C 0"], 1),
        node("B", &[], &["A 0"], 2),
        node("C", &[], &["B 0"], 3),
    ];
    let outcome = pathfinder::run(&edges);

    assert!(outcome.converged);
    assert_eq!(penalties(&outcome, "A")["X"], 0);
    assert_eq!(penalties(&outcome, "B")["X"], PENALTY_SCALE);
    assert_eq!(penalties(&outcome, "C")["X"], 2 * PENALTY_SCALE);

    let again = pathfinder::run(&edges);
    assert_eq!(outcome, again);
}

/// RULE: every node is emitted to its source instance on every run
#[test]
fn every_node_emitted_to_source_instance() {
    let edges = vec![
        node("A", &["X"], &[], 1),
        node("B", &["Y"], &["A 0"], 2),
        node("C", &[], &[], 7),
    ];
    let outcome = pathfinder::run(&edges);

    let recipients: Vec<(String, InstanceId)> = outcome
        .assignments
        .iter()
        .map(|a| (a.update.edge_id.clone(), a.instance_id))
        .collect();
    assert_eq!(
        recipients,
        vec![("A".to_string(), 1), ("B".to_string(), 2), ("C".to_string(), 7)]
    );
    assert_eq!(penalties(&outcome, "B")["Y"], 0);
    assert_eq!(penalties(&outcome, "B")["X"], PENALTY_SCALE);
}

/// RULE: a source id with no matching node is skipped, the rest still routes
#[test]
fn unknown_source_does_not_abort_run() {
    let edges = vec![
        node("A", &["X"], &[], 1),
        node("B", &[], &["A 0", "GHOST 3"], 2),
    ];
    let outcome = pathfinder::run(&edges);

    assert!(outcome.converged);
    assert_eq!(penalties(&outcome, "B")["X"], PENALTY_SCALE);
}

/// RULE: hitting the iteration cap is not fatal; the last state is emitted
#[test]
fn iteration_cap_uses_last_state() {
    // Each node imports from the next id, so one hop propagates per pass
    let count = MAX_ITERATIONS + 50;
    let edges: Vec<Edge> = (0..count)
        .map(|i| {
            let id = format!("N{:03}", i);
            if i + 1 == count {
                node(&id, &["X"], &[], 1)
            } else {
                let source = format!("N{:03} 0", i + 1);
                node(&id, &[], &[source.as_str()], 1)
            }
        })
        .collect();

    let outcome = pathfinder::run(&edges);

    assert!(!outcome.converged);
    assert_eq!(outcome.iterations, MAX_ITERATIONS);
    assert_eq!(outcome.assignments.len(), count);
    assert!(penalties(&outcome, "N000").is_empty());
    assert_eq!(penalties(&outcome, &format!("N{:03}", count - 2))["X"], PENALTY_SCALE);
}
