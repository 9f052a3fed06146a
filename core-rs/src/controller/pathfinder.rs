//! Train-routing pathfinder
//!
//! Every `(edge, offset)` pair with reachability data is a destination node.
//! A node can reach its direct targets at distance 1, and everything its
//! sources can reach at one more hop. Distances are relaxed in place, pass
//! after pass, until a full pass changes nothing.
//!
//! The graph is rebuilt from the directory on every run. Emitted penalties
//! are `(distance - 1) * PENALTY_SCALE`, so a direct target costs nothing
//! and each extra edge crossing costs one scale unit. That offset keeps a
//! chain A -> B -> C with "X" direct at A emitting 0, 100000 and 200000.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::edge::{destination_id, parse_offset, Edge, InstanceId};
use crate::messages::TrainPenaltyUpdate;

/// Penalty per hop, as expected by the simulation's train routing
pub const PENALTY_SCALE: u64 = 100_000;

/// Relaxation passes before giving up on convergence
pub const MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone)]
struct DestinationNode {
    id: String,
    edge_id: String,
    offset: i64,
    source_instance_id: InstanceId,
    targets: Vec<String>,
    sources: Vec<usize>,
    reachable: BTreeMap<String, u64>,
}

/// Penalty map addressed to the instance that applies it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyAssignment {
    pub instance_id: InstanceId,
    pub update: TrainPenaltyUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathfinderOutcome {
    /// One entry per destination node, in node id order
    pub assignments: Vec<PenaltyAssignment>,

    /// Passes that changed at least one distance
    pub iterations: usize,

    pub converged: bool,
}

impl PathfinderOutcome {
    pub fn assignment(&self, edge_id: &str, offset: i64) -> Option<&PenaltyAssignment> {
        self.assignments
            .iter()
            .find(|a| a.update.edge_id == edge_id && a.update.offset == offset)
    }
}

/// Build the destination graph and relax it to a fixed point
pub fn run<'a, I>(edges: I) -> PathfinderOutcome
where
    I: IntoIterator<Item = &'a Edge>,
{
    let mut nodes = build_nodes(edges);

    let mut iterations = 0;
    let mut converged = false;
    for _ in 0..MAX_ITERATIONS {
        if !relax(&mut nodes) {
            converged = true;
            break;
        }
        iterations += 1;
    }

    if !converged {
        tracing::warn!(
            nodes = nodes.len(),
            max_iterations = MAX_ITERATIONS,
            "Pathfinder hit the iteration cap, using last state"
        );
    } else {
        tracing::debug!(nodes = nodes.len(), iterations, "Pathfinder converged");
    }

    let assignments = nodes
        .into_iter()
        .map(|node| PenaltyAssignment {
            instance_id: node.source_instance_id,
            update: TrainPenaltyUpdate {
                edge_id: node.edge_id,
                offset: node.offset,
                penalty_map: node
                    .reachable
                    .into_iter()
                    .map(|(name, distance)| (name, distance.saturating_sub(1) * PENALTY_SCALE))
                    .collect(),
            },
        })
        .collect();

    PathfinderOutcome {
        assignments,
        iterations,
        converged,
    }
}

fn build_nodes<'a, I>(edges: I) -> Vec<DestinationNode>
where
    I: IntoIterator<Item = &'a Edge>,
{
    let mut by_id: BTreeMap<String, (DestinationNode, Vec<String>)> = BTreeMap::new();

    for edge in edges {
        if edge.is_deleted {
            continue;
        }
        for (key, destination) in &edge.link_destinations {
            let offset = match parse_offset(key) {
                Ok(offset) => offset,
                Err(e) => {
                    tracing::warn!(edge_id = %edge.id, error = %e, "Skipping link destination");
                    continue;
                }
            };

            let id = destination_id(&edge.id, offset);
            let node = DestinationNode {
                id: id.clone(),
                edge_id: edge.id.clone(),
                offset,
                source_instance_id: destination.source_instance_id,
                targets: destination.reachable_targets.clone(),
                sources: Vec::new(),
                reachable: BTreeMap::new(),
            };
            if let Some((replaced, _)) = by_id.insert(id, (node, destination.reachable_sources.clone())) {
                tracing::warn!(
                    edge_id = %edge.id,
                    key = %key,
                    node = %replaced.id,
                    "Duplicate link destination offset, keeping the later entry"
                );
            }
        }
    }

    let index: HashMap<String, usize> = by_id
        .keys()
        .enumerate()
        .map(|(i, id)| (id.clone(), i))
        .collect();

    by_id
        .into_values()
        .map(|(mut node, source_ids)| {
            for source_id in source_ids {
                match index.get(&source_id) {
                    Some(&i) => node.sources.push(i),
                    None => tracing::warn!(
                        node = %node.id,
                        source = %source_id,
                        "Reachable source is not a known destination node, skipping"
                    ),
                }
            }
            node
        })
        .collect()
}

/// One relaxation pass; returns true if any distance decreased
fn relax(nodes: &mut [DestinationNode]) -> bool {
    let mut dirty = false;

    for node in nodes.iter_mut() {
        for target in &node.targets {
            if improve(&mut node.reachable, target, 1) {
                dirty = true;
            }
        }
    }

    for i in 0..nodes.len() {
        let imported: Vec<(String, u64)> = nodes[i]
            .sources
            .iter()
            .flat_map(|&s| nodes[s].reachable.iter().map(|(name, d)| (name.clone(), d + 1)))
            .collect();

        for (name, distance) in imported {
            if improve(&mut nodes[i].reachable, &name, distance) {
                dirty = true;
            }
        }
    }

    dirty
}

fn improve(reachable: &mut BTreeMap<String, u64>, name: &str, distance: u64) -> bool {
    match reachable.get_mut(name) {
        Some(current) if *current <= distance => false,
        Some(current) => {
            *current = distance;
            true
        }
        None => {
            reachable.insert(name.to_string(), distance);
            true
        }
    }
}
