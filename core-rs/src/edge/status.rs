//! Instance status tracking and the edge activation policy

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::metadata::{Edge, InstanceId};

/// Lifecycle status reported by an instance host
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    #[serde(other)]
    Unknown,
}

impl InstanceStatus {
    pub fn is_running(self) -> bool {
        self == InstanceStatus::Running
    }
}

/// Decide whether an edge may carry transfers
///
/// An edge is active only when it is not soft-deleted, its endpoints are two
/// different instances, and both of them are known and running.
pub fn is_edge_active(edge: &Edge, statuses: &HashMap<InstanceId, InstanceStatus>) -> bool {
    if edge.is_deleted || edge.is_self_loop() {
        return false;
    }

    let running = |id: InstanceId| statuses.get(&id).map(|s| s.is_running()).unwrap_or(false);

    running(edge.source.instance_id) && running(edge.target.instance_id)
}
