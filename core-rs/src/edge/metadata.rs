//! Edge metadata structures
//!
//! Defines the edge record shared by the controller directory and the
//! per-instance caches, plus the train reachability data attached to it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{EdgeError, Result};

/// Instance identifier as assigned by the cluster controller
pub type InstanceId = i64;

/// One side of an edge: where it sits inside an instance's world
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EdgeTargetSpecification {
    pub instance_id: InstanceId,

    /// Position of the edge origin on the surface (x, y)
    pub origin: [f64; 2],

    pub surface: u32,

    /// Direction index (0 = East, counted clockwise in eighths)
    pub direction: u8,

    #[serde(default)]
    pub ready: bool,
}

/// Train reachability report for one offset along an edge
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LinkDestination {
    /// Station names reachable directly from this offset
    #[serde(default)]
    pub reachable_targets: Vec<String>,

    /// Destination node ids ("<edgeId> <offset>") that can reach this offset
    #[serde(default)]
    pub reachable_sources: Vec<String>,

    /// Instance that applies the penalty map computed for this offset
    pub source_instance_id: InstanceId,
}

/// Edge connecting two instances
///
/// ## Example JSON (directory record)
///
/// ```json
/// {
///   "id": "999",
///   "updatedAtMs": 1718000000000,
///   "isDeleted": false,
///   "source": { "instanceId": 1, "origin": [0, 0], "surface": 1, "direction": 0, "ready": false },
///   "target": { "instanceId": 2, "origin": [0, 0], "surface": 1, "direction": 4, "ready": false },
///   "length": 20,
///   "active": false
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,

    /// Last mutation time, never decreases
    pub updated_at_ms: i64,

    #[serde(default)]
    pub is_deleted: bool,

    pub source: EdgeTargetSpecification,

    pub target: EdgeTargetSpecification,

    pub length: f64,

    /// Derived by the controller, see [`crate::edge::is_edge_active`]
    #[serde(default)]
    pub active: bool,

    /// Offset (as string) -> reachability data
    #[serde(
        rename = "link_destinations",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub link_destinations: BTreeMap<String, LinkDestination>,
}

impl Edge {
    /// Create an inactive edge between two endpoints
    pub fn new(
        id: &str,
        source: EdgeTargetSpecification,
        target: EdgeTargetSpecification,
        length: f64,
    ) -> Self {
        Edge {
            id: id.to_string(),
            updated_at_ms: chrono::Utc::now().timestamp_millis(),
            is_deleted: false,
            source,
            target,
            length,
            active: false,
            link_destinations: BTreeMap::new(),
        }
    }

    /// True if either endpoint is the given instance
    pub fn touches(&self, instance_id: InstanceId) -> bool {
        self.source.instance_id == instance_id || self.target.instance_id == instance_id
    }

    pub fn is_self_loop(&self) -> bool {
        self.source.instance_id == self.target.instance_id
    }

    /// The instance on the other side of the edge from `instance_id`
    ///
    /// Returns None when `instance_id` is not an endpoint, or when the edge
    /// loops back onto the same instance.
    pub fn partner_of(&self, instance_id: InstanceId) -> Option<InstanceId> {
        if self.is_self_loop() {
            return None;
        }
        if self.source.instance_id == instance_id {
            Some(self.target.instance_id)
        } else if self.target.instance_id == instance_id {
            Some(self.source.instance_id)
        } else {
            None
        }
    }

    /// Both endpoint instance ids, deduplicated for self-loops
    pub fn endpoints(&self) -> Vec<InstanceId> {
        if self.is_self_loop() {
            vec![self.source.instance_id]
        } else {
            vec![self.source.instance_id, self.target.instance_id]
        }
    }

    /// Bump `updated_at_ms` to `now_ms` without ever moving it backwards
    pub fn touch(&mut self, now_ms: i64) {
        self.updated_at_ms = self.updated_at_ms.max(now_ms);
    }

    /// Store the reachability data reported for one offset
    ///
    /// Returns true if the stored data changed.
    pub fn set_link_destination(&mut self, offset: i64, destination: LinkDestination) -> bool {
        let key = offset.to_string();
        if self.link_destinations.get(&key) == Some(&destination) {
            return false;
        }
        self.link_destinations.insert(key, destination);
        true
    }
}

/// Parse an offset key from `link_destinations`
pub fn parse_offset(key: &str) -> Result<i64> {
    key.trim()
        .parse::<i64>()
        .map_err(|_| EdgeError::InvalidOffset(key.to_string()))
}

/// Destination node id for an offset along an edge
///
/// # Example
///
/// ```
/// use universal_edges::edge::destination_id;
///
/// assert_eq!(destination_id("E1", 5), "E1 5");
/// ```
pub fn destination_id(edge_id: &str, offset: i64) -> String {
    format!("{} {}", edge_id, offset)
}
