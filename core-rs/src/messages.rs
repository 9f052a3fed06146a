//! Wire messages exchanged between controller, instances and control clients
//!
//! | Message              | From       | To         | Kind    |
//! |----------------------|------------|------------|---------|
//! | `EdgeUpdate`         | controller | control, instance | event |
//! | `SetEdgeConfig`      | control    | controller | request |
//! | `EdgeLinkUpdate`     | controller, instance | instance | event |
//! | `TrainLayoutUpdate`  | instance   | controller | event   |
//! | `TrainPenaltyUpdate` | controller | instance   | event   |
//! | `EdgeTransfer`       | instance   | instance   | request |
//! | `TeleportPlayerToServer` | instance | controller | request |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::edge::{Edge, InstanceId, LinkDestination};
use crate::transfer::TransferBatch;

/// One or more edge records, for full sync or incremental change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeUpdate {
    pub updates: Vec<Edge>,
}

/// Request to create, replace or soft-delete one edge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetEdgeConfig {
    pub edge: Edge,
}

/// Point-to-point link event between the two instances of an edge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EdgeLinkUpdate {
    pub edge_id: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub data: Value,
}

/// Reachability report for one offset of one edge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainLayout {
    pub offset: i64,

    /// Station names reachable from this offset
    pub reachable_targets: Vec<String>,

    /// "<edgeId> <offset>" ids of edge exits that lead here
    pub reachable_sources: Vec<String>,

    pub source_instance_id: InstanceId,
}

impl TrainLayout {
    pub fn to_link_destination(&self) -> LinkDestination {
        LinkDestination {
            reachable_targets: self.reachable_targets.clone(),
            reachable_sources: self.reachable_sources.clone(),
            source_instance_id: self.source_instance_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrainLayoutUpdate {
    pub edge_id: String,
    pub data: TrainLayout,
}

/// Routing penalties for one offset, addressed to the instance applying them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrainPenaltyUpdate {
    pub edge_id: String,
    pub offset: i64,

    /// Station name -> scaled distance
    pub penalty_map: BTreeMap<String, u64>,
}

/// Consolidated transfers dispatched to the partner instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EdgeTransfer {
    pub edge_id: String,

    #[serde(flatten)]
    pub batch: TransferBatch,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeTransferResponse {
    pub success: bool,
}

/// A player stepped onto an edge and should move to the partner's server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeleportPlayerToServer {
    pub player_name: String,
    pub edge_id: String,

    /// Instance the player is leaving
    pub instance_id: InstanceId,

    pub offset: i64,
}

/// Where the player should connect
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeleportPlayerResponse {
    pub address: String,
}

/// Events the controller pushes to an instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum InstanceEvent {
    EdgeUpdate(EdgeUpdate),
    EdgeLinkUpdate(EdgeLinkUpdate),
    TrainPenaltyUpdate(TrainPenaltyUpdate),
}
