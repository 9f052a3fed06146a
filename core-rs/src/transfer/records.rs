//! Typed transfer records
//!
//! One record type per resource kind crossing an edge. Field names match the
//! simulation-side payloads, so the records serialize straight into
//! `EdgeTransfer` messages and simulation commands.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Belt lane transfer at one offset
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BeltTransfer {
    pub offset: i64,

    /// Item stacks moved this window (appended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_stacks: Option<Vec<Value>>,

    /// Whether the receiving belt may flow (last write wins)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_flow: Option<bool>,
}

/// Fluid connector state at one offset
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FluidTransfer {
    pub offset: i64,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Current tank level, not a delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,

    /// Net flow contributed this window (summed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_balanced: Option<f64>,
}

/// Power connector state at one offset
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PowerTransfer {
    pub offset: i64,

    /// Current stored energy, not a delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_balanced: Option<f64>,
}

/// Train crossing at one offset
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrainTransfer {
    pub offset: i64,

    /// Serialized train, opaque to this crate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_flow: Option<bool>,
}

/// Entity (player) crossing, not keyed by offset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityTransfer {
    #[serde(rename = "type")]
    pub kind: String,

    pub player_name: String,

    pub edge_pos: [f64; 2],
}

/// A single transfer event of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum Transfer {
    Belt(BeltTransfer),
    Fluid(FluidTransfer),
    Power(PowerTransfer),
    Train(TrainTransfer),
    Entity(EntityTransfer),
}

impl Transfer {
    /// Connector offset, None for entity transfers
    pub fn offset(&self) -> Option<i64> {
        match self {
            Transfer::Belt(t) => Some(t.offset),
            Transfer::Fluid(t) => Some(t.offset),
            Transfer::Power(t) => Some(t.offset),
            Transfer::Train(t) => Some(t.offset),
            Transfer::Entity(_) => None,
        }
    }
}

/// A consolidated batch, one list per resource kind
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferBatch {
    #[serde(default)]
    pub belt_transfers: Vec<BeltTransfer>,

    #[serde(default)]
    pub entity_transfers: Vec<EntityTransfer>,

    #[serde(default)]
    pub fluid_transfers: Vec<FluidTransfer>,

    #[serde(default)]
    pub power_transfers: Vec<PowerTransfer>,

    #[serde(default)]
    pub train_transfers: Vec<TrainTransfer>,
}

impl TransferBatch {
    pub fn is_empty(&self) -> bool {
        self.belt_transfers.is_empty()
            && self.entity_transfers.is_empty()
            && self.fluid_transfers.is_empty()
            && self.power_transfers.is_empty()
            && self.train_transfers.is_empty()
    }

    /// Total number of records across all kinds
    pub fn len(&self) -> usize {
        self.belt_transfers.len()
            + self.entity_transfers.len()
            + self.fluid_transfers.len()
            + self.power_transfers.len()
            + self.train_transfers.len()
    }

    /// Flatten into tagged transfers, kind by kind, preserving list order
    pub fn into_transfers(self) -> impl Iterator<Item = Transfer> {
        self.belt_transfers
            .into_iter()
            .map(Transfer::Belt)
            .chain(self.entity_transfers.into_iter().map(Transfer::Entity))
            .chain(self.fluid_transfers.into_iter().map(Transfer::Fluid))
            .chain(self.power_transfers.into_iter().map(Transfer::Power))
            .chain(self.train_transfers.into_iter().map(Transfer::Train))
    }
}
