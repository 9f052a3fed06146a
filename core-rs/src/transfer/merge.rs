//! Transfer merge engine
//!
//! Coalesces the transfer events that arrive for one edge within a
//! scheduling window into a single consolidated batch, per offset:
//!
//! | Kind  | Field             | Rule            |
//! |-------|-------------------|-----------------|
//! | Belt  | `item_stacks`     | append          |
//! | Belt  | `set_flow`        | last write wins |
//! | Fluid | `name`            | last write wins |
//! | Fluid | `amount`          | last write wins |
//! | Fluid | `temperature`     | last write wins |
//! | Fluid | `amount_balanced` | sum             |
//! | Power | `energy`          | last write wins |
//! | Power | `amount_balanced` | sum             |
//! | Train | `train`           | newest wins, conflict logged |
//! | Train | `set_flow`        | last write wins |
//!
//! Entity transfers are not keyed by offset and are appended.
//!
//! Batches must be merged in arrival order: overwrite fields are not
//! commutative within an offset.

use std::collections::BTreeMap;

use super::records::{
    BeltTransfer, EntityTransfer, FluidTransfer, PowerTransfer, TrainTransfer, Transfer,
    TransferBatch,
};

/// Pending transfers for one edge and one direction
#[derive(Debug, Clone, Default)]
pub struct PendingTransfers {
    edge_id: String,
    belt: BTreeMap<i64, BeltTransfer>,
    fluid: BTreeMap<i64, FluidTransfer>,
    power: BTreeMap<i64, PowerTransfer>,
    train: BTreeMap<i64, TrainTransfer>,
    entity: Vec<EntityTransfer>,
}

impl PendingTransfers {
    pub fn new(edge_id: &str) -> Self {
        PendingTransfers {
            edge_id: edge_id.to_string(),
            ..Default::default()
        }
    }

    pub fn edge_id(&self) -> &str {
        &self.edge_id
    }

    pub fn is_empty(&self) -> bool {
        self.belt.is_empty()
            && self.fluid.is_empty()
            && self.power.is_empty()
            && self.train.is_empty()
            && self.entity.is_empty()
    }

    /// Fold transfers into the pending maps, in order
    pub fn merge<I>(&mut self, incoming: I)
    where
        I: IntoIterator<Item = Transfer>,
    {
        for transfer in incoming {
            match transfer {
                Transfer::Belt(t) => self.merge_belt(t),
                Transfer::Fluid(t) => self.merge_fluid(t),
                Transfer::Power(t) => self.merge_power(t),
                Transfer::Train(t) => self.merge_train(t),
                Transfer::Entity(t) => self.entity.push(t),
            }
        }
    }

    /// Fold a whole batch, kind by kind
    pub fn merge_batch(&mut self, batch: TransferBatch) {
        self.merge(batch.into_transfers());
    }

    fn merge_belt(&mut self, incoming: BeltTransfer) {
        let pending = self.belt.entry(incoming.offset).or_insert_with(|| BeltTransfer {
            offset: incoming.offset,
            ..Default::default()
        });

        if let Some(stacks) = incoming.item_stacks {
            pending.item_stacks.get_or_insert_with(Vec::new).extend(stacks);
        }
        if incoming.set_flow.is_some() {
            pending.set_flow = incoming.set_flow;
        }
    }

    fn merge_fluid(&mut self, incoming: FluidTransfer) {
        let pending = self.fluid.entry(incoming.offset).or_insert_with(|| FluidTransfer {
            offset: incoming.offset,
            ..Default::default()
        });

        pending.name = incoming.name;
        if incoming.amount.is_some() {
            pending.amount = incoming.amount;
        }
        if incoming.temperature.is_some() {
            pending.temperature = incoming.temperature;
        }
        pending.amount_balanced = add_optional(pending.amount_balanced, incoming.amount_balanced);
    }

    fn merge_power(&mut self, incoming: PowerTransfer) {
        let pending = self.power.entry(incoming.offset).or_insert_with(|| PowerTransfer {
            offset: incoming.offset,
            ..Default::default()
        });

        if incoming.energy.is_some() {
            pending.energy = incoming.energy;
        }
        pending.amount_balanced = add_optional(pending.amount_balanced, incoming.amount_balanced);
    }

    fn merge_train(&mut self, incoming: TrainTransfer) {
        let offset = incoming.offset;
        let pending = self.train.entry(offset).or_insert_with(|| TrainTransfer {
            offset,
            ..Default::default()
        });

        if incoming.train.is_some() {
            if pending.train.is_some() {
                tracing::warn!(
                    edge_id = %self.edge_id,
                    offset,
                    pending_train_id = ?pending.train_id,
                    incoming_train_id = ?incoming.train_id,
                    "Train conflict: a train is already pending at this offset, keeping the newest"
                );
            }
            pending.train = incoming.train;
            pending.train_id = incoming.train_id;
        } else if incoming.train_id.is_some() {
            pending.train_id = incoming.train_id;
        }
        if incoming.set_flow.is_some() {
            pending.set_flow = incoming.set_flow;
        }
    }

    /// Take everything pending as a batch and leave the maps empty
    pub fn drain(&mut self) -> TransferBatch {
        TransferBatch {
            belt_transfers: std::mem::take(&mut self.belt).into_values().collect(),
            entity_transfers: std::mem::take(&mut self.entity),
            fluid_transfers: std::mem::take(&mut self.fluid).into_values().collect(),
            power_transfers: std::mem::take(&mut self.power).into_values().collect(),
            train_transfers: std::mem::take(&mut self.train).into_values().collect(),
        }
    }
}

fn add_optional(pending: Option<f64>, incoming: Option<f64>) -> Option<f64> {
    match incoming {
        Some(value) => Some(pending.unwrap_or(0.0) + value),
        None => pending,
    }
}
