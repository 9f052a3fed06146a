//! Dispatch targets for drained batches
//!
//! - `PartnerDispatch` sends an `EdgeTransfer` to the instance on the other
//!   side of the edge.
//! - `SimulationDispatch` applies a received batch to the local simulation
//!   through the command channel.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::channel::Dispatch;
use super::lock;
use crate::edge::{Edge, InstanceId};
use crate::errors::{EdgeError, Result};
use crate::messages::EdgeTransfer;
use crate::simulation;
use crate::transfer::TransferBatch;
use crate::transport::{CommandChannel, InstanceTransport};

pub struct PartnerDispatch {
    local_instance_id: InstanceId,
    edge: Arc<Mutex<Edge>>,
    transport: Arc<dyn InstanceTransport>,
}

impl PartnerDispatch {
    pub fn new(local_instance_id: InstanceId, edge: Arc<Mutex<Edge>>, transport: Arc<dyn InstanceTransport>) -> Self {
        PartnerDispatch {
            local_instance_id,
            edge,
            transport,
        }
    }
}

#[async_trait]
impl Dispatch for PartnerDispatch {
    async fn dispatch(&self, batch: TransferBatch) -> Result<()> {
        let (edge_id, partner) = {
            let edge = lock(&self.edge);
            (edge.id.clone(), edge.partner_of(self.local_instance_id))
        };

        let partner = partner.ok_or_else(|| {
            EdgeError::Delivery(format!(
                "edge {} has no partner for instance {}",
                edge_id, self.local_instance_id
            ))
        })?;

        tracing::debug!(
            edge_id = %edge_id,
            partner,
            records = batch.len(),
            "Sending edge transfer"
        );

        let response = self
            .transport
            .send_edge_transfer(partner, EdgeTransfer { edge_id: edge_id.clone(), batch })
            .await
            .map_err(|e| EdgeError::Delivery(format!("edge {} to instance {}: {}", edge_id, partner, e)))?;

        if !response.success {
            return Err(EdgeError::Delivery(format!(
                "instance {} rejected transfer on edge {}",
                partner, edge_id
            )));
        }
        Ok(())
    }
}

pub struct SimulationDispatch {
    edge_id: String,
    commands: Arc<dyn CommandChannel>,
}

impl SimulationDispatch {
    pub fn new(edge_id: &str, commands: Arc<dyn CommandChannel>) -> Self {
        SimulationDispatch {
            edge_id: edge_id.to_string(),
            commands,
        }
    }
}

#[async_trait]
impl Dispatch for SimulationDispatch {
    async fn dispatch(&self, batch: TransferBatch) -> Result<()> {
        let command = simulation::edge_transfer(&self.edge_id, &batch)?;
        tracing::debug!(edge_id = %self.edge_id, records = batch.len(), "Applying edge transfer");

        self.commands
            .send_command(command)
            .await
            .map_err(|e| EdgeError::Simulation(format!("edge {}: {}", self.edge_id, e)))
    }
}
