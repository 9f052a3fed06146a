//! Instance context
//!
//! Everything one instance process knows about its edges. Handlers for
//! controller events, partner transfers and simulation reports all take the
//! context explicitly, so several instances can share one process in tests.

use std::sync::Arc;

use super::buffer::EdgeBuffer;
use super::gate::AvailabilityGate;
use crate::config::InstanceConfig;
use crate::edge::InstanceId;
use crate::errors::{EdgeError, Result};
use crate::messages::{
    EdgeLinkUpdate, EdgeTransfer, EdgeTransferResponse, EdgeUpdate, InstanceEvent,
    TeleportPlayerResponse, TeleportPlayerToServer, TrainLayoutUpdate, TrainPenaltyUpdate,
};
use crate::simulation;
use crate::transfer::TransferBatch;
use crate::transport::{CommandChannel, InstanceTransport};

pub struct InstanceContext {
    config: InstanceConfig,
    edges: AvailabilityGate<Arc<EdgeBuffer>>,
    transport: Arc<dyn InstanceTransport>,
    commands: Arc<dyn CommandChannel>,
}

impl std::fmt::Debug for InstanceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceContext")
            .field("config", &self.config)
            .field("edges", &self.edges.ids())
            .field("transport", &"<InstanceTransport>")
            .field("commands", &"<CommandChannel>")
            .finish()
    }
}

impl InstanceContext {
    pub fn new(
        config: InstanceConfig,
        transport: Arc<dyn InstanceTransport>,
        commands: Arc<dyn CommandChannel>,
    ) -> Self {
        let timeout = config.edge_wait_timeout();
        InstanceContext {
            config,
            edges: AvailabilityGate::new(timeout),
            transport,
            commands,
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.config.instance_id
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    /// Ids of all cached edges, sorted
    pub fn edge_ids(&self) -> Vec<String> {
        self.edges.ids()
    }

    /// Cached edge, without waiting
    pub fn cached_edge(&self, edge_id: &str) -> Option<Arc<EdgeBuffer>> {
        self.edges.get_cached(edge_id)
    }

    /// Cached edge, waiting up to the configured timeout for it to arrive
    pub async fn get_edge(&self, edge_id: &str) -> Result<Arc<EdgeBuffer>> {
        self.edges.get(edge_id).await
    }

    /// Simulation started: tell it which instance it is
    pub async fn on_start(&self) -> Result<()> {
        tracing::info!(instance_id = self.instance_id(), "Instance started, configuring simulation");
        self.commands
            .send_command(simulation::set_config(self.instance_id()))
            .await
    }

    /// Route a controller event to its handler
    pub async fn handle_event(&self, event: InstanceEvent) -> Result<()> {
        match event {
            InstanceEvent::EdgeUpdate(update) => self.handle_edge_update(update).await,
            InstanceEvent::EdgeLinkUpdate(update) => self.handle_edge_link_update(update).await,
            InstanceEvent::TrainPenaltyUpdate(update) => self.handle_penalty_map_update(update).await,
        }
    }

    /// Cache pushed edge records and forward them to the simulation
    ///
    /// Every record is processed even if forwarding one fails; the last
    /// forwarding error is returned.
    pub async fn handle_edge_update(&self, update: EdgeUpdate) -> Result<()> {
        let mut result = Ok(());

        for edge in update.updates {
            let cached = self.edges.get_cached(&edge.id);

            // A cached edge that moved away still receives the new record
            if !edge.touches(self.instance_id()) && cached.is_none() {
                tracing::warn!(
                    edge_id = %edge.id,
                    instance_id = self.instance_id(),
                    "Ignoring edge update for an edge this instance is not part of"
                );
                continue;
            }

            match cached {
                Some(buffer) => buffer.update(edge.clone()),
                None => {
                    let buffer = Arc::new(EdgeBuffer::new(
                        edge.clone(),
                        &self.config,
                        self.transport.clone(),
                        self.commands.clone(),
                    ));
                    let released = self.edges.publish(&edge.id, buffer);
                    tracing::info!(edge_id = %edge.id, active = edge.active, released, "Edge cached");
                }
            }

            let command = simulation::edge_update(&edge)?;
            if let Err(e) = self.commands.send_command(command).await {
                tracing::warn!(edge_id = %edge.id, error = %e, "Failed to forward edge update to simulation");
                result = Err(e);
            }
        }

        result
    }

    /// Transfers reported by the local simulation, bound for the partner
    pub async fn handle_game_transfer(&self, edge_id: &str, batch: TransferBatch) -> Result<()> {
        let buffer = self.get_edge(edge_id).await?;
        buffer.outgoing().push_batch(batch);
        Ok(())
    }

    /// Batch received from the partner instance, bound for the simulation
    pub async fn handle_edge_transfer(&self, transfer: EdgeTransfer) -> EdgeTransferResponse {
        match self.get_edge(&transfer.edge_id).await {
            Ok(buffer) => {
                buffer.incoming().push_batch(transfer.batch);
                EdgeTransferResponse { success: true }
            }
            Err(e) => {
                tracing::warn!(edge_id = %transfer.edge_id, error = %e, "Dropping edge transfer");
                EdgeTransferResponse { success: false }
            }
        }
    }

    /// Link event from the partner side, applied to the simulation
    pub async fn handle_edge_link_update(&self, update: EdgeLinkUpdate) -> Result<()> {
        self.get_edge(&update.edge_id).await?;
        self.commands
            .send_command(simulation::edge_link_update(&update)?)
            .await
    }

    /// Link event from the local simulation, sent to the partner instance
    pub async fn send_edge_link_update(&self, update: EdgeLinkUpdate) -> Result<()> {
        let buffer = self.get_edge(&update.edge_id).await?;
        let partner = buffer.partner_of(self.instance_id()).ok_or_else(|| {
            EdgeError::Delivery(format!("edge {} has no partner instance", update.edge_id))
        })?;
        self.transport.send_link_update(partner, update).await
    }

    /// Reachability report from the local simulation, forwarded to the controller
    pub async fn handle_train_layout_report(&self, update: TrainLayoutUpdate) -> Result<()> {
        tracing::debug!(
            edge_id = %update.edge_id,
            offset = update.data.offset,
            targets = update.data.reachable_targets.len(),
            "Forwarding train layout"
        );
        self.transport.send_train_layout(update).await
    }

    /// A player reached an edge in the local simulation; ask the controller
    /// for the partner's address
    pub async fn request_player_teleport(
        &self,
        player_name: &str,
        edge_id: &str,
        offset: i64,
    ) -> Result<TeleportPlayerResponse> {
        self.get_edge(edge_id).await?;
        let request = TeleportPlayerToServer {
            player_name: player_name.to_string(),
            edge_id: edge_id.to_string(),
            instance_id: self.instance_id(),
            offset,
        };
        match self.transport.request_teleport(request).await {
            Ok(response) => {
                tracing::info!(player = player_name, edge_id, address = %response.address, "Player teleport resolved");
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(player = player_name, edge_id, error = %e, "Player teleport failed");
                Err(e)
            }
        }
    }

    /// Penalty map computed by the controller, applied to the simulation
    pub async fn handle_penalty_map_update(&self, update: TrainPenaltyUpdate) -> Result<()> {
        let command = simulation::train_penalty_map(&update.edge_id, update.offset, &update.penalty_map)?;
        self.commands.send_command(command).await
    }
}
