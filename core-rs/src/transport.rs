//! Collaborator seams
//!
//! The crate does not own any sockets. Hosts plug their cluster messaging
//! and the simulation's command interface in through these traits.

use async_trait::async_trait;

use crate::edge::InstanceId;
use crate::errors::Result;
use crate::messages::{
    EdgeLinkUpdate, EdgeTransfer, EdgeTransferResponse, InstanceEvent, TeleportPlayerResponse,
    TeleportPlayerToServer, TrainLayoutUpdate,
};

/// Controller-side messaging: push events to one instance
#[async_trait]
pub trait ControllerTransport: Send + Sync {
    async fn send_to_instance(&self, instance_id: InstanceId, event: InstanceEvent) -> Result<()>;

    /// Public game address players use to join an instance
    async fn instance_address(&self, instance_id: InstanceId) -> Result<String>;
}

/// Instance-side messaging
///
/// Delivery is assumed ordered per sender/receiver pair.
#[async_trait]
pub trait InstanceTransport: Send + Sync {
    /// Deliver a consolidated batch to the partner instance of an edge
    async fn send_edge_transfer(
        &self,
        target: InstanceId,
        transfer: EdgeTransfer,
    ) -> Result<EdgeTransferResponse>;

    async fn send_link_update(&self, target: InstanceId, update: EdgeLinkUpdate) -> Result<()>;

    /// Report reachability for one offset to the controller
    async fn send_train_layout(&self, update: TrainLayoutUpdate) -> Result<()>;

    /// Ask the controller where a player crossing an edge should connect
    async fn request_teleport(&self, request: TeleportPlayerToServer) -> Result<TeleportPlayerResponse>;
}

/// Text command interface into an instance's simulation
#[async_trait]
pub trait CommandChannel: Send + Sync {
    async fn send_command(&self, command: String) -> Result<()>;
}
