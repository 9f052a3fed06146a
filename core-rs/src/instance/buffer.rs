//! Runtime companion of a cached edge
//!
//! Holds the current edge record plus the outgoing and incoming transfer
//! channels. Created on first sight of an edge, owned by one instance.

use std::sync::{Arc, Mutex};

use crate::config::InstanceConfig;
use crate::dispatch::{lock, Direction, PartnerDispatch, SimulationDispatch, TransferChannel};
use crate::edge::{Edge, InstanceId};
use crate::transport::{CommandChannel, InstanceTransport};

#[derive(Debug)]
pub struct EdgeBuffer {
    id: String,
    edge: Arc<Mutex<Edge>>,
    outgoing: TransferChannel,
    incoming: TransferChannel,
}

impl EdgeBuffer {
    pub fn new(
        edge: Edge,
        config: &InstanceConfig,
        transport: Arc<dyn InstanceTransport>,
        commands: Arc<dyn CommandChannel>,
    ) -> Self {
        let id = edge.id.clone();
        let edge = Arc::new(Mutex::new(edge));

        let partner = Arc::new(PartnerDispatch::new(config.instance_id, edge.clone(), transport));
        let simulation = Arc::new(SimulationDispatch::new(&id, commands));

        EdgeBuffer {
            outgoing: TransferChannel::new(&id, Direction::Outgoing, config.outgoing_rate_per_second, partner),
            incoming: TransferChannel::new(&id, Direction::Incoming, config.command_rate_per_second, simulation),
            id,
            edge,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Snapshot of the cached edge record
    pub fn edge(&self) -> Edge {
        lock(&self.edge).clone()
    }

    /// Replace the cached record, keeping pending transfers
    pub fn update(&self, edge: Edge) {
        *lock(&self.edge) = edge;
    }

    pub fn partner_of(&self, instance_id: InstanceId) -> Option<InstanceId> {
        lock(&self.edge).partner_of(instance_id)
    }

    pub fn is_active(&self) -> bool {
        lock(&self.edge).active
    }

    pub fn outgoing(&self) -> &TransferChannel {
        &self.outgoing
    }

    pub fn incoming(&self) -> &TransferChannel {
        &self.incoming
    }
}
