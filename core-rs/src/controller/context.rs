//! Controller context
//!
//! Owns the edge directory, the last status seen for every instance and the
//! subscription feed. Every change to an edge is pushed to the instances at
//! both of its ends; sends happen after the state lock is released.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use super::directory::EdgeDirectory;
use super::pathfinder::{self, PathfinderOutcome};
use crate::config::ControllerConfig;
use crate::dispatch::lock;
use crate::edge::{is_edge_active, Edge, InstanceId, InstanceStatus};
use crate::errors::{EdgeError, Result};
use crate::messages::{
    EdgeLinkUpdate, EdgeUpdate, InstanceEvent, SetEdgeConfig, TeleportPlayerResponse, TeleportPlayerToServer,
    TrainLayoutUpdate,
};
use crate::transport::ControllerTransport;

const OBSERVER_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct ControllerState {
    directory: EdgeDirectory,
    statuses: HashMap<InstanceId, InstanceStatus>,
    dirty: bool,
}

pub struct ControllerContext {
    config: ControllerConfig,
    state: Mutex<ControllerState>,
    transport: Arc<dyn ControllerTransport>,
    observers: broadcast::Sender<EdgeUpdate>,
}

impl std::fmt::Debug for ControllerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerContext")
            .field("config", &self.config)
            .field("state", &*lock(&self.state))
            .field("transport", &"<ControllerTransport>")
            .finish()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl ControllerContext {
    pub fn new(config: ControllerConfig, directory: EdgeDirectory, transport: Arc<dyn ControllerTransport>) -> Self {
        let (observers, _) = broadcast::channel(OBSERVER_CAPACITY);
        ControllerContext {
            config,
            state: Mutex::new(ControllerState {
                directory,
                ..Default::default()
            }),
            transport,
            observers,
        }
    }

    /// Create a context from the directory file named in the config
    pub fn load(config: ControllerConfig, transport: Arc<dyn ControllerTransport>) -> Result<Self> {
        let directory = EdgeDirectory::load(config.directory_path())?;
        Ok(Self::new(config, directory, transport))
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn edge(&self, edge_id: &str) -> Option<Edge> {
        lock(&self.state).directory.get(edge_id).cloned()
    }

    pub fn edges(&self) -> Vec<Edge> {
        lock(&self.state).directory.values().cloned().collect()
    }

    pub fn status(&self, instance_id: InstanceId) -> Option<InstanceStatus> {
        lock(&self.state).statuses.get(&instance_id).copied()
    }

    pub fn is_dirty(&self) -> bool {
        lock(&self.state).dirty
    }

    /// Observe every edge change, the way control clients do
    pub fn subscribe(&self) -> broadcast::Receiver<EdgeUpdate> {
        self.observers.subscribe()
    }

    /// Edges changed after the client's last request, or None if nothing did
    pub fn handle_subscription(&self, last_request_time_ms: i64) -> Option<EdgeUpdate> {
        let updates = lock(&self.state).directory.updated_since(last_request_time_ms);
        if updates.is_empty() {
            None
        } else {
            Some(EdgeUpdate { updates })
        }
    }

    /// Record a status transition and propagate activation changes
    ///
    /// An instance that becomes running additionally receives every edge it
    /// is an endpoint of.
    pub async fn on_instance_status_changed(&self, instance_id: InstanceId, status: InstanceStatus) -> Result<()> {
        let (changed, full_sync) = {
            let mut state = lock(&self.state);
            state.statuses.insert(instance_id, status);

            let now = now_ms();
            let ControllerState { directory, statuses, dirty } = &mut *state;
            let mut changed = Vec::new();
            for edge in directory.values_mut().filter(|e| e.touches(instance_id)) {
                let active = is_edge_active(edge, statuses);
                if edge.active != active {
                    edge.active = active;
                    edge.touch(now);
                    *dirty = true;
                    changed.push(edge.clone());
                }
            }

            let full_sync = if status.is_running() {
                Some(directory.edges_for_instance(instance_id))
            } else {
                None
            };
            (changed, full_sync)
        };

        tracing::info!(
            instance_id,
            status = ?status,
            changed = changed.len(),
            "Instance status changed"
        );

        if let Some(edges) = full_sync {
            tracing::info!(instance_id, edges = edges.len(), "Sending full edge sync");
            self.send(instance_id, InstanceEvent::EdgeUpdate(EdgeUpdate { updates: edges }))
                .await;
        }

        let skip = if status.is_running() { Some(instance_id) } else { None };
        self.fan_out(&changed, skip).await;
        self.notify_observers(changed);
        Ok(())
    }

    /// Create, replace or soft-delete an edge
    ///
    /// Returns the stored record.
    pub async fn handle_set_edge_config(&self, request: SetEdgeConfig) -> Result<Edge> {
        let mut edge = request.edge;
        if edge.id.trim().is_empty() {
            return Err(EdgeError::InvalidDirectory("edge id must not be empty".to_string()));
        }

        let (previous, stored, reachability_changed) = {
            let mut state = lock(&self.state);
            let previous = state.directory.get(&edge.id).cloned();

            if let Some(prev) = &previous {
                if edge.link_destinations.is_empty() {
                    edge.link_destinations = prev.link_destinations.clone();
                }
                edge.updated_at_ms = prev.updated_at_ms;
            }
            edge.touch(now_ms());
            edge.active = is_edge_active(&edge, &state.statuses);

            let reachability_changed = previous
                .as_ref()
                .map(|prev| prev.link_destinations != edge.link_destinations || prev.is_deleted != edge.is_deleted)
                .unwrap_or(!edge.link_destinations.is_empty());

            state.directory.insert(edge.clone());
            state.dirty = true;
            (previous, edge, reachability_changed)
        };

        tracing::info!(
            edge_id = %stored.id,
            created = previous.is_none(),
            deleted = stored.is_deleted,
            active = stored.active,
            "Edge config set"
        );

        // The old endpoints learn about the change too, in case they moved
        let mut recipients: Vec<InstanceId> = stored.endpoints();
        if let Some(prev) = &previous {
            recipients.extend(prev.endpoints());
        }
        recipients.sort_unstable();
        recipients.dedup();

        for instance_id in recipients {
            self.send(instance_id, InstanceEvent::EdgeUpdate(EdgeUpdate { updates: vec![stored.clone()] }))
                .await;
        }
        self.notify_observers(vec![stored.clone()]);

        if reachability_changed {
            self.run_pathfinder().await;
        }
        Ok(stored)
    }

    /// Store reachability reported for one offset; reruns the pathfinder on change
    pub async fn handle_train_layout_update(&self, update: TrainLayoutUpdate) -> Result<()> {
        let changed = {
            let mut state = lock(&self.state);
            let now = now_ms();
            let edge = match state.directory.get_mut(&update.edge_id) {
                Some(edge) => edge,
                None => {
                    tracing::warn!(edge_id = %update.edge_id, "Train layout for unknown edge");
                    return Err(EdgeError::EdgeNotFound(update.edge_id));
                }
            };

            if edge.set_link_destination(update.data.offset, update.data.to_link_destination()) {
                edge.touch(now);
                let edge = edge.clone();
                state.dirty = true;
                Some(edge)
            } else {
                None
            }
        };

        let edge = match changed {
            Some(edge) => edge,
            None => {
                tracing::debug!(edge_id = %update.edge_id, offset = update.data.offset, "Train layout unchanged");
                return Ok(());
            }
        };

        tracing::info!(edge_id = %edge.id, offset = update.data.offset, "Train layout changed");
        self.fan_out(std::slice::from_ref(&edge), None).await;
        self.notify_observers(vec![edge]);
        self.run_pathfinder().await;
        Ok(())
    }

    /// Forward a link event to the other endpoint of its edge
    pub async fn route_edge_link_update(&self, from: InstanceId, update: EdgeLinkUpdate) -> Result<()> {
        let partner = {
            let state = lock(&self.state);
            let edge = state.directory.get(&update.edge_id).ok_or_else(|| {
                tracing::warn!(edge_id = %update.edge_id, "Link update for unknown edge");
                EdgeError::EdgeNotFound(update.edge_id.clone())
            })?;
            edge.partner_of(from)
        };

        let partner = partner.ok_or_else(|| {
            tracing::warn!(edge_id = %update.edge_id, from, "Link update from an instance with no partner");
            EdgeError::UnknownDestination(format!("edge {} from instance {}", update.edge_id, from))
        })?;

        self.transport
            .send_to_instance(partner, InstanceEvent::EdgeLinkUpdate(update))
            .await
    }

    /// Resolve the server a player crossing an edge should connect to
    ///
    /// The destination is the partner of the requesting instance; deleted
    /// edges count as unknown.
    pub async fn handle_teleport_player(&self, request: TeleportPlayerToServer) -> Result<TeleportPlayerResponse> {
        let partner = {
            let state = lock(&self.state);
            let edge = state
                .directory
                .get(&request.edge_id)
                .filter(|edge| !edge.is_deleted)
                .ok_or_else(|| {
                    tracing::warn!(
                        edge_id = %request.edge_id,
                        player = %request.player_name,
                        "Teleport over unknown edge"
                    );
                    EdgeError::EdgeNotFound(request.edge_id.clone())
                })?;
            edge.partner_of(request.instance_id)
        };

        let partner = partner.ok_or_else(|| {
            tracing::warn!(
                edge_id = %request.edge_id,
                instance_id = request.instance_id,
                player = %request.player_name,
                "Teleport from an instance with no partner"
            );
            EdgeError::UnknownDestination(format!(
                "edge {} from instance {}",
                request.edge_id, request.instance_id
            ))
        })?;

        let address = self.transport.instance_address(partner).await?;
        tracing::info!(
            player = %request.player_name,
            edge_id = %request.edge_id,
            offset = request.offset,
            from = request.instance_id,
            to = partner,
            "Teleporting player"
        );
        Ok(TeleportPlayerResponse { address })
    }

    /// Persist the directory if anything changed since the last save
    ///
    /// Returns true if a file was written.
    pub fn save_if_dirty(&self) -> Result<bool> {
        let snapshot = {
            let mut state = lock(&self.state);
            if !state.dirty {
                return Ok(false);
            }
            state.dirty = false;
            state.directory.clone()
        };

        let path = self.config.directory_path();
        tracing::info!(path = %path.display(), "Saving edge directory");
        if let Err(e) = snapshot.save(&path) {
            lock(&self.state).dirty = true;
            return Err(e);
        }
        Ok(true)
    }

    /// Recompute routing penalties for every destination node and push them
    pub async fn run_pathfinder(&self) -> PathfinderOutcome {
        let outcome = {
            let state = lock(&self.state);
            pathfinder::run(state.directory.values())
        };

        for assignment in &outcome.assignments {
            self.send(
                assignment.instance_id,
                InstanceEvent::TrainPenaltyUpdate(assignment.update.clone()),
            )
            .await;
        }
        outcome
    }

    /// Push edges to every endpoint instance, one message per instance
    async fn fan_out(&self, edges: &[Edge], skip: Option<InstanceId>) {
        let mut per_instance: BTreeMap<InstanceId, Vec<Edge>> = BTreeMap::new();
        for edge in edges {
            for instance_id in edge.endpoints() {
                if Some(instance_id) == skip {
                    continue;
                }
                per_instance.entry(instance_id).or_default().push(edge.clone());
            }
        }

        for (instance_id, updates) in per_instance {
            self.send(instance_id, InstanceEvent::EdgeUpdate(EdgeUpdate { updates }))
                .await;
        }
    }

    async fn send(&self, instance_id: InstanceId, event: InstanceEvent) {
        if let Err(e) = self.transport.send_to_instance(instance_id, event).await {
            tracing::warn!(instance_id, error = %e, "Failed to send event to instance");
        }
    }

    fn notify_observers(&self, updates: Vec<Edge>) {
        if updates.is_empty() {
            return;
        }
        // No receivers is the normal case
        let _ = self.observers.send(EdgeUpdate { updates });
    }
}
