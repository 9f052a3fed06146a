//! Integration tests: controller and instances on one in-process bus
//!
//! Status changes, edge config and train layouts go through the real
//! `ControllerContext`, and its events land in real `InstanceContext`s.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use universal_edges::transfer::BeltTransfer;
use universal_edges::{
    CommandChannel, ControllerConfig, ControllerContext, ControllerTransport, Edge, EdgeDirectory,
    EdgeError, EdgeLinkUpdate, EdgeTargetSpecification, EdgeTransfer, EdgeTransferResponse, InstanceConfig,
    InstanceContext, InstanceEvent, InstanceId, InstanceStatus, InstanceTransport, LinkDestination, Result,
    SetEdgeConfig, TeleportPlayerResponse, TeleportPlayerToServer, TrainLayout, TrainLayoutUpdate, TransferBatch,
};

#[derive(Default)]
struct Bus {
    controller: Mutex<Option<Arc<ControllerContext>>>,
    instances: Mutex<HashMap<InstanceId, Arc<InstanceContext>>>,
}

impl Bus {
    fn controller(&self) -> Result<Arc<ControllerContext>> {
        self.controller
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| EdgeError::Delivery("controller offline".to_string()))
    }

    fn instance(&self, id: InstanceId) -> Result<Arc<InstanceContext>> {
        self.instances
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| EdgeError::Delivery(format!("instance {} offline", id)))
    }
}

#[async_trait]
impl ControllerTransport for Bus {
    async fn send_to_instance(&self, instance_id: InstanceId, event: InstanceEvent) -> Result<()> {
        self.instance(instance_id)?.handle_event(event).await
    }

    async fn instance_address(&self, instance_id: InstanceId) -> Result<String> {
        self.instance(instance_id)?;
        Ok(format!("192.168.1.{}:34197", instance_id))
    }
}

#[async_trait]
impl InstanceTransport for Bus {
    async fn send_edge_transfer(&self, target: InstanceId, transfer: EdgeTransfer) -> Result<EdgeTransferResponse> {
        Ok(self.instance(target)?.handle_edge_transfer(transfer).await)
    }

    async fn send_link_update(&self, target: InstanceId, update: EdgeLinkUpdate) -> Result<()> {
        self.instance(target)?.handle_edge_link_update(update).await
    }

    async fn send_train_layout(&self, update: TrainLayoutUpdate) -> Result<()> {
        self.controller()?.handle_train_layout_update(update).await
    }

    async fn request_teleport(&self, request: TeleportPlayerToServer) -> Result<TeleportPlayerResponse> {
        self.controller()?.handle_teleport_player(request).await
    }
}

#[derive(Default)]
struct Console {
    commands: Mutex<Vec<String>>,
}

impl Console {
    fn matching(&self, prefix: &str) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CommandChannel for Console {
    async fn send_command(&self, command: String) -> Result<()> {
        self.commands.lock().unwrap().push(command);
        Ok(())
    }
}

struct World {
    bus: Arc<Bus>,
    controller: Arc<ControllerContext>,
    consoles: HashMap<InstanceId, Arc<Console>>,
    temp: TempDir,
}

impl World {
    /// Controller loading `edges` from disk, plus one instance per id
    fn new(edges: Vec<Edge>, ids: &[InstanceId]) -> Self {
        let temp = TempDir::new().unwrap();
        let config = ControllerConfig {
            database_directory: temp.path().join("database"),
            ..Default::default()
        };

        let mut directory = EdgeDirectory::new();
        for edge in edges {
            directory.insert(edge);
        }
        directory.save(config.directory_path()).unwrap();

        let bus = Arc::new(Bus::default());
        let controller = Arc::new(ControllerContext::load(config, bus.clone()).unwrap());
        *bus.controller.lock().unwrap() = Some(controller.clone());

        let mut consoles = HashMap::new();
        for &id in ids {
            let console = Arc::new(Console::default());
            let instance = InstanceContext::new(InstanceConfig::for_instance(id), bus.clone(), console.clone());
            bus.instances.lock().unwrap().insert(id, Arc::new(instance));
            consoles.insert(id, console);
        }

        World { bus, controller, consoles, temp }
    }

    fn instance(&self, id: InstanceId) -> Arc<InstanceContext> {
        self.bus.instance(id).unwrap()
    }

    fn console(&self, id: InstanceId) -> &Console {
        &self.consoles[&id]
    }

    async fn start(&self, id: InstanceId) {
        self.instance(id).on_start().await.unwrap();
        self.controller.on_instance_status_changed(id, InstanceStatus::Running).await.unwrap();
    }
}

fn endpoint(instance_id: InstanceId) -> EdgeTargetSpecification {
    EdgeTargetSpecification {
        instance_id,
        origin: [0.0, 0.0],
        surface: 1,
        direction: 0,
        ready: true,
    }
}

fn edge(id: &str, source: InstanceId, target: InstanceId) -> Edge {
    let mut edge = Edge::new(id, endpoint(source), endpoint(target), 20.0);
    edge.updated_at_ms = 1_000;
    edge
}

/// Test: Starting both endpoints syncs and activates the edge everywhere
#[tokio::test]
async fn test_startup_activates_edge_on_both_instances() {
    let world = World::new(vec![edge("E1", 1, 2), edge("E2", 3, 4)], &[1, 2]);

    world.start(1).await;
    assert!(!world.instance(1).cached_edge("E1").unwrap().is_active());
    assert!(world.instance(1).cached_edge("E2").is_none());

    world.start(2).await;
    assert!(world.instance(1).cached_edge("E1").unwrap().is_active());
    assert!(world.instance(2).cached_edge("E1").unwrap().is_active());
    assert!(world.controller.edge("E1").unwrap().active);

    let set_config = world.console(2).matching("/sc universal_edges.set_config(");
    assert_eq!(set_config, vec!["/sc universal_edges.set_config({instance_id = 2})".to_string()]);
}

/// Test: Stopping one endpoint deactivates the edge on the other
#[tokio::test]
async fn test_stop_deactivates_edge() {
    let world = World::new(vec![edge("E1", 1, 2)], &[1, 2]);
    world.start(1).await;
    world.start(2).await;

    world.controller.on_instance_status_changed(2, InstanceStatus::Stopping).await.unwrap();

    assert!(!world.controller.edge("E1").unwrap().active);
    assert!(!world.instance(1).cached_edge("E1").unwrap().is_active());
}

/// Test: Activation changes are persisted and reload identically
#[tokio::test]
async fn test_directory_persists_activation() {
    let world = World::new(vec![edge("E1", 1, 2)], &[1, 2]);
    world.start(1).await;
    world.start(2).await;

    assert!(world.controller.save_if_dirty().unwrap());
    assert!(!world.controller.save_if_dirty().unwrap());

    let path = world.temp.path().join("database").join("edgeDatastore.json");
    let reloaded = EdgeDirectory::load(&path).unwrap();
    assert!(reloaded.get("E1").unwrap().active);

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw.is_array());
}

/// Test: Subscribers see every change; polling sees only newer edges
#[tokio::test]
async fn test_subscription_observers() {
    let world = World::new(vec![edge("E1", 1, 2)], &[1, 2]);
    let mut observer = world.controller.subscribe();

    assert!(world.controller.handle_subscription(1_000).is_none());

    world.start(1).await;
    world.start(2).await;

    let update = observer.try_recv().unwrap();
    assert_eq!(update.updates[0].id, "E1");
    assert!(update.updates[0].active);

    let polled = world.controller.handle_subscription(1_000).unwrap();
    assert_eq!(polled.updates.len(), 1);
}

/// Test: Moving an edge notifies the old endpoint too
#[tokio::test]
async fn test_set_edge_config_reaches_old_and_new_endpoints() {
    let world = World::new(vec![edge("E1", 1, 2)], &[1, 2, 3]);
    world.start(1).await;
    world.start(2).await;
    world.start(3).await;

    let stored = world
        .controller
        .handle_set_edge_config(SetEdgeConfig { edge: edge("E1", 1, 3) })
        .await
        .unwrap();

    assert!(stored.active);
    assert!(stored.updated_at_ms > 1_000);
    assert_eq!(world.instance(3).cached_edge("E1").unwrap().edge().target.instance_id, 3);
    // Instance 2 keeps the record but learns it no longer ends there
    assert_eq!(world.instance(2).cached_edge("E1").unwrap().edge().target.instance_id, 3);
}

/// Test: Soft delete deactivates the edge
#[tokio::test]
async fn test_soft_delete() {
    let world = World::new(vec![edge("E1", 1, 2)], &[1, 2]);
    world.start(1).await;
    world.start(2).await;

    let mut deleted = edge("E1", 1, 2);
    deleted.is_deleted = true;
    let stored = world
        .controller
        .handle_set_edge_config(SetEdgeConfig { edge: deleted })
        .await
        .unwrap();

    assert!(!stored.active);
    assert!(!world.instance(1).cached_edge("E1").unwrap().is_active());
}

/// Test: Train layouts from two instances produce routed penalties
#[tokio::test]
async fn test_train_layouts_produce_penalty_commands() {
    let world = World::new(vec![edge("E1", 1, 2), edge("E2", 2, 3)], &[1, 2, 3]);
    for id in [1, 2, 3] {
        world.start(id).await;
    }

    // Instance 2 can reach "Iron" right past offset 0 of E1
    world
        .instance(2)
        .handle_train_layout_report(TrainLayoutUpdate {
            edge_id: "E1".to_string(),
            data: TrainLayout {
                offset: 0,
                reachable_targets: vec!["Iron".to_string()],
                reachable_sources: vec![],
                source_instance_id: 1,
            },
        })
        .await
        .unwrap();

    // Trains entering E2 at offset 0 come out where E1 0 is reachable
    world
        .instance(3)
        .handle_train_layout_report(TrainLayoutUpdate {
            edge_id: "E2".to_string(),
            data: TrainLayout {
                offset: 0,
                reachable_targets: vec![],
                reachable_sources: vec!["E1 0".to_string()],
                source_instance_id: 2,
            },
        })
        .await
        .unwrap();

    let e1 = world.controller.edge("E1").unwrap();
    assert_eq!(
        e1.link_destinations.get("0"),
        Some(&LinkDestination {
            reachable_targets: vec!["Iron".to_string()],
            reachable_sources: vec![],
            source_instance_id: 1,
        })
    );

    let penalties = world.console(2).matching("/sc universal_edges.set_train_penalty_map(\"E2\", 0,");
    let last = penalties.last().unwrap();
    assert!(last.contains("100000"), "unexpected command {}", last);

    let direct = world.console(1).matching("/sc universal_edges.set_train_penalty_map(\"E1\", 0,");
    assert!(direct.last().unwrap().contains(":0"));
}

/// Test: The controller routes link events to the other endpoint
#[tokio::test]
async fn test_controller_routes_link_updates() {
    let world = World::new(vec![edge("E1", 1, 2)], &[1, 2]);
    world.start(1).await;
    world.start(2).await;

    world
        .controller
        .route_edge_link_update(
            1,
            EdgeLinkUpdate {
                edge_id: "E1".to_string(),
                kind: "set_link".to_string(),
                data: serde_json::json!({"offset": 1}),
            },
        )
        .await
        .unwrap();

    assert_eq!(world.console(2).matching("/sc universal_edges.edge_link_update(").len(), 1);
    assert!(world.console(1).matching("/sc universal_edges.edge_link_update(").is_empty());
}

/// Test: After controller sync, belt items cross the edge end to end
#[tokio::test(start_paused = true)]
async fn test_transfer_after_controller_sync() {
    let world = World::new(vec![edge("E1", 1, 2)], &[1, 2]);
    world.start(1).await;
    world.start(2).await;

    let batch = TransferBatch {
        belt_transfers: vec![BeltTransfer {
            offset: 5,
            item_stacks: Some(vec![serde_json::json!({"name": "iron-plate", "count": 8})]),
            set_flow: Some(true),
        }],
        ..Default::default()
    };
    world.instance(1).handle_game_transfer("E1", batch).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let applied = world.console(2).matching("/sc universal_edges.edge_transfer(\"E1\"");
    assert_eq!(applied.len(), 1);
    assert!(applied[0].contains("iron-plate"));
}

/// Test: A player crossing an edge is sent to the partner instance's address
#[tokio::test]
async fn test_player_teleport_resolves_partner_address() {
    let world = World::new(vec![edge("E1", 1, 2), edge("E2", 2, 9)], &[1, 2]);
    world.start(1).await;
    world.start(2).await;

    let response = world.instance(1).request_player_teleport("alice", "E1", 4).await.unwrap();
    assert_eq!(response.address, "192.168.1.2:34197");

    let response = world.instance(2).request_player_teleport("bob", "E1", 4).await.unwrap();
    assert_eq!(response.address, "192.168.1.1:34197");

    // Instance 9 is not on the bus, so its address cannot be resolved
    let result = world.instance(2).request_player_teleport("carol", "E2", 0).await;
    assert!(matches!(result, Err(EdgeError::Delivery(_))));
}
