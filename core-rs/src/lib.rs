//! # Universal Edges
//!
//! Connects pairs of game-server instances through "edges" so belts, fluids,
//! power, trains and players can cross from one instance's world to
//! another's.
//!
//! ## Core Pieces
//!
//! - **Transfer merge**: simulation events for one edge are folded into
//!   per-offset pending records (items append, tank levels overwrite, flow
//!   balances sum).
//! - **Rate-limited dispatch**: each edge direction drains its pending
//!   records at most N times per second, so per-tick events become a bounded
//!   stream of messages and commands.
//! - **Availability gate**: events for an edge the instance has not heard of
//!   yet wait a bounded time for the controller's directory push.
//! - **Pathfinder**: the controller relaxes reachability reports into
//!   per-offset train penalty maps.
//!
//! ## Architecture
//!
//! ```text
//!   simulation A                                   simulation B
//!       │ events                                        ▲ commands
//!       ▼                                               │
//!  ┌─────────────┐   EdgeTransfer (≤50/s)   ┌─────────────┐
//!  │ instance A  │ ───────────────────────► │ instance B  │
//!  │  outgoing   │                          │  incoming   │
//!  └─────────────┘                          └─────────────┘
//!         │  TrainLayoutUpdate       EdgeUpdate  ▲
//!         ▼                                      │
//!  ┌──────────────────────────────────────────────────┐
//!  │ controller: directory, status, pathfinder        │
//!  └──────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod dispatch;
pub mod edge;
pub mod errors;
pub mod instance;
pub mod messages;
pub mod simulation;
pub mod transfer;
pub mod transport;

pub use config::{ControllerConfig, EdgesConfig, InstanceConfig};
pub use controller::{ControllerContext, EdgeDirectory, PathfinderOutcome, PenaltyAssignment};
pub use dispatch::{Direction, Dispatch, RateLimiter, TransferChannel};
pub use edge::{Edge, EdgeTargetSpecification, InstanceId, InstanceStatus, LinkDestination};
pub use errors::{EdgeError, Result};
pub use instance::{AvailabilityGate, EdgeBuffer, InstanceContext};
pub use messages::{
    EdgeLinkUpdate, EdgeTransfer, EdgeTransferResponse, EdgeUpdate, InstanceEvent, SetEdgeConfig,
    TeleportPlayerResponse, TeleportPlayerToServer, TrainLayout, TrainLayoutUpdate, TrainPenaltyUpdate,
};
pub use transfer::{PendingTransfers, Transfer, TransferBatch};
pub use transport::{CommandChannel, ControllerTransport, InstanceTransport};

/// Version of the edge wire protocol
pub const VERSION: &str = "0.4.0";

/// Default directory file name inside the controller's database directory
pub const DEFAULT_DIRECTORY_FILE: &str = "edgeDatastore.json";
