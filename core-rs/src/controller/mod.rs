//! Controller side of the edge protocol
//!
//! - `directory` - persisted edge records
//! - `pathfinder` - train routing penalties from reachability reports
//! - `context` - status tracking, edge config and event fan-out

pub mod context;
pub mod directory;
pub mod pathfinder;

pub use context::ControllerContext;
pub use directory::EdgeDirectory;
pub use pathfinder::{PathfinderOutcome, PenaltyAssignment, MAX_ITERATIONS, PENALTY_SCALE};
