//! Instance side of the edge protocol
//!
//! - `gate` - cache whose readers may wait for a not-yet-published edge
//! - `buffer` - per-edge record plus outgoing and incoming channels
//! - `context` - handlers for simulation, partner and controller events

pub mod buffer;
pub mod context;
pub mod gate;

pub use buffer::EdgeBuffer;
pub use context::InstanceContext;
pub use gate::{AvailabilityGate, EDGE_WAIT_TIMEOUT};
