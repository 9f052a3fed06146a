//! Edge data model
//!
//! Provides the edge record exchanged between controller and instances,
//! the reachability data used for train routing, and the activation policy.

pub mod metadata;
pub mod status;

pub use metadata::{
    destination_id, parse_offset, Edge, EdgeTargetSpecification, InstanceId, LinkDestination,
};
pub use status::{is_edge_active, InstanceStatus};
