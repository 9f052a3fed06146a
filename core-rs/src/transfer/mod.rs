//! Cross-edge resource transfers
//!
//! Typed records for belts, fluids, power, trains and entities, and the
//! merge engine that consolidates them per edge and direction.

pub mod merge;
pub mod records;

pub use merge::PendingTransfers;
pub use records::{
    BeltTransfer, EntityTransfer, FluidTransfer, PowerTransfer, TrainTransfer, Transfer,
    TransferBatch,
};
