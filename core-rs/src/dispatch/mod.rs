//! Rate-limited dispatch of merged transfers
//!
//! Each edge owns two channels at an instance: outgoing (simulation events
//! to the partner instance) and incoming (partner batches to the simulation).
//! Each channel pairs a merge engine with its own limiter.

pub mod channel;
pub mod rate_limiter;
pub mod sinks;

pub use channel::{Direction, Dispatch, TransferChannel};
pub use rate_limiter::{FlushAction, FlushFuture, RateLimiter, MAX_INTERVAL};
pub use sinks::{PartnerDispatch, SimulationDispatch};

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
