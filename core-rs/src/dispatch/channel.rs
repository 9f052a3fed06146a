//! Transfer channel: pending merge state paired with its rate limiter

use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Mutex};

use super::lock;
use super::rate_limiter::{FlushAction, FlushFuture, RateLimiter};
use crate::errors::Result;
use crate::transfer::{PendingTransfers, Transfer, TransferBatch};

/// Which way a channel moves transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Simulation -> partner instance (`EdgeTransfer` messages)
    Outgoing,
    /// Partner instance -> simulation (commands)
    Incoming,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outgoing => write!(f, "outgoing"),
            Direction::Incoming => write!(f, "incoming"),
        }
    }
}

/// Where a drained batch goes
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, batch: TransferBatch) -> Result<()>;
}

/// Merge engine for one edge and direction, drained by a rate limiter
#[derive(Debug, Clone)]
pub struct TransferChannel {
    direction: Direction,
    pending: Arc<Mutex<PendingTransfers>>,
    limiter: RateLimiter,
}

impl TransferChannel {
    pub fn new(edge_id: &str, direction: Direction, max_per_second: f64, sink: Arc<dyn Dispatch>) -> Self {
        let pending = Arc::new(Mutex::new(PendingTransfers::new(edge_id)));

        let action_pending = pending.clone();
        let action: FlushAction = Arc::new(move || -> FlushFuture {
            let pending = action_pending.clone();
            let sink = sink.clone();
            Box::pin(async move { flush_pending(&pending, sink.as_ref()).await })
        });

        let label = format!("{} {}", edge_id, direction);
        TransferChannel {
            direction,
            pending,
            limiter: RateLimiter::new(&label, max_per_second, action),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Merge transfers in order, then arm the limiter
    pub fn push<I>(&self, transfers: I)
    where
        I: IntoIterator<Item = Transfer>,
    {
        lock(&self.pending).merge(transfers);
        self.limiter.activate();
    }

    pub fn push_batch(&self, batch: TransferBatch) {
        self.push(batch.into_transfers());
    }

    pub fn has_pending(&self) -> bool {
        !lock(&self.pending).is_empty()
    }

    /// Snapshot and clear the pending maps without dispatching
    pub fn drain(&self) -> TransferBatch {
        lock(&self.pending).drain()
    }
}

/// Drain and dispatch; a failed dispatch loses the drained batch
async fn flush_pending(pending: &Mutex<PendingTransfers>, sink: &dyn Dispatch) -> Result<()> {
    let batch = lock(pending).drain();
    if batch.is_empty() {
        return Ok(());
    }
    sink.dispatch(batch).await
}
