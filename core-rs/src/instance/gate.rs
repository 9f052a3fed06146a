//! Edge availability gate
//!
//! Keyed cache whose readers may wait, up to a timeout, for an entry that
//! has not been published yet. Covers the startup window where simulation
//! events reference an edge before the controller's directory push arrives.
//!
//! Waiters for one id are released together, in registration order, when
//! the id is published. A waiter whose timeout elapses fails with
//! `EdgeError::EdgeTimeout`; other waiters are unaffected. At the exact
//! deadline the entry wins if it was published before the timer is polled.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::dispatch::lock;
use crate::errors::{EdgeError, Result};

/// Default grace period for a missing edge
pub const EDGE_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct GateState<T> {
    entries: HashMap<String, T>,
    waiters: HashMap<String, Vec<oneshot::Sender<T>>>,
}

#[derive(Debug)]
pub struct AvailabilityGate<T> {
    timeout: Duration,
    state: Mutex<GateState<T>>,
}

impl<T: Clone> AvailabilityGate<T> {
    pub fn new(timeout: Duration) -> Self {
        AvailabilityGate {
            timeout,
            state: Mutex::new(GateState {
                entries: HashMap::new(),
                waiters: HashMap::new(),
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn get_cached(&self, id: &str) -> Option<T> {
        lock(&self.state).entries.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.state).entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn values(&self) -> Vec<T> {
        lock(&self.state).entries.values().cloned().collect()
    }

    /// Number of callers currently waiting for `id`
    pub fn waiting(&self, id: &str) -> usize {
        lock(&self.state)
            .waiters
            .get(id)
            .map(|w| w.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Store an entry and release everyone waiting for it
    ///
    /// Returns the number of waiters released.
    pub fn publish(&self, id: &str, value: T) -> usize {
        let waiters = {
            let mut state = lock(&self.state);
            state.entries.insert(id.to_string(), value.clone());
            state.waiters.remove(id).unwrap_or_default()
        };

        let mut released = 0;
        for tx in waiters {
            if tx.send(value.clone()).is_ok() {
                released += 1;
            }
        }
        released
    }

    /// Return the entry, waiting up to the timeout for it to be published
    pub async fn get(&self, id: &str) -> Result<T> {
        let rx = {
            let mut state = lock(&self.state);
            if let Some(value) = state.entries.get(id) {
                return Ok(value.clone());
            }
            // Callers that gave up early leave closed senders behind
            state.waiters.retain(|_, waiters| {
                waiters.retain(|tx| !tx.is_closed());
                !waiters.is_empty()
            });
            let (tx, rx) = oneshot::channel();
            state.waiters.entry(id.to_string()).or_default().push(tx);
            rx
        };

        tracing::debug!(edge_id = id, "Edge not cached yet, waiting");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(EdgeError::EdgeTimeout(id.to_string())),
            Err(_) => {
                self.prune(id);
                tracing::warn!(edge_id = id, timeout_ms = self.timeout.as_millis() as u64, "Timeout waiting for edge");
                Err(EdgeError::EdgeTimeout(id.to_string()))
            }
        }
    }

    fn prune(&self, id: &str) {
        let mut state = lock(&self.state);
        if let Some(waiters) = state.waiters.get_mut(id) {
            waiters.retain(|tx| !tx.is_closed());
            if waiters.is_empty() {
                state.waiters.remove(id);
            }
        }
    }
}
