//! Coalescing rate limiter
//!
//! Runs a flush action at most once per interval. `activate()` arms one
//! run at the next permitted slot; activations while a run is armed are
//! absorbed by it. An armed run cannot be cancelled.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use super::lock;
use crate::errors::Result;

/// Longest interval a limiter will wait between runs
pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

pub type FlushFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
pub type FlushAction = Arc<dyn Fn() -> FlushFuture + Send + Sync>;

#[derive(Debug, Default)]
struct LimiterState {
    scheduled: bool,
    last_run: Option<Instant>,
    runs: u64,
}

/// Per-edge, per-direction limiter
#[derive(Clone)]
pub struct RateLimiter {
    label: Arc<str>,
    interval: Duration,
    state: Arc<Mutex<LimiterState>>,
    action: FlushAction,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("label", &self.label)
            .field("interval", &self.interval)
            .field("state", &self.state)
            .field("action", &"<FlushAction>")
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter allowing `max_per_second` runs per second
    ///
    /// Non-positive rates are clamped to one run per second, and rates so
    /// low that the interval exceeds `MAX_INTERVAL` are clamped to it.
    pub fn new(label: &str, max_per_second: f64, action: FlushAction) -> Self {
        let interval = if max_per_second > 0.0 {
            match Duration::try_from_secs_f64(1.0 / max_per_second) {
                Ok(interval) if interval <= MAX_INTERVAL => interval,
                _ => MAX_INTERVAL,
            }
        } else {
            Duration::from_secs(1)
        };

        RateLimiter {
            label: Arc::from(label),
            interval,
            state: Arc::new(Mutex::new(LimiterState::default())),
            action,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_scheduled(&self) -> bool {
        lock(&self.state).scheduled
    }

    /// Number of times the action has started
    pub fn run_count(&self) -> u64 {
        lock(&self.state).runs
    }

    /// Arm a run unless one is already armed
    ///
    /// Must be called from within a tokio runtime.
    pub fn activate(&self) {
        let delay = {
            let mut state = lock(&self.state);
            if state.scheduled {
                return;
            }
            state.scheduled = true;
            match state.last_run {
                Some(last) => (last + self.interval).saturating_duration_since(Instant::now()),
                None => Duration::ZERO,
            }
        };

        let state = self.state.clone();
        let action = self.action.clone();
        let label = self.label.clone();

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            {
                let mut state = lock(&state);
                state.scheduled = false;
                state.last_run = Some(Instant::now());
                state.runs += 1;
            }

            if let Err(e) = action().await {
                tracing::warn!(limiter = %label, error = %e, "Flush failed, drained transfers were dropped");
            }
        });
    }
}
