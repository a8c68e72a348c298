//! Per-instance confirmation signals.
//!
//! The interceptor and the host raise these from outside the generation task;
//! the scheduler suspends on them after every placement.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Flags carried by [`InstanceSignals`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalState {
    /// The last placement has been confirmed by the network authority.
    pub spawn_confirmed: bool,
    /// The host finished generating the dungeon.
    pub dungeon_generated: bool,
}

/// Why a wait on [`InstanceSignals`] ended without its condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The deadline passed.
    TimedOut,
    /// Every sender was dropped.
    Closed,
}

/// Shared handle to one instance's signal channel. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct InstanceSignals {
    tx: Arc<watch::Sender<SignalState>>,
}

impl InstanceSignals {
    /// Fresh signals with every flag cleared.
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(SignalState::default())),
        }
    }

    /// Report that the last placement was confirmed.
    pub fn confirm_spawn(&self) {
        self.tx.send_modify(|state| state.spawn_confirmed = true);
    }

    /// Consume a confirmation so the next placement waits for its own.
    pub fn clear_spawn(&self) {
        self.tx.send_if_modified(|state| {
            let was = state.spawn_confirmed;
            state.spawn_confirmed = false;
            was
        });
    }

    /// Report that the dungeon has been generated.
    pub fn mark_dungeon_generated(&self) {
        self.tx.send_modify(|state| state.dungeon_generated = true);
    }

    /// Clear every flag at the start of a run.
    pub fn reset(&self) {
        self.tx.send_replace(SignalState::default());
    }

    /// Current flags.
    pub fn snapshot(&self) -> SignalState {
        *self.tx.borrow()
    }

    /// Suspend until `condition` holds. `None` waits without a deadline.
    pub async fn wait_for<F>(
        &self,
        timeout: Option<Duration>,
        condition: F,
    ) -> Result<SignalState, WaitError>
    where
        F: FnMut(&SignalState) -> bool,
    {
        let mut rx = self.tx.subscribe();
        let wait = rx.wait_for(condition);
        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| WaitError::TimedOut)?,
            None => wait.await,
        };
        result.map(|state| *state).map_err(|_| WaitError::Closed)
    }
}

impl Default for InstanceSignals {
    fn default() -> Self {
        Self::new()
    }
}
