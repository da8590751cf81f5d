//! Loop lifecycle and the control handle shared with other tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::error::LoopError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Stopped,
    Running,
    Paused,
}

impl LoopState {
    pub fn can_transition_to(self, to: LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, to),
            (Stopped, Running) | (Running, Paused) | (Paused, Running) | (Running, Stopped) | (Paused, Stopped)
        )
    }
}

/// Clonable control surface of a [`super::PlannerLoop`].
///
/// Pause and stop are observed at the next cycle boundary. A tool call that
/// is already running is awaited.
#[derive(Clone, Debug)]
pub struct LoopHandle {
    state_tx: Arc<watch::Sender<LoopState>>,
    running: Arc<AtomicBool>,
}

impl Default for LoopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopHandle {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(LoopState::Stopped);
        Self {
            state_tx: Arc::new(state_tx),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> LoopState {
        *self.state_tx.borrow()
    }

    /// True while a loop body holds this handle.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state_tx.subscribe()
    }

    pub fn start(&self) -> Result<(), LoopError> {
        self.transition(LoopState::Running, |from| from == LoopState::Stopped)
    }

    pub fn pause(&self) -> Result<(), LoopError> {
        self.transition(LoopState::Paused, |from| from == LoopState::Running)
    }

    pub fn resume(&self) -> Result<(), LoopError> {
        self.transition(LoopState::Running, |from| from == LoopState::Paused)
    }

    /// Request a stop. Stopping a stopped loop is a no-op.
    pub fn stop(&self) -> Result<(), LoopError> {
        if self.state() == LoopState::Stopped {
            return Ok(());
        }
        self.transition(LoopState::Stopped, |from| from.can_transition_to(LoopState::Stopped))
    }

    fn transition<F>(&self, to: LoopState, allowed: F) -> Result<(), LoopError>
    where
        F: Fn(LoopState) -> bool,
    {
        let mut result = Ok(());
        self.state_tx.send_if_modified(|state| {
            if allowed(*state) {
                *state = to;
                true
            } else {
                result = Err(LoopError::InvalidState { from: *state, to });
                false
            }
        });
        result
    }

    /// Claim the handle for one loop body. Released when the guard drops.
    pub(crate) fn acquire(&self) -> Option<RunGuard> {
        if self.running.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(RunGuard {
            handle: self.clone(),
        })
    }
}

pub(crate) struct RunGuard {
    handle: LoopHandle,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.handle.state_tx.send_if_modified(|state| {
            let changed = *state != LoopState::Stopped;
            *state = LoopState::Stopped;
            changed
        });
        self.handle.running.store(false, Ordering::SeqCst);
    }
}
