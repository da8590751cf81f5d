//! Task status transition rules.

use super::types::TaskStatus;
use thiserror::Error;

/// Task status transition error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("cannot transition from terminal state {state:?}")]
    FromTerminalState { state: TaskStatus },
}

/// Task status transition
pub struct StatusTransition;

impl StatusTransition {
    /// Validate a status transition.
    pub fn validate(from: TaskStatus, to: TaskStatus) -> Result<(), TransitionError> {
        // Done is final; Failed may only be retried.
        if from == TaskStatus::Done {
            return Err(TransitionError::FromTerminalState { state: from });
        }

        let is_valid = match (from, to) {
            // Predecessors completed
            (TaskStatus::Backlog, TaskStatus::Ready) => true,

            // Re-blocked by a new unfinished predecessor
            (TaskStatus::Ready, TaskStatus::Backlog) => true,

            // Dequeued by the loop
            (TaskStatus::Ready, TaskStatus::InProgress) => true,

            // Tool outcome
            (TaskStatus::InProgress, TaskStatus::Done) => true,
            (TaskStatus::InProgress, TaskStatus::Failed) => true,

            // Retry
            (TaskStatus::Failed, TaskStatus::Ready) => true,

            _ => false,
        };

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    /// Whether the status ends the task's lifecycle (unless retried).
    pub fn is_terminal(status: TaskStatus) -> bool {
        matches!(status, TaskStatus::Done | TaskStatus::Failed)
    }

    /// Whether the task has not been started yet.
    pub fn is_pending(status: TaskStatus) -> bool {
        matches!(status, TaskStatus::Backlog | TaskStatus::Ready)
    }

    pub fn description(status: TaskStatus) -> &'static str {
        match status {
            TaskStatus::Backlog => "waiting on predecessors",
            TaskStatus::Ready => "ready",
            TaskStatus::InProgress => "in progress",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }
}
