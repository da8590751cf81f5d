use thiserror::Error;

use crate::task::TransitionError;

/// Graph consistency errors raised by [`crate::plan::Plan`].
///
/// These are invariant violations, not operational failures: the planner loop
/// lets them propagate and terminates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("duplicate task id: {0}")]
    DuplicateTaskId(String),

    #[error("dependency not found: task '{task_id}' depends on '{missing_dep}'")]
    DependencyNotFound {
        task_id: String,
        missing_dep: String,
    },

    #[error("circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("task '{task_id}': {source}")]
    Transition {
        task_id: String,
        #[source]
        source: TransitionError,
    },
}
