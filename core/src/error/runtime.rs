use std::path::PathBuf;

use thiserror::Error;

use super::PlanError;
use crate::engine::LoopState;

/// Failure reported by a strategy (model call) collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("no response left for strategy '{0}'")]
    Exhausted(String),

    #[error("strategy '{strategy}' failed: {message}")]
    Execution { strategy: String, message: String },
}

/// Persistence failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("plan not found: {0}")]
    NotFound(String),

    #[error("invalid plan id '{0}': must be a plain file name")]
    InvalidPlanId(String),

    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt plan file {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to serialize plan: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that stop the planner loop.
#[derive(Error, Debug)]
pub enum LoopError {
    #[error("loop already running for agent {0}")]
    AlreadyRunning(String),

    #[error("invalid loop state transition from {from:?} to {to:?}")]
    InvalidState { from: LoopState, to: LoopState },

    #[error("invalid agent response: {0}")]
    InvalidAgentResponse(String),

    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("human input failed: {0}")]
    HumanInput(String),
}
