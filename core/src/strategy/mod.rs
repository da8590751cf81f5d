//! Model-call collaborator. The loop only knows strategy names and JSON.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StrategyError;

/// Picks the next command for the current task.
pub const SELECT_TOOL: &str = "select_tool";
/// Decomposes the goal into an initial task list.
pub const MAKE_INITIAL_PLAN: &str = "make_initial_plan";
/// Summarizes a tool output for the task record.
pub const TASK_DEFAULT_SUMMARY: &str = "task_default_summary";

/// Named inputs handed to a strategy.
pub type StrategyContext = Map<String, Value>;

#[async_trait]
pub trait StrategyExecutor: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(
        &self,
        strategy_name: &str,
        context: StrategyContext,
    ) -> Result<Value, StrategyError>;
}

/// Executor used when no model backend is configured. Every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStrategy;

#[async_trait]
impl StrategyExecutor for UnavailableStrategy {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn execute(
        &self,
        strategy_name: &str,
        _context: StrategyContext,
    ) -> Result<Value, StrategyError> {
        Err(StrategyError::UnknownStrategy(strategy_name.to_string()))
    }
}
