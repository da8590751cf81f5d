use std::sync::Arc;

use serde::Serialize;

use crate::human::HumanIo;
use crate::memory::MemoryStore;
use crate::store::PlanStore;
use crate::strategy::StrategyExecutor;

/// Limits and inputs of one loop run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Goal handed to the bootstrap task.
    pub goal: Option<String>,
    pub max_cycles: u32,
    /// Cycles a single task may take before it is failed. 0 = unlimited.
    pub max_task_cycles: u32,
    /// Times a failed task goes back to `Ready`.
    pub max_task_retries: u32,
    /// Messages of history passed to `select_tool`.
    pub history_window: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            goal: None,
            max_cycles: 50,
            max_task_cycles: 5,
            max_task_retries: 0,
            history_window: 20,
        }
    }
}

/// External services the loop calls into.
#[derive(Clone)]
pub struct Collaborators {
    pub strategy: Arc<dyn StrategyExecutor>,
    pub store: Arc<dyn PlanStore>,
    pub memory: Option<Arc<dyn MemoryStore>>,
    pub human: Arc<dyn HumanIo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopExit {
    /// A stop was requested through the handle.
    Stopped,
    MaxCycles,
    /// No task is ready or in progress.
    PlanExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    pub cycles: u32,
    pub done: usize,
    pub failed: usize,
    pub exit: LoopExit,
}
