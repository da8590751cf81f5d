//! Task graph, tool registry and planner loop for autonomous agents.

pub mod config;
pub mod engine;
pub mod error;
pub mod human;
pub mod memory;
pub mod plan;
pub mod store;
pub mod strategy;
pub mod task;
pub mod tool;

pub use engine::{Collaborators, LoopConfig, LoopHandle, LoopState, LoopSummary, PlannerLoop};
pub use error::{LoopError, PlanError, StoreError, StrategyError, ToolError};
pub use plan::Plan;
pub use task::{Task, TaskStack, TaskStatus};
pub use tool::{ActionResult, Tool, ToolRegistry};
