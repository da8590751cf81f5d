pub mod plan;
pub mod runtime;
pub mod tool;

pub use plan::PlanError;
pub use runtime::{LoopError, StoreError, StrategyError};
pub use tool::ToolError;
