//! Typed tool catalog and invocation contract.

pub mod registry;
pub mod result;
pub mod success;
pub mod types;

pub use registry::{ToolRegistry, HUMAN_FEEDBACK_COMMAND};
pub use result::{ActionResult, ContextItem};
pub use success::{SuccessCheck, SuccessCheckContext, SuccessVerdict, SummarizeOutput};
pub use types::{
    AsyncHandler, Handler, ParamType, SyncHandler, Tool, ToolArgs, ToolBuilder, ToolContext,
    ToolParameter, ToolResult, ToolReturn,
};
