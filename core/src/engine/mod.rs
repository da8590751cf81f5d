//! Cooperative control loop driving a plan to completion.

mod events;
mod history;
mod parse;
mod run;
mod state;
mod types;

pub use events::LoopEvent;
pub use history::{Message, MessageHistory, MessageKind, Role};
pub use parse::{parse_select_tool_response, SelectedCommand};
pub use run::PlannerLoop;
pub use state::{LoopHandle, LoopState};
pub use types::{Collaborators, LoopConfig, LoopExit, LoopSummary};
