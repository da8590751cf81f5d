//! Task nodes, their status state machine and id stacks.
//!
//! Tasks never hold references to each other or to the plan. Relationships
//! are expressed as task ids and resolved through [`crate::plan::Plan`].

pub mod stack;
pub mod transitions;
pub mod types;

pub use stack::TaskStack;
pub use transitions::{StatusTransition, TransitionError};
pub use types::{Task, TaskStatus};
