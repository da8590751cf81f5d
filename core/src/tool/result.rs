use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;
use crate::task::Task;

/// Side-channel artifact returned with a successful tool call (a retrieved
/// document, a file excerpt). The loop adds it to its context set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub description: String,
    #[serde(default)]
    pub source: Option<String>,
    pub content: String,
}

impl ContextItem {
    pub fn new(description: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            source: None,
            content: content.into(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Outcome of dispatching one command.
#[derive(Debug, Clone)]
pub enum ActionResult {
    Success {
        outputs: Value,
        context_item: Option<ContextItem>,
        /// Tasks authored by the tool, added to the plan by the loop.
        planned_tasks: Vec<Task>,
    },
    Error {
        reason: String,
        error: ToolError,
    },
    /// The command asked to defer to a human; `input` is the prompt to show.
    HumanInterrupt {
        input: String,
    },
}

impl ActionResult {
    pub fn error(error: ToolError) -> Self {
        Self::Error {
            reason: error.to_string(),
            error,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Error { .. } => "error",
            Self::HumanInterrupt { .. } => "interrupted_by_human",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The system message recorded in the agent's history for this result.
    pub fn history_message(&self, command_name: &str) -> String {
        match self {
            Self::Success { outputs, .. } => {
                format!("Tool {command_name} returned: {}", render_output(outputs))
            }
            Self::Error { reason, error } => {
                let mut message = format!("Tool {command_name} failed: {reason}");
                if let Some(hint) = error.hint() {
                    message = format!("{}. {hint}", message.trim_end_matches('.'));
                }
                message
            }
            Self::HumanInterrupt { input } => {
                format!("Tool {command_name} requested human feedback: {input}")
            }
        }
    }
}

fn render_output(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
