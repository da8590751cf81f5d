use thiserror::Error;

/// Errors produced while resolving or invoking a tool.
///
/// None of these escape the dispatch boundary of the planner loop: they are
/// converted into [`crate::tool::ActionResult::Error`] and recorded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Cannot execute command '{0}': unknown command.")]
    UnknownTool(String),

    #[error("tool name or alias '{0}' is already registered")]
    DuplicateTool(String),

    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("tool '{tool}' is disabled: {reason}")]
    Disabled { tool: String, reason: String },

    #[error("tool '{tool}' timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    #[error("{message}")]
    ToolExecution {
        message: String,
        hint: Option<String>,
    },
}

impl ToolError {
    pub fn execution(message: impl Into<String>) -> Self {
        Self::ToolExecution {
            message: message.into(),
            hint: None,
        }
    }

    pub fn invalid_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Attach a machine-actionable hint. Only execution errors carry one.
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        match self {
            Self::ToolExecution { message, .. } => Self::ToolExecution {
                message,
                hint: Some(hint.into()),
            },
            other => other,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::ToolExecution { hint, .. } => hint.as_deref(),
            Self::UnknownTool(_) => Some("Use one of the commands listed in the tool catalog."),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        Self::execution(format!("{err:#}"))
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        Self::execution(err.to_string())
    }
}
