use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::result::ActionResult;
use super::types::{Tool, ToolArgs, ToolContext, ToolResult};
use crate::error::ToolError;

/// Reserved command: the model defers to a human instead of calling a tool.
pub const HUMAN_FEEDBACK_COMMAND: &str = "human_feedback";

/// Name- and alias-indexed tool catalog.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<Tool>>,
    index: HashMap<String, usize>,
    timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every async tool call. Sync handlers run to completion.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn register(&mut self, tool: Tool) -> Result<(), ToolError> {
        // Collisions inside the tool's own names count too.
        let mut seen = Vec::new();
        for name in tool.names() {
            if self.index.contains_key(name) || seen.contains(&name) {
                return Err(ToolError::DuplicateTool(name.to_string()));
            }
            seen.push(name);
        }

        let slot = self.tools.len();
        for name in tool.names() {
            self.index.insert(name.to_string(), slot);
        }
        debug!(tool = %tool.name, aliases = ?tool.aliases, "tool registered");
        self.tools.push(Arc::new(tool));
        Ok(())
    }

    pub fn get_tool(&self, name: &str) -> Result<&Arc<Tool>, ToolError> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Canonical names in registration order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Catalog lines for the model, hidden tools excluded.
    pub fn list_tools_descriptions(&self) -> Vec<String> {
        self.tools
            .iter()
            .filter(|t| !t.hide)
            .map(|t| t.to_string())
            .collect()
    }

    /// Validate arguments and run the tool.
    pub async fn invoke(&self, name: &str, args: ToolArgs, ctx: ToolContext) -> ToolResult {
        let tool = Arc::clone(self.get_tool(name)?);

        if !tool.is_enabled(&ctx) {
            return Err(ToolError::Disabled {
                tool: tool.name.clone(),
                reason: tool
                    .disabled_reason
                    .clone()
                    .unwrap_or_else(|| "not available in this context".to_string()),
            });
        }
        tool.validate_arguments(&args)?;

        match self.timeout {
            Some(limit) if tool.is_async() => {
                match tokio::time::timeout(limit, tool.call(args, ctx)).await {
                    Ok(result) => result,
                    Err(_) => Err(ToolError::Timeout {
                        tool: tool.name.clone(),
                        timeout_ms: limit.as_millis() as u64,
                    }),
                }
            }
            _ => tool.call(args, ctx).await,
        }
    }

    /// Run a command and fold every outcome into an [`ActionResult`].
    pub async fn dispatch(&self, command_name: &str, args: ToolArgs, ctx: ToolContext) -> ActionResult {
        let human_feedback = command_name == HUMAN_FEEDBACK_COMMAND
            || self
                .get_tool(command_name)
                .map(|t| t.name == HUMAN_FEEDBACK_COMMAND)
                .unwrap_or(false);
        if human_feedback {
            let input = match args.get("question") {
                Some(Value::String(q)) => q.clone(),
                Some(other) => other.to_string(),
                None => "The agent is asking for feedback.".to_string(),
            };
            return ActionResult::HumanInterrupt { input };
        }

        match self.invoke(command_name, args, ctx).await {
            Ok(ret) => ActionResult::Success {
                outputs: ret.output,
                context_item: ret.context_item,
                planned_tasks: ret.planned_tasks,
            },
            Err(err) => {
                warn!(command = command_name, error = %err, "tool call failed");
                ActionResult::error(err)
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .field("timeout", &self.timeout)
            .finish()
    }
}
