use serde_json::{Map, Value};

use crate::error::LoopError;
use crate::tool::ToolArgs;

/// A command chosen by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedCommand {
    pub command_name: String,
    pub command_args: ToolArgs,
    pub thoughts: Option<String>,
}

/// Read a `select_tool` response.
///
/// Accepts `[name, args, thoughts]`, an object with `command_name`,
/// `command_args` and `assistant_reply` (or `thoughts`), or either form
/// encoded as a JSON string.
pub fn parse_select_tool_response(value: &Value) -> Result<SelectedCommand, LoopError> {
    match value {
        Value::String(text) => {
            let inner: Value = serde_json::from_str(text.trim()).map_err(|e| {
                LoopError::InvalidAgentResponse(format!("response is not JSON: {e}"))
            })?;
            if inner.is_string() {
                return Err(invalid("response is a bare string"));
            }
            parse_select_tool_response(&inner)
        }
        Value::Array(items) => {
            let name = items
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("first element must be the command name"))?;
            let args = parse_args(items.get(1))?;
            let thoughts = items.get(2).and_then(render_thoughts);
            selected(name, args, thoughts)
        }
        Value::Object(map) => {
            let name = map
                .get("command_name")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("missing command_name"))?;
            let args = parse_args(map.get("command_args"))?;
            let thoughts = map
                .get("assistant_reply")
                .or_else(|| map.get("thoughts"))
                .and_then(render_thoughts);
            selected(name, args, thoughts)
        }
        other => Err(invalid(&format!("unexpected response: {other}"))),
    }
}

fn selected(name: &str, command_args: ToolArgs, thoughts: Option<String>) -> Result<SelectedCommand, LoopError> {
    let command_name = name.trim();
    if command_name.is_empty() {
        return Err(invalid("command name is empty"));
    }
    Ok(SelectedCommand {
        command_name: command_name.to_string(),
        command_args,
        thoughts,
    })
}

fn parse_args(value: Option<&Value>) -> Result<ToolArgs, LoopError> {
    match value {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(invalid(&format!("command_args must be an object, got {other}"))),
    }
}

fn render_thoughts(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn invalid(reason: &str) -> LoopError {
    LoopError::InvalidAgentResponse(reason.to_string())
}
