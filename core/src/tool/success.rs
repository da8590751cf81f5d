//! Post-processing that decides whether a tool output completes its task.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::StrategyError;
use crate::memory::MemoryStore;
use crate::strategy::{StrategyContext, StrategyExecutor, TASK_DEFAULT_SUMMARY};
use crate::task::Task;

/// Inputs of a success check.
pub struct SuccessCheckContext<'a> {
    pub agent_id: &'a str,
    pub task: &'a Task,
    pub command_name: &'a str,
    pub outputs: &'a Value,
    pub strategy: &'a Arc<dyn StrategyExecutor>,
    pub memory: Option<&'a Arc<dyn MemoryStore>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuccessVerdict {
    pub passed: bool,
    pub text_output: Option<String>,
    pub text_output_as_uml: Option<String>,
}

impl SuccessVerdict {
    pub fn passed() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    pub fn rejected() -> Self {
        Self::default()
    }
}

/// An `Err` from [`SuccessCheck::check`] counts as a failed check.
#[async_trait]
pub trait SuccessCheck: Send + Sync {
    async fn check(&self, ctx: SuccessCheckContext<'_>) -> Result<SuccessVerdict, StrategyError>;
}

/// Default check: summarize the output through the model and remember the
/// summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct SummarizeOutput;

#[async_trait]
impl SuccessCheck for SummarizeOutput {
    async fn check(&self, ctx: SuccessCheckContext<'_>) -> Result<SuccessVerdict, StrategyError> {
        let mut strategy_ctx = StrategyContext::new();
        strategy_ctx.insert("agent_id".into(), json!(ctx.agent_id));
        strategy_ctx.insert("task".into(), serde_json::to_value(ctx.task).unwrap_or(Value::Null));
        strategy_ctx.insert("command_name".into(), json!(ctx.command_name));
        strategy_ctx.insert("outputs".into(), ctx.outputs.clone());

        let response = ctx.strategy.execute(TASK_DEFAULT_SUMMARY, strategy_ctx).await?;
        let args = response
            .get("command_args")
            .and_then(Value::as_object)
            .ok_or_else(|| StrategyError::Execution {
                strategy: TASK_DEFAULT_SUMMARY.to_string(),
                message: "response has no command_args object".to_string(),
            })?;

        let text_output = args
            .get("text_output")
            .and_then(Value::as_str)
            .map(str::to_string);
        let text_output_as_uml = args
            .get("text_output_as_uml")
            .and_then(Value::as_str)
            .map(str::to_string);

        if let (Some(memory), Some(text)) = (ctx.memory, text_output.as_ref()) {
            let mut metadata = Map::new();
            metadata.insert("agent_id".into(), json!(ctx.agent_id));
            metadata.insert("task_id".into(), json!(ctx.task.task_id));
            metadata.insert("command".into(), json!(ctx.command_name));
            match memory.add_texts(vec![text.clone()], vec![metadata]).await {
                Ok(ids) => debug!(task_id = %ctx.task.task_id, ids = ?ids, "summary stored in memory"),
                Err(e) => warn!(
                    task_id = %ctx.task.task_id,
                    memory = memory.name(),
                    "failed to store summary in memory: {e:#}"
                ),
            }
        }

        Ok(SuccessVerdict {
            passed: true,
            text_output,
            text_output_as_uml,
        })
    }
}
