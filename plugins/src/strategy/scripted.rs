//! Replays recorded model responses, one queue per strategy name.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use planloop_core::error::StrategyError;
use planloop_core::strategy::{StrategyContext, StrategyExecutor};
use serde_json::Value;
use tracing::debug;

/// Script file layout:
///
/// ```json
/// { "select_tool": [ ["read_file", {"filename": "a.txt"}, "look first"] ],
///   "make_initial_plan": [ {"task_list": [...]} ] }
/// ```
pub struct ScriptedStrategyExecutor {
    queues: Mutex<HashMap<String, VecDeque<Value>>>,
}

impl ScriptedStrategyExecutor {
    pub fn new(script: HashMap<String, Vec<Value>>) -> Self {
        Self {
            queues: Mutex::new(
                script
                    .into_iter()
                    .map(|(name, responses)| (name, responses.into()))
                    .collect(),
            ),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let script: HashMap<String, Vec<Value>> =
            serde_json::from_str(json).context("Failed to parse strategy script")?;
        Ok(Self::new(script))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read strategy script {:?}", path.as_ref()))?;
        Self::from_json(&json)
    }

    /// Responses left for `strategy`.
    pub fn remaining(&self, strategy: &str) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(strategy)
            .map(VecDeque::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl StrategyExecutor for ScriptedStrategyExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(
        &self,
        strategy_name: &str,
        _context: StrategyContext,
    ) -> Result<Value, StrategyError> {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        let queue = queues
            .get_mut(strategy_name)
            .ok_or_else(|| StrategyError::UnknownStrategy(strategy_name.to_string()))?;
        let response = queue
            .pop_front()
            .ok_or_else(|| StrategyError::Exhausted(strategy_name.to_string()))?;
        debug!(strategy = strategy_name, left = queue.len(), "scripted response");
        Ok(response)
    }
}
