#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use planloop_core::engine::{Collaborators, LoopConfig, PlannerLoop};
use planloop_core::error::StrategyError;
use planloop_core::human::HumanIo;
use planloop_core::plan::Plan;
use planloop_core::store::InMemoryPlanStore;
use planloop_core::strategy::{StrategyContext, StrategyExecutor};
use planloop_core::task::Task;
use planloop_core::tool::{Handler, ParamType, Tool, ToolParameter, ToolRegistry, ToolReturn};

/// Replays queued responses per strategy name and records every call.
#[derive(Default)]
pub struct QueueStrategy {
    queues: Mutex<HashMap<String, VecDeque<Value>>>,
    pub calls: Mutex<Vec<(String, StrategyContext)>>,
}

impl QueueStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(self, strategy: &str, response: Value) -> Self {
        self.queues
            .lock()
            .unwrap()
            .entry(strategy.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn call_count(&self, strategy: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == strategy)
            .count()
    }
}

#[async_trait]
impl StrategyExecutor for QueueStrategy {
    fn name(&self) -> &str {
        "queue"
    }

    async fn execute(&self, name: &str, ctx: StrategyContext) -> Result<Value, StrategyError> {
        self.calls.lock().unwrap().push((name.to_string(), ctx));
        self.queues
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| StrategyError::Exhausted(name.to_string()))
    }
}

/// Answers prompts from a fixed list.
#[derive(Default)]
pub struct CannedHuman {
    answers: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<String>>,
    pub messages: Mutex<Vec<String>>,
}

impl CannedHuman {
    pub fn answering<I: IntoIterator<Item = &'static str>>(answers: I) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().map(String::from).collect()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl HumanIo for CannedHuman {
    async fn input(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no answer left"))
    }

    fn message(&self, msg: &str) {
        self.messages.lock().unwrap().push(msg.to_string());
    }
}

pub struct Harness {
    pub strategy: Arc<QueueStrategy>,
    pub human: Arc<CannedHuman>,
    pub store: Arc<InMemoryPlanStore>,
}

impl Harness {
    pub fn new(strategy: QueueStrategy, human: CannedHuman) -> Self {
        Self {
            strategy: Arc::new(strategy),
            human: Arc::new(human),
            store: Arc::new(InMemoryPlanStore::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            strategy: self.strategy.clone(),
            store: self.store.clone(),
            memory: None,
            human: self.human.clone(),
        }
    }

    pub fn planner(&self, plan: Plan, registry: ToolRegistry, config: LoopConfig) -> PlannerLoop {
        PlannerLoop::new("agent-1", plan, Arc::new(registry), self.collaborators(), config)
    }
}

pub fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub fn echo_tool() -> Tool {
    Tool::builder("echo", "Echo text back.")
        .parameter(ToolParameter::required("text", ParamType::String, "text to echo"))
        .handler(Handler::sync(|args, _| {
            Ok(ToolReturn::new(args.get("text").cloned().unwrap_or_default()))
        }))
}

/// A task bound to `echo` with the given text.
pub fn echo_task(id: &str, text: &str) -> Task {
    Task::new(id)
        .with_id(id)
        .with_command("echo")
        .with_arguments(args(json!({ "text": text })))
}

pub fn registry_with(tools: Vec<Tool>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool).unwrap();
    }
    registry
}
