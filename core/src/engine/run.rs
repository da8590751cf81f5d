//! The planner loop: pick a task, choose a command, dispatch it, record the
//! outcome, persist, repeat.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::events::{EventBus, LoopEvent};
use super::history::{MessageHistory, MessageKind};
use super::parse::{parse_select_tool_response, SelectedCommand};
use super::state::{LoopHandle, LoopState};
use super::types::{Collaborators, LoopConfig, LoopExit, LoopSummary};
use crate::error::{LoopError, ToolError};
use crate::plan::Plan;
use crate::strategy::{StrategyContext, MAKE_INITIAL_PLAN, SELECT_TOOL};
use crate::task::{Task, TaskStatus};
use crate::tool::{
    ActionResult, ContextItem, SuccessCheckContext, SuccessVerdict, ToolContext, ToolRegistry,
};

pub struct PlannerLoop {
    agent_id: String,
    plan: Plan,
    registry: Arc<ToolRegistry>,
    collab: Collaborators,
    config: LoopConfig,
    handle: LoopHandle,
    events: EventBus,
    history: MessageHistory,
    context_items: Vec<ContextItem>,
    current_task_id: Option<String>,
}

impl PlannerLoop {
    pub fn new(
        agent_id: impl Into<String>,
        plan: Plan,
        registry: Arc<ToolRegistry>,
        collab: Collaborators,
        config: LoopConfig,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            plan,
            registry,
            collab,
            config,
            handle: LoopHandle::new(),
            events: EventBus::new(256),
            history: MessageHistory::new(),
            context_items: Vec::new(),
            current_task_id: None,
        }
    }

    /// Share a control handle with another owner.
    pub fn with_handle(mut self, handle: LoopHandle) -> Self {
        self.handle = handle;
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn into_plan(self) -> Plan {
        self.plan
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoopEvent> {
        self.events.subscribe()
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    pub fn context_items(&self) -> &[ContextItem] {
        &self.context_items
    }

    pub fn current_task_id(&self) -> Option<&str> {
        self.current_task_id.as_deref()
    }

    /// Seed an empty plan with the planning task and make it current.
    ///
    /// Returns the id of the new task, or `None` when the plan already has
    /// tasks.
    pub fn add_initial_tasks(&mut self) -> Result<Option<String>, LoopError> {
        if !self.plan.is_empty() {
            return Ok(None);
        }
        let goal = self.config.goal.clone().unwrap_or_default();
        let mut args = Map::new();
        args.insert("goal".into(), json!(goal));
        let task = Task::new(MAKE_INITIAL_PLAN)
            .with_description(format!("Make an initial plan for: {goal}"))
            .with_command(MAKE_INITIAL_PLAN)
            .with_arguments(args);
        let task_id = task.task_id.clone();

        self.plan.add_task(task)?;
        self.set_status(&task_id, TaskStatus::InProgress)?;
        self.current_task_id = Some(task_id.clone());
        info!(agent_id = %self.agent_id, task_id = %task_id, "bootstrap task added");
        Ok(Some(task_id))
    }

    pub async fn run(&mut self) -> Result<LoopSummary, LoopError> {
        let Some(_guard) = self.handle.acquire() else {
            return Err(LoopError::AlreadyRunning(self.agent_id.clone()));
        };
        if self.handle.state() != LoopState::Stopped {
            return Err(LoopError::AlreadyRunning(self.agent_id.clone()));
        }
        let mut control = self.handle.subscribe();
        self.handle.start()?;

        info!(
            agent_id = %self.agent_id,
            plan_id = self.plan.plan_id(),
            tasks = self.plan.len(),
            max_cycles = self.config.max_cycles,
            "planner loop started"
        );

        let mut cycles = 0u32;
        let result = loop {
            if !wait_while_paused(&mut control).await {
                break Ok(LoopExit::Stopped);
            }
            if cycles >= self.config.max_cycles {
                break Ok(LoopExit::MaxCycles);
            }
            let task_id = match self.current_task() {
                Ok(Some(id)) => id,
                Ok(None) => break Ok(LoopExit::PlanExhausted),
                Err(e) => break Err(e),
            };

            cycles += 1;
            self.events.emit(LoopEvent::CycleStarted {
                cycle: cycles,
                task_id: task_id.clone(),
            });
            debug!(cycle = cycles, task_id = %task_id, "cycle started");

            if let Err(e) = self.run_cycle(&task_id).await {
                break Err(e);
            }
            if let Err(e) = self.persist() {
                break Err(e);
            }
            self.events.emit(LoopEvent::CycleFinished { cycle: cycles });
        };

        match result {
            Ok(exit) => {
                // Save whatever the last partial cycle changed.
                self.persist()?;
                let counts = self.plan.status_counts();
                info!(
                    agent_id = %self.agent_id,
                    cycles,
                    exit = ?exit,
                    done = counts.done,
                    failed = counts.failed,
                    "planner loop exited"
                );
                self.events.emit(LoopEvent::LoopExited { cycles, exit });
                Ok(LoopSummary {
                    cycles,
                    done: counts.done,
                    failed: counts.failed,
                    exit,
                })
            }
            Err(e) => {
                error!(agent_id = %self.agent_id, cycles, "planner loop failed: {e}");
                Err(e)
            }
        }
    }

    /// Keep working on the in-progress task, or dequeue the next ready one.
    fn current_task(&mut self) -> Result<Option<String>, LoopError> {
        if let Some(id) = &self.current_task_id {
            if self.plan.get_task(id)?.state == TaskStatus::InProgress {
                return Ok(Some(id.clone()));
            }
            self.current_task_id = None;
        }

        // In-progress work from a reloaded plan comes first.
        let next = match self.plan.get_active_tasks().first() {
            Some(task) => Some(task.task_id.clone()),
            None => self.plan.next_task().map(|t| t.task_id.clone()),
        };
        let Some(id) = next else {
            return Ok(None);
        };
        if self.plan.get_task(&id)?.state == TaskStatus::Ready {
            self.set_status(&id, TaskStatus::InProgress)?;
        }
        self.current_task_id = Some(id.clone());
        Ok(Some(id))
    }

    async fn run_cycle(&mut self, task_id: &str) -> Result<(), LoopError> {
        self.plan.update_task(task_id, |t| t.cycle_count += 1)?;
        let task = self.plan.get_task(task_id)?.clone();

        let limit = self.config.max_task_cycles;
        if limit > 0 && task.cycle_count > limit {
            let reason = format!("task did not finish within {limit} cycles");
            warn!(task_id, "{reason}");
            self.history
                .system(MessageKind::Note, format!("Task {} failed: {reason}", task.name));
            return self.fail_task(task_id, reason);
        }

        let selected = match self.resolve_command(&task).await {
            Ok(selected) => selected,
            Err(e @ (LoopError::InvalidAgentResponse(_) | LoopError::Strategy(_))) => {
                warn!(task_id, "no command selected: {e}");
                self.history
                    .system(MessageKind::Note, format!("Could not select a command: {e}"));
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if let Some(thoughts) = &selected.thoughts {
            self.history.assistant(thoughts.clone());
        }

        let ctx = ToolContext::new(
            self.agent_id.clone(),
            self.plan.plan_id(),
            task.clone(),
            Arc::clone(&self.collab.strategy),
        )
        .with_tool_catalog(self.registry.list_tools_descriptions());

        debug!(task_id, command = %selected.command_name, "dispatching");
        let result = self
            .registry
            .dispatch(&selected.command_name, selected.command_args, ctx)
            .await;
        let command = selected.command_name;
        self.events.emit(LoopEvent::ToolDispatched {
            task_id: task_id.to_string(),
            command: command.clone(),
            status: result.status().to_string(),
        });

        let message = result.history_message(&command);
        match result {
            ActionResult::Success {
                outputs,
                context_item,
                planned_tasks,
            } => {
                if let Err(e) = self.add_planned_tasks(&task, planned_tasks) {
                    let rejected = ActionResult::error(ToolError::execution(format!(
                        "planned tasks rejected: {e}"
                    )));
                    let message = rejected.history_message(&command);
                    return self.record_failure(task_id, message, rejected);
                }
                self.report(message);
                if let Some(item) = context_item {
                    self.context_items.push(item);
                }
                self.complete_task(&task, &command, &outputs).await
            }
            error @ ActionResult::Error { .. } => self.record_failure(task_id, message, error),
            ActionResult::HumanInterrupt { input } => {
                self.history.system(MessageKind::ActionResult, message);
                let answer = self
                    .collab
                    .human
                    .input(&input)
                    .await
                    .map_err(|e| LoopError::HumanInput(format!("{e:#}")))?;
                debug!(task_id, "human feedback received");
                self.history.user(answer);
                Ok(())
            }
        }
    }

    async fn resolve_command(&self, task: &Task) -> Result<SelectedCommand, LoopError> {
        if let Some(command) = &task.command {
            return Ok(SelectedCommand {
                command_name: command.clone(),
                command_args: task.arguments.clone().unwrap_or_default(),
                thoughts: None,
            });
        }

        let mut ctx = StrategyContext::new();
        ctx.insert("agent_id".into(), json!(self.agent_id));
        ctx.insert("goal".into(), json!(self.config.goal));
        ctx.insert("task".into(), serde_json::to_value(task).unwrap_or(Value::Null));
        ctx.insert("tools".into(), json!(self.registry.list_tools_descriptions()));
        ctx.insert(
            "history".into(),
            Value::Array(self.history.tail_json(self.config.history_window)),
        );
        let response = self.collab.strategy.execute(SELECT_TOOL, ctx).await?;
        parse_select_tool_response(&response)
    }

    /// The bootstrap task fills the root plan; any other task gets subtasks.
    fn add_planned_tasks(&mut self, task: &Task, planned: Vec<Task>) -> Result<(), LoopError> {
        if planned.is_empty() {
            return Ok(());
        }
        let count = planned.len();
        let bootstrap =
            task.task_parent_id.is_none() && task.command.as_deref() == Some(MAKE_INITIAL_PLAN);
        if bootstrap {
            self.plan.add_tasks(planned)?;
        } else {
            self.plan.add_subtasks(&task.task_id, planned)?;
        }
        info!(task_id = %task.task_id, count, root = bootstrap, "planned tasks added");
        Ok(())
    }

    async fn complete_task(&mut self, task: &Task, command: &str, outputs: &Value) -> Result<(), LoopError> {
        let check = self
            .registry
            .get_tool(command)
            .ok()
            .and_then(|tool| tool.success_check().cloned());

        let verdict = match check {
            None => SuccessVerdict {
                passed: true,
                text_output: Some(render_text(outputs)),
                text_output_as_uml: None,
            },
            Some(check) => {
                let ctx = SuccessCheckContext {
                    agent_id: &self.agent_id,
                    task,
                    command_name: command,
                    outputs,
                    strategy: &self.collab.strategy,
                    memory: self.collab.memory.as_ref(),
                };
                match check.check(ctx).await {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        warn!(task_id = %task.task_id, "success check failed: {e}");
                        SuccessVerdict::rejected()
                    }
                }
            }
        };

        if !verdict.passed {
            self.history.system(
                MessageKind::Note,
                format!("Output of {command} did not complete task {}", task.name),
            );
            return self.fail_task(&task.task_id, format!("output of {command} was rejected"));
        }

        self.plan.update_task(&task.task_id, |t| {
            if verdict.text_output.is_some() {
                t.task_text_output = verdict.text_output;
            }
            if verdict.text_output_as_uml.is_some() {
                t.task_text_output_as_uml = verdict.text_output_as_uml;
            }
        })?;
        self.set_status(&task.task_id, TaskStatus::Done)?;
        self.current_task_id = None;
        info!(task_id = %task.task_id, name = %task.name, "task done");
        Ok(())
    }

    /// Record a tool result in history and show it to the human.
    fn report(&mut self, message: String) {
        self.collab.human.message(&message);
        self.history.system(MessageKind::ActionResult, message);
    }

    fn record_failure(&mut self, task_id: &str, message: String, result: ActionResult) -> Result<(), LoopError> {
        self.report(message);
        let reason = match result {
            ActionResult::Error { reason, .. } => reason,
            other => other.status().to_string(),
        };
        self.fail_task(task_id, reason)
    }

    /// Mark a task failed, then put it back in the queue if retries remain.
    fn fail_task(&mut self, task_id: &str, reason: String) -> Result<(), LoopError> {
        self.plan
            .update_task(task_id, |t| t.failure_reason = Some(reason))?;
        self.set_status(task_id, TaskStatus::Failed)?;
        self.current_task_id = None;

        let retries = self.plan.get_task(task_id)?.retry_count;
        if retries < self.config.max_task_retries {
            self.plan.update_task(task_id, |t| {
                t.retry_count += 1;
                t.cycle_count = 0;
            })?;
            self.set_status(task_id, TaskStatus::Ready)?;
            info!(task_id, attempt = retries + 1, "task queued for retry");
        } else {
            warn!(task_id, "task failed");
        }
        Ok(())
    }

    fn set_status(&mut self, task_id: &str, to: TaskStatus) -> Result<(), LoopError> {
        let from = self.plan.get_task(task_id)?.state;
        self.plan.set_task_status(task_id, to)?;
        self.events.emit(LoopEvent::TaskStateChanged {
            task_id: task_id.to_string(),
            from,
            to,
        });
        Ok(())
    }

    fn persist(&mut self) -> Result<(), LoopError> {
        let modified = self.plan.take_modified();
        if modified.is_empty() {
            return Ok(());
        }
        self.collab.store.save(&self.plan)?;
        debug!(plan_id = self.plan.plan_id(), modified = modified.len(), "plan persisted");
        Ok(())
    }
}

/// Block while paused. Returns false once the loop should stop.
async fn wait_while_paused(control: &mut watch::Receiver<LoopState>) -> bool {
    loop {
        let state = *control.borrow_and_update();
        match state {
            LoopState::Running => return true,
            LoopState::Stopped => return false,
            LoopState::Paused => {
                if control.changed().await.is_err() {
                    return false;
                }
            }
        }
    }
}

fn render_text(outputs: &Value) -> String {
    match outputs {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
