use planloop_core::error::ToolError;
use planloop_core::strategy::{StrategyContext, MAKE_INITIAL_PLAN};
use planloop_core::task::{Task, TaskStatus};
use planloop_core::tool::{Handler, ParamType, Tool, ToolParameter, ToolReturn};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// One entry of the `task_list` a planning strategy returns.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannedTask {
    #[serde(default)]
    pub task_id: Option<String>,
    pub name: String,
    #[serde(default, alias = "description")]
    pub short_description: String,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default, alias = "predecessors")]
    pub task_predecessor_id: Vec<String>,
}

impl From<PlannedTask> for Task {
    fn from(p: PlannedTask) -> Self {
        let mut task = Task::new(p.name)
            .with_description(p.short_description)
            .with_priority(p.priority)
            .with_predecessors(p.task_predecessor_id);
        if let Some(id) = p.task_id {
            task = task.with_id(id);
        }
        if let Some(command) = p.command {
            task = task.with_command(command);
        }
        if let Some(arguments) = p.arguments {
            task = task.with_arguments(arguments);
        }
        task.long_description = p.long_description;
        if !task.task_predecessor_id.is_empty() {
            task = task.with_state(TaskStatus::Backlog);
        }
        task
    }
}

#[derive(Debug, Deserialize)]
struct PlanResponse {
    task_list: Vec<PlannedTask>,
}

/// Parse a planning response into tasks, highest priority first.
pub fn tasks_from_response(response: Value) -> Result<Vec<Task>, ToolError> {
    let parsed: PlanResponse = serde_json::from_value(response).map_err(|e| {
        ToolError::execution(format!("Planning response is not a task list: {e}"))
            .with_hint("Return an object with a task_list array.")
    })?;
    let mut tasks: Vec<Task> = parsed.task_list.into_iter().map(Task::from).collect();
    // Stable: equal priorities keep the model's order.
    tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
    Ok(tasks)
}

pub fn make_initial_plan_tool() -> Tool {
    Tool::builder(MAKE_INITIAL_PLAN, "Break the goal down into an initial list of tasks")
        .parameter(ToolParameter::optional(
            "goal",
            ParamType::String,
            "The goal to plan for",
        ))
        .hidden()
        .handler(Handler::asynchronous(|args, ctx| async move {
            let mut strategy_ctx = StrategyContext::new();
            strategy_ctx.insert("goal".into(), args.get("goal").cloned().unwrap_or(Value::Null));
            strategy_ctx.insert("agent_id".into(), json!(ctx.agent_id));
            strategy_ctx.insert("tools".into(), json!(ctx.tool_catalog.as_slice()));

            let response = ctx
                .strategy
                .execute(MAKE_INITIAL_PLAN, strategy_ctx)
                .await
                .map_err(|e| ToolError::execution(e.to_string()))?;
            let tasks = tasks_from_response(response)?;
            Ok(ToolReturn::new(format!("Planned {} tasks", tasks.len())).with_planned_tasks(tasks))
        }))
}
