use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::stack::TaskStack;

/// Task lifecycle status.
///
/// `Backlog` is the optional un-started state for tasks whose predecessors are
/// not complete yet. Tasks without predecessors start `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    #[default]
    Ready,
    InProgress,
    Done,
    Failed,
}

/// A unit of work in a [`crate::plan::Plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,

    /// Back-reference to the task whose subtask stack holds this task.
    #[serde(default)]
    pub task_parent_id: Option<String>,

    /// Dependency edges: every id must be `Done` before this task is ready.
    #[serde(default)]
    pub task_predecessor_id: Vec<String>,

    pub name: String,

    #[serde(default)]
    pub short_description: String,

    #[serde(default)]
    pub long_description: Option<String>,

    /// Pre-bound command; skips model selection when set.
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,

    #[serde(default)]
    pub state: TaskStatus,

    /// Higher runs first among ready tasks.
    #[serde(default)]
    pub priority: i64,

    #[serde(default)]
    pub task_text_output: Option<String>,

    #[serde(default)]
    pub task_text_output_as_uml: Option<String>,

    #[serde(default)]
    pub failure_reason: Option<String>,

    /// Loop cycles spent on this task.
    #[serde(default)]
    pub cycle_count: u32,

    #[serde(default)]
    pub retry_count: u32,

    #[serde(default)]
    pub subtasks: TaskStack,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            task_parent_id: None,
            task_predecessor_id: Vec::new(),
            name: name.into(),
            short_description: String::new(),
            long_description: None,
            command: None,
            arguments: None,
            state: TaskStatus::Ready,
            priority: 0,
            task_text_output: None,
            task_text_output_as_uml: None,
            failure_reason: None,
            cycle_count: 0,
            retry_count: 0,
            subtasks: TaskStack::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }

    pub fn with_description(mut self, short_description: impl Into<String>) -> Self {
        self.short_description = short_description.into();
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_arguments(mut self, arguments: Map<String, Value>) -> Self {
        self.arguments = Some(arguments);
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_predecessors<I, S>(mut self, predecessors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.task_predecessor_id = predecessors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_state(mut self, state: TaskStatus) -> Self {
        self.state = state;
        self
    }

    pub fn is_done(&self) -> bool {
        self.state == TaskStatus::Done
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.task_id)
    }
}
