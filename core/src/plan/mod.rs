//! The plan: owner of every task and of the dependency graph between them.
//!
//! The plan is the only writer of the `task_id -> Task` map. Tasks and stacks
//! hold ids only, so every traversal goes through the plan.

mod graph;
mod persist;

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::task::{StatusTransition, Task, TaskStack, TaskStatus};

pub use persist::PlanFile;

/// Per-status task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub backlog: usize,
    pub ready: usize,
    pub in_progress: usize,
    pub done: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.backlog + self.ready + self.in_progress + self.done + self.failed
    }
}

/// Task dependency graph for one agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PlanFile", into = "PlanFile")]
pub struct Plan {
    plan_id: String,
    created_at: DateTime<Utc>,

    /// Root stack: tasks added directly to the plan.
    tasks: TaskStack,

    task_map: HashMap<String, Task>,

    /// Original insertion order (for stable iteration and tie-breaks)
    insertion_order: Vec<String>,

    /// Tasks touched since the last [`Plan::take_modified`].
    modified: HashSet<String>,
}

impl Plan {
    pub fn new(plan_id: impl Into<String>) -> Self {
        Self {
            plan_id: plan_id.into(),
            created_at: Utc::now(),
            tasks: TaskStack::new(),
            task_map: HashMap::new(),
            insertion_order: Vec::new(),
            modified: HashSet::new(),
        }
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The plan-level stack.
    pub fn root(&self) -> &TaskStack {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.task_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_map.is_empty()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.task_map.contains_key(task_id)
    }

    /// All tasks in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.task_map.get(id))
    }

    pub fn get_task(&self, task_id: &str) -> Result<&Task, PlanError> {
        self.task_map
            .get(task_id)
            .ok_or_else(|| PlanError::TaskNotFound(task_id.to_string()))
    }

    /// Add one task to the plan root.
    pub fn add_task(&mut self, task: Task) -> Result<(), PlanError> {
        self.add_tasks(vec![task])
    }

    /// Add tasks to the plan root.
    ///
    /// The batch is validated as a whole before anything is inserted:
    /// predecessors may point at existing tasks or at other tasks of the batch.
    /// `Backlog` tasks whose predecessors are already done become `Ready`.
    pub fn add_tasks(&mut self, tasks: Vec<Task>) -> Result<(), PlanError> {
        self.validate_batch(&tasks)?;
        let ids: Vec<String> = tasks.iter().map(|t| t.task_id.clone()).collect();
        for task in tasks {
            self.tasks.add(task.task_id.clone());
            self.insert(task);
        }
        self.promote_unblocked(ids);
        Ok(())
    }

    /// Add a task to `parent_id`'s subtask stack.
    pub fn add_subtask(&mut self, parent_id: &str, task: Task) -> Result<(), PlanError> {
        self.add_subtasks(parent_id, vec![task])
    }

    /// Add tasks to `parent_id`'s subtask stack, marking the parent modified.
    pub fn add_subtasks(&mut self, parent_id: &str, tasks: Vec<Task>) -> Result<(), PlanError> {
        if !self.contains(parent_id) {
            return Err(PlanError::TaskNotFound(parent_id.to_string()));
        }
        let tasks: Vec<Task> = tasks
            .into_iter()
            .map(|mut t| {
                t.task_parent_id = Some(parent_id.to_string());
                t
            })
            .collect();
        self.validate_batch(&tasks)?;

        let ids: Vec<String> = tasks.iter().map(|t| t.task_id.clone()).collect();
        for task in tasks {
            self.insert(task);
        }
        let parent = self.task_mut(parent_id)?;
        for id in &ids {
            parent.subtasks.add(id.clone());
        }
        parent.touch();
        self.modified.insert(parent_id.to_string());
        self.promote_unblocked(ids);
        Ok(())
    }

    /// Add a dependency edge `predecessor_id -> task_id`.
    ///
    /// Idempotent. Rejects unknown ids, self edges and edges closing a cycle.
    /// A `Ready` task that gains an unfinished predecessor goes back to
    /// `Backlog`.
    pub fn add_predecessor(&mut self, task_id: &str, predecessor_id: &str) -> Result<(), PlanError> {
        if !self.contains(predecessor_id) {
            return Err(PlanError::DependencyNotFound {
                task_id: task_id.to_string(),
                missing_dep: predecessor_id.to_string(),
            });
        }
        let task = self.get_task(task_id)?;
        if task.task_predecessor_id.iter().any(|p| p == predecessor_id) {
            return Ok(());
        }
        if task_id == predecessor_id || self.depends_on(predecessor_id, task_id) {
            return Err(PlanError::CircularDependency(format!(
                "{task_id} -> {predecessor_id} -> {task_id}"
            )));
        }

        let blocked = self
            .task_map
            .get(predecessor_id)
            .is_some_and(|pred| pred.state != TaskStatus::Done);

        let task = self.task_mut(task_id)?;
        task.task_predecessor_id.push(predecessor_id.to_string());
        task.touch();
        let reblock = blocked && task.state == TaskStatus::Ready;
        self.modified.insert(task_id.to_string());

        if reblock {
            self.set_task_status(task_id, TaskStatus::Backlog)?;
        }
        Ok(())
    }

    /// Tasks in state `Ready` whose predecessors are all `Done`, in insertion
    /// order. Recomputed on every call.
    pub fn get_ready_tasks(&self) -> Vec<&Task> {
        self.iter()
            .filter(|t| t.state == TaskStatus::Ready && self.predecessors_done(t))
            .collect()
    }

    pub fn get_active_tasks(&self) -> Vec<&Task> {
        self.iter()
            .filter(|t| t.state == TaskStatus::InProgress)
            .collect()
    }

    /// Next task to run: highest priority among ready tasks, insertion order
    /// on ties.
    pub fn next_task(&self) -> Option<&Task> {
        let mut best: Option<&Task> = None;
        for task in self.get_ready_tasks() {
            match best {
                Some(b) if b.priority >= task.priority => {}
                _ => best = Some(task),
            }
        }
        best
    }

    /// Change a task's status, enforcing the transition rules.
    ///
    /// Completing a task promotes `Backlog` successors whose predecessors are
    /// now all done.
    pub fn set_task_status(&mut self, task_id: &str, status: TaskStatus) -> Result<(), PlanError> {
        let task = self.task_mut(task_id)?;
        StatusTransition::validate(task.state, status).map_err(|source| {
            PlanError::Transition {
                task_id: task_id.to_string(),
                source,
            }
        })?;
        task.state = status;
        task.touch();
        self.modified.insert(task_id.to_string());

        if status == TaskStatus::Done {
            self.promote_successors(task_id);
        }
        Ok(())
    }

    /// Mutate a task's payload (outputs, counters, arguments).
    ///
    /// A status change made inside `f` is checked like
    /// [`Plan::set_task_status`] and rolled back if invalid. Identity and
    /// graph fields are restored: use the dedicated plan methods for those.
    pub fn update_task<F>(&mut self, task_id: &str, f: F) -> Result<(), PlanError>
    where
        F: FnOnce(&mut Task),
    {
        let task = self.task_mut(task_id)?;
        let before_state = task.state;
        let before_id = task.task_id.clone();
        let before_parent = task.task_parent_id.clone();
        let before_preds = task.task_predecessor_id.clone();
        let before_subtasks = task.subtasks.clone();

        f(task);

        task.task_id = before_id;
        task.task_parent_id = before_parent;
        task.task_predecessor_id = before_preds;
        task.subtasks = before_subtasks;
        let after_state = task.state;
        task.state = before_state;
        task.touch();
        self.modified.insert(task_id.to_string());

        if after_state != before_state {
            self.set_task_status(task_id, after_state)?;
        }
        Ok(())
    }

    /// Ids of tasks listing `task_id` as a predecessor, in insertion order.
    pub fn successors(&self, task_id: &str) -> Vec<&str> {
        self.iter()
            .filter(|t| t.task_predecessor_id.iter().any(|p| p == task_id))
            .map(|t| t.task_id.as_str())
            .collect()
    }

    /// True when no task can make progress: nothing is runnable and nothing
    /// is in progress.
    pub fn is_exhausted(&self) -> bool {
        self.get_ready_tasks().is_empty() && self.get_active_tasks().is_empty()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for task in self.task_map.values() {
            match task.state {
                TaskStatus::Backlog => counts.backlog += 1,
                TaskStatus::Ready => counts.ready += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Done => counts.done += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Drain the set of tasks modified since the last call, sorted.
    pub fn take_modified(&mut self) -> Vec<String> {
        let mut ids: Vec<String> = self.modified.drain().collect();
        ids.sort();
        ids
    }

    pub fn is_modified(&self, task_id: &str) -> bool {
        self.modified.contains(task_id)
    }

    /// Check every reference held by stacks, parent links and predecessor
    /// lists, then look for cycles.
    pub fn validate(&self) -> Result<(), PlanError> {
        for id in self.tasks.iter() {
            self.get_task(id)?;
        }
        for task in self.iter() {
            if let Some(parent) = &task.task_parent_id {
                self.get_task(parent)?;
            }
            for sub in task.subtasks.iter() {
                self.get_task(sub)?;
            }
            for dep in &task.task_predecessor_id {
                if !self.contains(dep) {
                    return Err(PlanError::DependencyNotFound {
                        task_id: task.task_id.clone(),
                        missing_dep: dep.clone(),
                    });
                }
            }
        }
        if let Some(cycle) = self.detect_cycle() {
            return Err(PlanError::CircularDependency(cycle));
        }
        Ok(())
    }

    /// Indented, human-readable listing of the plan.
    pub fn render_summary(&self) -> String {
        let counts = self.status_counts();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Plan {} ({} tasks: {} ready, {} in progress, {} done, {} failed, {} backlog)",
            self.plan_id,
            counts.total(),
            counts.ready,
            counts.in_progress,
            counts.done,
            counts.failed,
            counts.backlog
        );
        for id in self.tasks.iter() {
            self.render_task(&mut out, id, 1);
        }
        out
    }

    fn render_task(&self, out: &mut String, task_id: &str, depth: usize) {
        let Some(task) = self.task_map.get(task_id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let _ = write!(
            out,
            "{indent}- [{}] {} (id={}, priority={})",
            StatusTransition::description(task.state),
            task.name,
            task.task_id,
            task.priority
        );
        if let Some(command) = &task.command {
            let _ = write!(out, " command={command}");
        }
        if !task.task_predecessor_id.is_empty() {
            let _ = write!(out, " after={}", task.task_predecessor_id.join(","));
        }
        out.push('\n');
        for sub in task.subtasks.iter() {
            self.render_task(out, sub, depth + 1);
        }
    }

    fn task_mut(&mut self, task_id: &str) -> Result<&mut Task, PlanError> {
        self.task_map
            .get_mut(task_id)
            .ok_or_else(|| PlanError::TaskNotFound(task_id.to_string()))
    }

    fn insert(&mut self, task: Task) {
        let id = task.task_id.clone();
        self.insertion_order.push(id.clone());
        self.modified.insert(id.clone());
        self.task_map.insert(id, task);
    }

    fn predecessors_done(&self, task: &Task) -> bool {
        task.task_predecessor_id.iter().all(|p| {
            self.task_map
                .get(p)
                .map(|pred| pred.state == TaskStatus::Done)
                .unwrap_or(false)
        })
    }

    fn promote_successors(&mut self, task_id: &str) {
        let successors: Vec<String> = self
            .successors(task_id)
            .into_iter()
            .map(str::to_string)
            .collect();
        self.promote_unblocked(successors);
    }

    /// Move every `Backlog` task among `ids` whose predecessors are all done
    /// to `Ready`.
    fn promote_unblocked(&mut self, ids: impl IntoIterator<Item = String>) {
        let promotable: Vec<String> = ids
            .into_iter()
            .filter(|id| {
                self.task_map
                    .get(id)
                    .is_some_and(|t| t.state == TaskStatus::Backlog && self.predecessors_done(t))
            })
            .collect();

        for id in promotable {
            if let Some(task) = self.task_map.get_mut(&id) {
                tracing::debug!(task_id = %id, "predecessors done, promoting to ready");
                task.state = TaskStatus::Ready;
                task.touch();
                self.modified.insert(id);
            }
        }
    }

    fn validate_batch(&self, tasks: &[Task]) -> Result<(), PlanError> {
        let mut batch_ids: HashSet<&str> = HashSet::new();
        for task in tasks {
            if self.contains(&task.task_id) || !batch_ids.insert(task.task_id.as_str()) {
                return Err(PlanError::DuplicateTaskId(task.task_id.clone()));
            }
        }
        for task in tasks {
            if let Some(parent) = &task.task_parent_id {
                if !self.contains(parent) && !batch_ids.contains(parent.as_str()) {
                    return Err(PlanError::TaskNotFound(parent.clone()));
                }
            }
            for dep in &task.task_predecessor_id {
                if !self.contains(dep) && !batch_ids.contains(dep.as_str()) {
                    return Err(PlanError::DependencyNotFound {
                        task_id: task.task_id.clone(),
                        missing_dep: dep.clone(),
                    });
                }
            }
            for sub in task.subtasks.iter() {
                if !self.contains(sub) && !batch_ids.contains(sub) {
                    return Err(PlanError::TaskNotFound(sub.to_string()));
                }
            }
        }
        // Existing tasks cannot point at new ids, so a cycle can only run
        // through the batch itself.
        if let Some(cycle) = graph::detect_cycle_in(tasks) {
            return Err(PlanError::CircularDependency(cycle));
        }
        Ok(())
    }
}
