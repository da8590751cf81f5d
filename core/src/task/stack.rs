//! Ordered, de-duplicated stacks of task ids.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::types::Task;
use crate::error::PlanError;
use crate::plan::Plan;

/// Persisted form: `{"task_ids": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StackRepr {
    #[serde(default)]
    task_ids: Vec<String>,
}

/// Ordered set of task ids scoped to one owner (a task or the plan root).
///
/// Order is insertion order and is what [`TaskStack::get_all_tasks`] returns;
/// membership checks go through a hash index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "StackRepr", into = "StackRepr")]
pub struct TaskStack {
    task_ids: Vec<String>,
    index: HashSet<String>,
}

impl TaskStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `task_id` if absent. Returns `false` when it was already present.
    pub fn add(&mut self, task_id: impl Into<String>) -> bool {
        let task_id = task_id.into();
        if self.index.contains(&task_id) {
            return false;
        }
        self.index.insert(task_id.clone());
        self.task_ids.push(task_id);
        true
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.index.contains(task_id)
    }

    pub fn len(&self) -> usize {
        self.task_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.task_ids.iter().map(String::as_str)
    }

    pub fn task_ids(&self) -> &[String] {
        &self.task_ids
    }

    pub fn get_task<'p>(&self, plan: &'p Plan, task_id: &str) -> Result<&'p Task, PlanError> {
        plan.get_task(task_id)
    }

    pub fn get_all_tasks<'p>(&self, plan: &'p Plan) -> Result<Vec<&'p Task>, PlanError> {
        self.task_ids.iter().map(|id| plan.get_task(id)).collect()
    }

    /// Tasks of this stack that are ready plan-wide, in stack order.
    pub fn get_ready_tasks<'p>(&self, plan: &'p Plan) -> Result<Vec<&'p Task>, PlanError> {
        let ready: HashSet<&str> = plan
            .get_ready_tasks()
            .into_iter()
            .map(|t| t.task_id.as_str())
            .collect();
        self.materialize(plan, |id| ready.contains(id))
    }

    /// Tasks of this stack that are in progress, in stack order.
    pub fn get_active_tasks<'p>(&self, plan: &'p Plan) -> Result<Vec<&'p Task>, PlanError> {
        let active: HashSet<&str> = plan
            .get_active_tasks()
            .into_iter()
            .map(|t| t.task_id.as_str())
            .collect();
        self.materialize(plan, |id| active.contains(id))
    }

    fn materialize<'p, F>(&self, plan: &'p Plan, keep: F) -> Result<Vec<&'p Task>, PlanError>
    where
        F: Fn(&str) -> bool,
    {
        let mut tasks = Vec::new();
        for id in &self.task_ids {
            // Resolve first so a dangling id surfaces even when filtered out.
            let task = plan.get_task(id)?;
            if keep(id) {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }
}

impl PartialEq for TaskStack {
    fn eq(&self, other: &Self) -> bool {
        self.task_ids == other.task_ids
    }
}

impl From<StackRepr> for TaskStack {
    fn from(repr: StackRepr) -> Self {
        let mut stack = TaskStack::new();
        for id in repr.task_ids {
            stack.add(id);
        }
        stack
    }
}

impl From<TaskStack> for StackRepr {
    fn from(stack: TaskStack) -> Self {
        StackRepr {
            task_ids: stack.task_ids,
        }
    }
}

impl<'a> IntoIterator for &'a TaskStack {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.task_ids.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_is_idempotent() {
        let mut stack = TaskStack::new();
        assert!(stack.add("a"));
        assert!(!stack.add("a"));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn keeps_insertion_order() {
        let mut stack = TaskStack::new();
        for id in ["c", "a", "b", "a"] {
            stack.add(id);
        }
        assert_eq!(stack.iter().collect::<Vec<_>>(), vec!["c", "a", "b"]);
    }

    #[test]
    fn serializes_as_task_ids_mapping() {
        let mut stack = TaskStack::new();
        stack.add("x");
        stack.add("y");
        let json = serde_json::to_value(&stack).unwrap();
        assert_eq!(json, serde_json::json!({ "task_ids": ["x", "y"] }));

        // Duplicates in a hand-edited file collapse on load.
        let back: TaskStack =
            serde_json::from_value(serde_json::json!({ "task_ids": ["x", "x", "y"] })).unwrap();
        assert_eq!(back, stack);
    }

    #[test]
    fn ready_and_active_views_intersect_with_plan() {
        let mut plan = Plan::new("p");
        plan.add_task(Task::new("a").with_id("a")).unwrap();
        plan.add_task(Task::new("b").with_id("b")).unwrap();
        plan.add_task(Task::new("c").with_id("c").with_predecessors(["a"]))
            .unwrap();
        plan.set_task_status("b", TaskStatus::InProgress).unwrap();

        let mut stack = TaskStack::new();
        stack.add("c");
        stack.add("b");
        stack.add("a");

        let ready: Vec<_> = stack
            .get_ready_tasks(&plan)
            .unwrap()
            .into_iter()
            .map(|t| t.task_id.clone())
            .collect();
        assert_eq!(ready, vec!["a".to_string()]);

        let active: Vec<_> = stack
            .get_active_tasks(&plan)
            .unwrap()
            .into_iter()
            .map(|t| t.task_id.clone())
            .collect();
        assert_eq!(active, vec!["b".to_string()]);
    }

    #[test]
    fn dangling_id_is_an_error() {
        let plan = Plan::new("p");
        let mut stack = TaskStack::new();
        stack.add("ghost");
        assert_eq!(
            stack.get_all_tasks(&plan).unwrap_err(),
            PlanError::TaskNotFound("ghost".into())
        );
        assert!(stack.get_ready_tasks(&plan).is_err());
    }
}
