//! On-disk layout of a plan.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Plan;
use crate::error::PlanError;
use crate::task::{Task, TaskStack};

/// JSON-compatible persisted form of a [`Plan`].
///
/// ```json
/// {
///   "plan_id": "...",
///   "created_at": "...",
///   "tasks": { "task_ids": ["..."] },
///   "task_order": ["..."],
///   "task_map": { "<task_id>": { ... } }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFile {
    pub plan_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tasks: TaskStack,
    #[serde(default)]
    pub task_order: Vec<String>,
    #[serde(default)]
    pub task_map: BTreeMap<String, Task>,
}

impl From<Plan> for PlanFile {
    fn from(plan: Plan) -> Self {
        PlanFile {
            plan_id: plan.plan_id,
            created_at: plan.created_at,
            tasks: plan.tasks,
            task_order: plan.insertion_order,
            task_map: plan.task_map.into_iter().collect(),
        }
    }
}

impl TryFrom<PlanFile> for Plan {
    type Error = PlanError;

    fn try_from(file: PlanFile) -> Result<Self, Self::Error> {
        let mut task_map: HashMap<String, Task> = HashMap::with_capacity(file.task_map.len());
        for (key, task) in file.task_map {
            if key != task.task_id {
                return Err(PlanError::TaskNotFound(key));
            }
            task_map.insert(key, task);
        }

        // Order entries for known tasks first, then anything the file did not
        // list, sorted for determinism.
        let mut seen = HashSet::new();
        let mut insertion_order = Vec::with_capacity(task_map.len());
        for id in file.task_order {
            if !task_map.contains_key(&id) {
                return Err(PlanError::TaskNotFound(id));
            }
            if seen.insert(id.clone()) {
                insertion_order.push(id);
            }
        }
        let mut missing: Vec<String> = task_map
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        missing.sort();
        insertion_order.extend(missing);

        let mut plan = Plan {
            plan_id: file.plan_id,
            created_at: file.created_at,
            tasks: file.tasks,
            task_map,
            insertion_order,
            modified: HashSet::new(),
        };
        plan.validate()?;
        let ids = plan.insertion_order.clone();
        plan.promote_unblocked(ids);
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use pretty_assertions::assert_eq;

    fn sample_plan() -> Plan {
        let mut plan = Plan::new("plan-1");
        plan.add_tasks(vec![
            Task::new("a").with_id("a").with_priority(5),
            Task::new("b")
                .with_id("b")
                .with_priority(10)
                .with_predecessors(["a"]),
        ])
        .unwrap();
        plan.add_subtask("b", Task::new("b.1").with_id("b.1")).unwrap();
        plan.set_task_status("a", TaskStatus::InProgress).unwrap();
        plan.set_task_status("a", TaskStatus::Done).unwrap();
        plan
    }

    #[test]
    fn round_trip_keeps_ids_states_and_edges() {
        let plan = sample_plan();
        let json = serde_json::to_string_pretty(&plan).unwrap();
        let restored: Plan = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.plan_id(), "plan-1");
        let original: Vec<_> = plan
            .iter()
            .map(|t| (t.task_id.clone(), t.state, t.task_predecessor_id.clone()))
            .collect();
        let reloaded: Vec<_> = restored
            .iter()
            .map(|t| (t.task_id.clone(), t.state, t.task_predecessor_id.clone()))
            .collect();
        assert_eq!(original, reloaded);
        assert_eq!(restored.root().task_ids(), plan.root().task_ids());
        assert!(restored.get_task("b").unwrap().subtasks.contains("b.1"));
    }

    #[test]
    fn stacks_persist_as_task_id_mappings() {
        let value = serde_json::to_value(sample_plan()).unwrap();
        assert_eq!(value["tasks"], serde_json::json!({ "task_ids": ["a", "b"] }));
        assert_eq!(
            value["task_map"]["b"]["subtasks"],
            serde_json::json!({ "task_ids": ["b.1"] })
        );
    }

    #[test]
    fn loading_promotes_backlog_tasks_whose_predecessors_are_done() {
        let mut value = serde_json::to_value(sample_plan()).unwrap();
        value["task_map"]["b"]["state"] = serde_json::json!("backlog");

        let restored: Plan = serde_json::from_value(value).unwrap();

        assert_eq!(restored.get_task("b").unwrap().state, TaskStatus::Ready);
        assert!(restored.is_modified("b"));
    }

    #[test]
    fn dangling_references_fail_to_load() {
        let mut value = serde_json::to_value(sample_plan()).unwrap();
        value["task_map"]["b"]["task_predecessor_id"] = serde_json::json!(["ghost"]);
        let err = serde_json::from_value::<Plan>(value).unwrap_err();
        assert!(err.to_string().contains("ghost"), "{err}");
    }

    #[test]
    fn cycles_fail_to_load() {
        let mut value = serde_json::to_value(sample_plan()).unwrap();
        value["task_map"]["a"]["task_predecessor_id"] = serde_json::json!(["b"]);
        let err = serde_json::from_value::<Plan>(value).unwrap_err();
        assert!(err.to_string().contains("circular"), "{err}");
    }
}
