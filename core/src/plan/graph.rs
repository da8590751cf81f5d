//! Graph queries over predecessor edges.

use std::collections::{HashMap, HashSet};

use super::Plan;
use crate::error::PlanError;
use crate::task::Task;

impl Plan {
    /// Whether `from` transitively depends on `target`.
    pub fn depends_on(&self, from: &str, target: &str) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];

        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            let Some(task) = self.task_map.get(node) else {
                continue;
            };
            for dep in &task.task_predecessor_id {
                if dep == target {
                    return true;
                }
                stack.push(dep.as_str());
            }
        }
        false
    }

    /// Topological order using Kahn's algorithm.
    ///
    /// Predecessors come first; tasks that become available together keep
    /// their insertion order.
    pub fn topological_order(&self) -> Result<Vec<String>, PlanError> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut reverse_edges: HashMap<&str, Vec<&str>> = HashMap::new();
        let position: HashMap<&str, usize> = self
            .insertion_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        for task in self.iter() {
            in_degree.insert(task.task_id.as_str(), task.task_predecessor_id.len());
            for dep in &task.task_predecessor_id {
                reverse_edges
                    .entry(dep.as_str())
                    .or_default()
                    .push(task.task_id.as_str());
            }
        }

        let mut current: Vec<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(id, _)| *id)
            .collect();
        current.sort_by_key(|id| position.get(id).copied().unwrap_or(usize::MAX));

        let mut order = Vec::with_capacity(self.len());
        while !current.is_empty() {
            let mut next = Vec::new();
            for id in &current {
                order.push(id.to_string());
                if let Some(dependents) = reverse_edges.get(id) {
                    for dependent in dependents {
                        if let Some(degree) = in_degree.get_mut(dependent) {
                            *degree -= 1;
                            if *degree == 0 {
                                next.push(*dependent);
                            }
                        }
                    }
                }
            }
            next.sort_by_key(|id| position.get(id).copied().unwrap_or(usize::MAX));
            current = next;
        }

        if order.len() != self.len() {
            return Err(PlanError::CircularDependency(
                "unable to complete topological sort (cycle detected)".to_string(),
            ));
        }
        Ok(order)
    }

    /// Detect circular dependencies using DFS; returns the cycle path.
    pub(crate) fn detect_cycle(&self) -> Option<String> {
        let edges: HashMap<&str, &[String]> = self
            .iter()
            .map(|t| (t.task_id.as_str(), t.task_predecessor_id.as_slice()))
            .collect();
        let order: Vec<&str> = self.insertion_order.iter().map(String::as_str).collect();
        find_cycle(&order, &edges)
    }
}

/// Cycle detection restricted to the edges between `tasks`.
pub(super) fn detect_cycle_in(tasks: &[Task]) -> Option<String> {
    let edges: HashMap<&str, &[String]> = tasks
        .iter()
        .map(|t| (t.task_id.as_str(), t.task_predecessor_id.as_slice()))
        .collect();
    let order: Vec<&str> = tasks.iter().map(|t| t.task_id.as_str()).collect();
    find_cycle(&order, &edges)
}

fn find_cycle(order: &[&str], edges: &HashMap<&str, &[String]>) -> Option<String> {
    let mut visited = HashSet::new();
    let mut stack = Vec::new();

    for node in order {
        if !visited.contains(*node) && dfs_cycle(node, edges, &mut visited, &mut stack) {
            return Some(stack.join(" -> "));
        }
    }
    None
}

fn dfs_cycle(
    node: &str,
    edges: &HashMap<&str, &[String]>,
    visited: &mut HashSet<String>,
    stack: &mut Vec<String>,
) -> bool {
    visited.insert(node.to_string());
    stack.push(node.to_string());

    if let Some(dependencies) = edges.get(node) {
        for dep in dependencies.iter() {
            // Dependency already on the current path
            if let Some(pos) = stack.iter().position(|x| x == dep) {
                stack.push(dep.clone());
                *stack = stack[pos..].to_vec();
                return true;
            }

            // Edges leaving the considered set are ignored
            if edges.contains_key(dep.as_str())
                && !visited.contains(dep)
                && dfs_cycle(dep, edges, visited, stack)
            {
                return true;
            }
        }
    }

    stack.pop();
    false
}
