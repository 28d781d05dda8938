use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::Task;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Service for validating a phase's task graph and ordering it
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

// Standalone helper for cycle detection (no self needed)
fn detect_cycle_util<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            if !visited.contains(neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(neighbor) {
                if let Some(cycle_start) = path.iter().position(|&id| id == neighbor) {
                    path.drain(0..cycle_start);
                    // Close the loop so the path reads A -> B -> A.
                    path.push(neighbor);
                    return true;
                }
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Reject duplicate ids, dangling dependencies and cycles.
    pub fn validate_graph(&self, phase: &str, tasks: &[Task]) -> DomainResult<()> {
        let mut seen = HashSet::new();
        for task in tasks {
            if !seen.insert(task.id.as_str()) {
                return Err(OrchestrationError::DuplicateTask {
                    phase: phase.to_string(),
                    task: task.id.clone(),
                });
            }
        }

        for task in tasks {
            if let Some(dep) = task.depends_on.iter().find(|d| !seen.contains(d.as_str())) {
                return Err(OrchestrationError::UnknownDependency {
                    phase: phase.to_string(),
                    task: task.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        if let Some(path) = self.detect_cycle(tasks) {
            return Err(OrchestrationError::DependencyCycle {
                phase: phase.to_string(),
                path,
            });
        }
        Ok(())
    }

    /// First cycle found walking tasks in declaration order, as a closed path.
    pub fn detect_cycle(&self, tasks: &[Task]) -> Option<Vec<String>> {
        let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
        for task in tasks {
            graph
                .entry(task.id.as_str())
                .or_default()
                .extend(task.depends_on.iter().map(String::as_str));
        }

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for task in tasks {
            let id = task.id.as_str();
            if !visited.contains(id)
                && detect_cycle_util(id, &graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(path.into_iter().map(ToString::to_string).collect());
            }
        }

        None
    }

    /// Task ids in dependency order; ties keep declaration order.
    pub fn topological_sort(&self, phase: &str, tasks: &[Task]) -> DomainResult<Vec<String>> {
        self.validate_graph(phase, tasks)?;

        let index: HashMap<&str, usize> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.as_str(), i))
            .collect();
        let mut in_degree: Vec<usize> = tasks.iter().map(|t| t.depends_on.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
        for (i, task) in tasks.iter().enumerate() {
            for dep in &task.depends_on {
                if let Some(&d) = index.get(dep.as_str()) {
                    dependents[d].push(i);
                }
            }
        }

        // Kahn's algorithm with the lowest declaration index always first
        let mut ready: BTreeSet<usize> = (0..tasks.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut sorted = Vec::with_capacity(tasks.len());

        while let Some(node) = ready.pop_first() {
            sorted.push(tasks[node].id.clone());
            for &next in &dependents[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        Ok(sorted)
    }
}
