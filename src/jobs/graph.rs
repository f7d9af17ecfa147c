// src/jobs/graph.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, StagehandError};
use crate::jobs::job::JobId;
use crate::jobs::slot::JobSlot;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct GraphNode {
    /// Jobs that must complete before this one can start.
    deps: Vec<JobId>,
    /// Jobs that list this one as a dependency.
    dependents: Vec<JobId>,
}

/// Adjacency snapshot of the scheduler's resolved dependencies.
///
/// Rebuilt whenever dependencies change; the scheduler keeps ownership of
/// the jobs themselves.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    order: Vec<JobId>,
    nodes: HashMap<JobId, GraphNode>,
}

impl DependencyGraph {
    pub fn from_slots(slots: &[JobSlot]) -> Self {
        let mut nodes: HashMap<JobId, GraphNode> = slots
            .iter()
            .map(|slot| {
                (
                    slot.id.clone(),
                    GraphNode {
                        deps: slot.deps.clone(),
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        // Registration order keeps the dependents lists deterministic.
        for slot in slots {
            for dep in &slot.deps {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(slot.id.clone());
                }
            }
        }

        Self {
            order: slots.iter().map(|s| s.id.clone()).collect(),
            nodes,
        }
    }

    pub fn dependencies_of(&self, id: &str) -> &[JobId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependents_of(&self, id: &str) -> &[JobId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Fail with [`StagehandError::DependencyCycle`] if any dependency chain
    /// loops back on itself; otherwise return a valid start order.
    pub fn topological_order(&self) -> Result<Vec<JobId>> {
        // Edge direction: dep -> job.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for id in &self.order {
            graph.add_node(id.as_str());
        }

        for id in &self.order {
            for dep in self.dependencies_of(id) {
                graph.add_edge(dep.as_str(), id.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
            Err(cycle) => Err(StagehandError::DependencyCycle(format!(
                "cycle detected in job dependencies involving job '{}'",
                cycle.node_id()
            ))),
        }
    }
}
