//! Run planning: dependency closure and topological order

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{FlowError, Result};
use crate::graph::WorkflowGraph;
use crate::types::NodeId;

/// What a run should bring up to date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    /// Every node in the graph
    All,
    /// The given nodes plus everything they depend on
    Nodes(Vec<NodeId>),
}

impl RunTarget {
    /// Target a single node and its upstream
    pub fn node(node_id: impl Into<NodeId>) -> Self {
        RunTarget::Nodes(vec![node_id.into()])
    }
}

/// Ordered set of nodes for one run
#[derive(Debug, Clone)]
pub(crate) struct ExecutionPlan {
    /// Topological order; ties keep graph insertion order
    pub order: Vec<NodeId>,
    /// Distinct in-plan producers of each node
    pub dependencies: HashMap<NodeId, HashSet<NodeId>>,
    /// Distinct in-plan consumers of each node, in plan order
    pub dependents: HashMap<NodeId, Vec<NodeId>>,
}

impl ExecutionPlan {
    /// Compute the closure of `target` and order it.
    ///
    /// Fails with `GraphCycle` if the closure cannot be ordered; nothing in
    /// the graph is touched either way.
    pub fn build(graph: &WorkflowGraph, target: &RunTarget) -> Result<Self> {
        let members = closure(graph, target)?;

        let mut dependencies: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();
        for node_id in &members {
            let deps = graph
                .dependencies(node_id)
                .into_iter()
                .map(str::to_string)
                .collect();
            dependencies.insert(node_id.clone(), deps);
        }

        // Kahn's algorithm seeded in graph order
        let mut in_degree: HashMap<&str, usize> = members
            .iter()
            .map(|id| (id.as_str(), dependencies[id].len()))
            .collect();
        let mut queue: VecDeque<&str> = members
            .iter()
            .filter(|id| in_degree[id.as_str()] == 0)
            .map(String::as_str)
            .collect();

        let mut order = Vec::with_capacity(members.len());
        while let Some(node_id) = queue.pop_front() {
            order.push(node_id.to_string());
            for dependent in graph.dependents(node_id) {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if order.len() < members.len() {
            let nodes: Vec<NodeId> = members
                .iter()
                .filter(|id| in_degree[id.as_str()] > 0)
                .cloned()
                .collect();
            log::warn!("Cycle detected between nodes: {}", nodes.join(", "));
            return Err(FlowError::GraphCycle { nodes });
        }

        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (node_id, deps) in &dependencies {
            for dep in deps {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(node_id.clone());
            }
        }
        for consumers in dependents.values_mut() {
            consumers.sort_by_key(|id| position[id.as_str()]);
        }

        Ok(Self {
            order,
            dependencies,
            dependents,
        })
    }

    /// Every in-plan node reachable downstream of `node_id`, in plan order
    pub fn downstream_of(&self, node_id: &str) -> Vec<NodeId> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![node_id];
        while let Some(current) = stack.pop() {
            for dependent in self.dependents.get(current).into_iter().flatten() {
                if seen.insert(dependent.as_str()) {
                    stack.push(dependent.as_str());
                }
            }
        }
        self.order
            .iter()
            .filter(|id| seen.contains(id.as_str()))
            .cloned()
            .collect()
    }
}

/// Nodes that must run for `target`, in graph insertion order
fn closure(graph: &WorkflowGraph, target: &RunTarget) -> Result<Vec<NodeId>> {
    let roots = match target {
        RunTarget::All => return Ok(graph.nodes().iter().map(|n| n.id.clone()).collect()),
        RunTarget::Nodes(ids) => ids,
    };

    let mut included: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = Vec::new();
    for id in roots {
        let node = graph
            .node(id)
            .ok_or_else(|| FlowError::NodeNotFound(id.clone()))?;
        if included.insert(node.id.as_str()) {
            stack.push(node.id.as_str());
        }
    }
    while let Some(node_id) = stack.pop() {
        for dependency in graph.dependencies(node_id) {
            if included.insert(dependency) {
                stack.push(dependency);
            }
        }
    }

    Ok(graph
        .nodes()
        .iter()
        .filter(|n| included.contains(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect())
}
