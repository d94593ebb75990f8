//! Fluent builder for workflow graphs
//!
//! Provides a compact API for constructing graphs programmatically, mainly
//! for hosts that ship preset workflows and for tests. Every node and edge
//! goes through the regular [`WorkflowGraph`] operations, so a built graph
//! obeys the same invariants as one edited by hand.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::geometry::Point;
use crate::graph::WorkflowGraph;
use crate::registry::NodeRegistry;
use crate::types::{NodeConfig, SocketValue};

struct NodeSpec {
    id: String,
    node_type: String,
    position: Point,
    config: NodeConfig,
}

struct EdgeSpec {
    source: String,
    source_socket: String,
    target: String,
    target_socket: String,
}

/// Fluent builder for constructing workflow graphs
///
/// # Example
///
/// ```ignore
/// let graph = WorkflowBuilder::new("wf-1", "Portrait")
///     .add_node("prompt", "text-input", (0.0, 0.0))
///     .with_config("text", serde_json::json!("a lighthouse at dusk"))
///     .add_node("generate", "image-generation", (300.0, 0.0))
///     .add_edge("prompt", "text", "generate", "prompt")
///     .build(registry)?;
/// ```
pub struct WorkflowBuilder {
    id: String,
    name: String,
    config: EngineConfig,
    nodes: Vec<NodeSpec>,
    edges: Vec<EdgeSpec>,
}

impl WorkflowBuilder {
    /// Create a new workflow builder
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            config: EngineConfig::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a node to the graph
    pub fn add_node(
        mut self,
        id: impl Into<String>,
        node_type: impl Into<String>,
        position: (f64, f64),
    ) -> Self {
        self.nodes.push(NodeSpec {
            id: id.into(),
            node_type: node_type.into(),
            position: Point::new(position.0, position.1),
            config: NodeConfig::new(),
        });
        self
    }

    /// Override one config entry on the most recently added node
    ///
    /// Must be called immediately after `add_node`.
    pub fn with_config(mut self, key: impl Into<String>, value: SocketValue) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.config.insert(key.into(), value);
        }
        self
    }

    /// Connect two sockets
    pub fn add_edge(
        mut self,
        source: impl Into<String>,
        source_socket: impl Into<String>,
        target: impl Into<String>,
        target_socket: impl Into<String>,
    ) -> Self {
        self.edges.push(EdgeSpec {
            source: source.into(),
            source_socket: source_socket.into(),
            target: target.into(),
            target_socket: target_socket.into(),
        });
        self
    }

    /// Build the graph, failing on the first invalid node or edge
    pub fn build(self, registry: Arc<NodeRegistry>) -> Result<WorkflowGraph> {
        let mut graph = WorkflowGraph::new(self.id, self.name, registry).with_config(self.config);

        for node in self.nodes {
            graph.add_node_with_id(node.id.clone(), &node.node_type, node.position)?;
            if !node.config.is_empty() {
                graph.update_config(&node.id, node.config)?;
            }
        }
        for edge in self.edges {
            graph.add_edge(
                &edge.source,
                &edge.source_socket,
                &edge.target,
                &edge.target_socket,
            )?;
        }

        Ok(graph)
    }
}
