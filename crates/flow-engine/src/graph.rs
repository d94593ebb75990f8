//! The node/edge model of one workflow
//!
//! `WorkflowGraph` owns the nodes and edges of a single workflow and
//! enforces the structural invariants on every mutation:
//!
//! - every node's type is registered
//! - an input socket has at most one producer (a new edge replaces the old)
//! - no self connections, and only compatible socket types are linked
//! - removing a node removes every edge touching it
//!
//! All failures are reported before anything is changed.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::document::WorkflowDocument;
use crate::error::{FlowError, Result};
use crate::geometry::{Point, Size};
use crate::registry::{NodeDefinition, NodeRegistry};
use crate::types::{
    is_compatible, EdgeId, GraphEdge, GraphNode, NodeConfig, NodeId, NodeOutputs, NodeStatus,
    SocketDirection, SocketId,
};
use crate::validation::validate_document;

/// Result of connecting two sockets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// The edge that now feeds the target socket
    pub edge: GraphEdge,
    /// The edge it replaced, if the socket was already connected
    pub replaced: Option<GraphEdge>,
}

/// A node removed from the graph together with the edges that touched it
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedNode {
    pub node: GraphNode,
    pub edges: Vec<GraphEdge>,
}

/// A graph mutation expressed as data
///
/// Hosts send these through [`WorkflowGraph::apply`] instead of reaching
/// into nodes directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GraphCommand {
    #[serde(rename_all = "camelCase")]
    AddNode { node_type: String, position: Point },
    #[serde(rename_all = "camelCase")]
    RemoveNode { node_id: NodeId },
    #[serde(rename_all = "camelCase")]
    Connect {
        source: NodeId,
        source_socket: SocketId,
        target: NodeId,
        target_socket: SocketId,
    },
    #[serde(rename_all = "camelCase")]
    Disconnect { edge_id: EdgeId },
    #[serde(rename_all = "camelCase")]
    UpdateConfig { node_id: NodeId, patch: NodeConfig },
    #[serde(rename_all = "camelCase")]
    MoveNode { node_id: NodeId, position: Point },
    #[serde(rename_all = "camelCase")]
    ResizeNode { node_id: NodeId, size: Size },
}

/// What an applied command changed
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    NodeAdded(NodeId),
    NodeRemoved(RemovedNode),
    Connected(Connection),
    Disconnected(GraphEdge),
    ConfigUpdated,
    NodeMoved,
    NodeResized,
}

/// Nodes and edges of one workflow
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    id: String,
    name: String,
    registry: Arc<NodeRegistry>,
    config: EngineConfig,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl WorkflowGraph {
    /// Create an empty graph backed by `registry`
    pub fn new(id: impl Into<String>, name: impl Into<String>, registry: Arc<NodeRegistry>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            registry,
            config: EngineConfig::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Rebuild a graph from a persisted document.
    ///
    /// The document is validated first; run status is reset to idle while
    /// previously produced outputs are kept.
    pub fn from_document(
        document: &WorkflowDocument,
        registry: Arc<NodeRegistry>,
        config: EngineConfig,
    ) -> Result<Self> {
        let errors = validate_document(document, &registry);
        if !errors.is_empty() {
            log::warn!(
                "Rejected workflow document '{}' with {} problem(s)",
                document.id,
                errors.len()
            );
            return Err(FlowError::InvalidDocument(errors));
        }

        let nodes = document
            .nodes
            .iter()
            .cloned()
            .map(|mut node| {
                node.status = NodeStatus::Idle;
                node.error = None;
                node
            })
            .collect();

        Ok(Self {
            id: document.id.clone(),
            name: document.name.clone(),
            registry,
            config,
            nodes,
            edges: document.edges.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Find a node by ID
    pub fn node(&self, node_id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    pub(crate) fn node_mut(&mut self, node_id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == node_id)
    }

    fn require_node_mut(&mut self, node_id: &str) -> Result<&mut GraphNode> {
        self.node_mut(node_id)
            .ok_or_else(|| FlowError::NodeNotFound(node_id.to_string()))
    }

    /// Find an edge by ID
    pub fn edge(&self, edge_id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.id == edge_id)
    }

    /// The registered definition behind a node
    pub fn definition_of(&self, node_id: &str) -> Result<&NodeDefinition> {
        let node = self
            .node(node_id)
            .ok_or_else(|| FlowError::NodeNotFound(node_id.to_string()))?;
        self.registry
            .get(&node.node_type)
            .ok_or_else(|| FlowError::UnknownNodeType(node.node_type.clone()))
    }

    /// Place a new node of `node_type` with a generated id
    pub fn add_node(&mut self, node_type: &str, position: Point) -> Result<&GraphNode> {
        let id = format!("node-{}", uuid::Uuid::new_v4());
        self.add_node_with_id(id, node_type, position)
    }

    /// Place a new node under a caller-chosen id.
    ///
    /// The node starts idle with no outputs and a copy of the definition's
    /// default config.
    pub fn add_node_with_id(
        &mut self,
        id: impl Into<NodeId>,
        node_type: &str,
        position: Point,
    ) -> Result<&GraphNode> {
        let id = id.into();
        let definition = self
            .registry
            .get(node_type)
            .ok_or_else(|| FlowError::UnknownNodeType(node_type.to_string()))?;
        if self.node(&id).is_some() {
            return Err(FlowError::DuplicateNodeId(id));
        }

        let node = GraphNode {
            id,
            node_type: node_type.to_string(),
            config: definition.default_config().clone(),
            status: NodeStatus::Idle,
            output_values: NodeOutputs::new(),
            error: None,
            position,
            size: self.config.default_node_size,
        };
        log::debug!("Added node '{}' of type '{}'", node.id, node.node_type);
        self.nodes.push(node);
        Ok(&self.nodes[self.nodes.len() - 1])
    }

    /// Connect an output socket to an input socket.
    ///
    /// If the input already has a producer, that edge is replaced and
    /// returned in [`Connection::replaced`].
    pub fn add_edge(
        &mut self,
        source: &str,
        source_socket: &str,
        target: &str,
        target_socket: &str,
    ) -> Result<Connection> {
        let source_def = self.definition_of(source)?;
        let target_def = self.definition_of(target)?;
        if source == target {
            return Err(FlowError::SelfConnection(source.to_string()));
        }

        let output = source_def
            .socket(SocketDirection::Output, source_socket)
            .ok_or_else(|| FlowError::SocketNotFound {
                node_id: source.to_string(),
                direction: SocketDirection::Output,
                socket_id: source_socket.to_string(),
            })?;
        let input = target_def
            .socket(SocketDirection::Input, target_socket)
            .ok_or_else(|| FlowError::SocketNotFound {
                node_id: target.to_string(),
                direction: SocketDirection::Input,
                socket_id: target_socket.to_string(),
            })?;
        if !is_compatible(output.socket_type, input.socket_type) {
            return Err(FlowError::IncompatibleSockets {
                source_type: output.socket_type,
                target_type: input.socket_type,
            });
        }

        let replaced = self.disconnect(target, target_socket);
        if let Some(old) = &replaced {
            log::debug!(
                "Replacing edge '{}' into {}.{}",
                old.id,
                target,
                target_socket
            );
        }

        let edge = GraphEdge {
            id: format!("edge-{}", uuid::Uuid::new_v4()),
            source: source.to_string(),
            source_socket: source_socket.to_string(),
            target: target.to_string(),
            target_socket: target_socket.to_string(),
        };
        self.edges.push(edge.clone());
        Ok(Connection { edge, replaced })
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, node_id: &str) -> Result<RemovedNode> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == node_id)
            .ok_or_else(|| FlowError::NodeNotFound(node_id.to_string()))?;

        let (edges, kept): (Vec<GraphEdge>, Vec<GraphEdge>) = std::mem::take(&mut self.edges)
            .into_iter()
            .partition(|e| e.touches(node_id));
        self.edges = kept;
        let node = self.nodes.remove(index);

        log::debug!("Removed node '{}' and {} edge(s)", node_id, edges.len());
        Ok(RemovedNode { node, edges })
    }

    /// Remove an edge by ID
    pub fn remove_edge(&mut self, edge_id: &str) -> Result<GraphEdge> {
        let index = self
            .edges
            .iter()
            .position(|e| e.id == edge_id)
            .ok_or_else(|| FlowError::EdgeNotFound(edge_id.to_string()))?;
        Ok(self.edges.remove(index))
    }

    /// Remove whatever edge feeds the given input socket
    pub fn disconnect(&mut self, target: &str, target_socket: &str) -> Option<GraphEdge> {
        let index = self
            .edges
            .iter()
            .position(|e| e.feeds(target, target_socket))?;
        Some(self.edges.remove(index))
    }

    /// Shallow-merge `patch` into the node's config.
    ///
    /// Status and outputs are left alone; re-running is a separate action.
    pub fn update_config(&mut self, node_id: &str, patch: NodeConfig) -> Result<()> {
        let node = self.require_node_mut(node_id)?;
        node.config.extend(patch);
        Ok(())
    }

    pub fn move_node(&mut self, node_id: &str, position: Point) -> Result<()> {
        self.require_node_mut(node_id)?.position = position;
        Ok(())
    }

    pub fn resize_node(&mut self, node_id: &str, size: Size) -> Result<()> {
        self.require_node_mut(node_id)?.size = size;
        Ok(())
    }

    /// Single mutation entry point for command messages
    pub fn apply(&mut self, command: GraphCommand) -> Result<CommandOutcome> {
        log::trace!("Applying {:?}", command);
        match command {
            GraphCommand::AddNode {
                node_type,
                position,
            } => {
                let node = self.add_node(&node_type, position)?;
                Ok(CommandOutcome::NodeAdded(node.id.clone()))
            }
            GraphCommand::RemoveNode { node_id } => {
                self.remove_node(&node_id).map(CommandOutcome::NodeRemoved)
            }
            GraphCommand::Connect {
                source,
                source_socket,
                target,
                target_socket,
            } => self
                .add_edge(&source, &source_socket, &target, &target_socket)
                .map(CommandOutcome::Connected),
            GraphCommand::Disconnect { edge_id } => {
                self.remove_edge(&edge_id).map(CommandOutcome::Disconnected)
            }
            GraphCommand::UpdateConfig { node_id, patch } => {
                self.update_config(&node_id, patch)?;
                Ok(CommandOutcome::ConfigUpdated)
            }
            GraphCommand::MoveNode { node_id, position } => {
                self.move_node(&node_id, position)?;
                Ok(CommandOutcome::NodeMoved)
            }
            GraphCommand::ResizeNode { node_id, size } => {
                self.resize_node(&node_id, size)?;
                Ok(CommandOutcome::NodeResized)
            }
        }
    }

    /// Return nodes to idle and forget their outputs and errors.
    ///
    /// Unknown ids are ignored.
    pub fn reset_status<S: AsRef<str>>(&mut self, node_ids: &[S]) {
        for node_id in node_ids {
            if let Some(node) = self.node_mut(node_id.as_ref()) {
                node.status = NodeStatus::Idle;
                node.output_values.clear();
                node.error = None;
            }
        }
    }

    /// Reset every node
    pub fn reset_all(&mut self) {
        for node in &mut self.nodes {
            node.status = NodeStatus::Idle;
            node.output_values.clear();
            node.error = None;
        }
    }

    /// Edges feeding the node's inputs
    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Edges leaving the node's outputs
    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Distinct nodes this node reads from
    pub fn dependencies(&self, node_id: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.edges
            .iter()
            .filter(|e| e.target == node_id)
            .map(|e| e.source.as_str())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Distinct nodes reading from this node
    pub fn dependents(&self, node_id: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.edges
            .iter()
            .filter(|e| e.source == node_id)
            .map(|e| e.target.as_str())
            .filter(|id| seen.insert(*id))
            .collect()
    }
}
