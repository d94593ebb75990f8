//! Error types for the flow engine

use thiserror::Error;

use crate::types::{NodeId, SocketDirection, SocketType};

/// Result type alias using FlowError
pub type Result<T> = std::result::Result<T, FlowError>;

/// Structural errors raised by the registry, graph model and engine.
///
/// All of these are returned before any graph mutation takes place.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A node type was registered twice
    #[error("Node type '{0}' is already registered")]
    DuplicateNodeType(String),

    /// A definition declares the same socket id twice in one direction
    #[error("Node type '{node_type}' declares {direction} socket '{socket_id}' more than once")]
    DuplicateSocket {
        node_type: String,
        direction: SocketDirection,
        socket_id: String,
    },

    /// Node creation references a type missing from the registry
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// No node with this id exists in the graph
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A node with this id already exists in the graph
    #[error("Node id already in use: {0}")]
    DuplicateNodeId(NodeId),

    /// No edge with this id exists in the graph
    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    /// No group with this id exists in the layer
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    /// The node's definition has no socket with this id
    #[error("Node '{node_id}' has no {direction} socket '{socket_id}'")]
    SocketNotFound {
        node_id: NodeId,
        direction: SocketDirection,
        socket_id: String,
    },

    /// Output and input socket types cannot be connected
    #[error("Cannot connect {source_type} output to {target_type} input")]
    IncompatibleSockets {
        source_type: SocketType,
        target_type: SocketType,
    },

    /// Edge would connect a node to itself
    #[error("Cannot connect node '{0}' to itself")]
    SelfConnection(NodeId),

    /// An input socket already has a producer
    #[error("Input '{socket_id}' on node '{node_id}' already has an incoming edge")]
    DuplicateInput { node_id: NodeId, socket_id: String },

    /// The requested run contains a dependency cycle
    #[error("Cycle detected between nodes: {}", .nodes.join(", "))]
    GraphCycle { nodes: Vec<NodeId> },

    /// A persisted document failed validation
    #[error("Invalid workflow document: {}", format_validation(.0))]
    InvalidDocument(Vec<crate::validation::ValidationError>),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_validation(errors: &[crate::validation::ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors returned by node executors.
///
/// These are recorded on the failing node and reported in the run summary;
/// they never abort the run as a whole.
#[derive(Debug, Clone, Error)]
pub enum NodeError {
    /// Missing required input
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// Invalid input type
    #[error("Invalid input type for '{port}': expected {expected}")]
    InvalidInputType { port: String, expected: String },

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidConfig { key: String, message: String },

    /// Execution failed
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// The generation backend rejected or failed the request
    #[error("Backend error: {0}")]
    Backend(String),

    /// The run was cancelled while this executor was in flight
    #[error("Execution cancelled")]
    Cancelled,
}

impl NodeError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Whether this error stems from cancellation rather than a fault
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
