//! Core types for workflow graphs
//!
//! These types define the structure of workflow graphs: socket types,
//! node instances, edges and the value maps that flow between them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NodeError;
use crate::geometry::{Point, Rect, Size};

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Unique identifier for a socket, scoped to a node definition and direction
pub type SocketId = String;

/// A value that flows through a socket
pub type SocketValue = serde_json::Value;

/// Resolved inputs handed to an executor; unresolved sockets are absent
pub type NodeInputs = HashMap<SocketId, SocketValue>;

/// Outputs produced by an executor, keyed by output socket id
pub type NodeOutputs = HashMap<SocketId, SocketValue>;

/// Per-instance configuration of a node
pub type NodeConfig = HashMap<String, SocketValue>;

/// The data kind carried by a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketType {
    /// Accepts or produces anything
    Any,
    /// Image reference (URL or data URI)
    Image,
    /// Text string
    Text,
    /// Numeric value
    Number,
    /// Boolean value
    Boolean,
}

impl SocketType {
    /// Check whether an output of this type may feed an input of `input` type
    pub fn is_compatible_with(&self, input: &SocketType) -> bool {
        is_compatible(*self, *input)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SocketType::Any => "any",
            SocketType::Image => "image",
            SocketType::Text => "text",
            SocketType::Number => "number",
            SocketType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compatibility between an output socket type and an input socket type.
///
/// Evaluated once when an edge is created, never again per run.
pub fn is_compatible(output: SocketType, input: SocketType) -> bool {
    output == SocketType::Any || input == SocketType::Any || output == input
}

/// Whether a socket consumes or produces values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketDirection {
    Input,
    Output,
}

impl fmt::Display for SocketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketDirection::Input => f.write_str("input"),
            SocketDirection::Output => f.write_str("output"),
        }
    }
}

/// Definition of a socket (input or output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketDefinition {
    /// Identifier, unique within its node definition and direction
    pub id: SocketId,
    /// Human-readable label
    pub label: String,
    /// Data kind of the socket
    pub socket_type: SocketType,
    /// Whether the executor needs this input to do useful work.
    /// The engine passes missing inputs through regardless.
    pub required: bool,
}

impl SocketDefinition {
    /// Create a required socket
    pub fn required(id: impl Into<String>, label: impl Into<String>, socket_type: SocketType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            socket_type,
            required: true,
        }
    }

    /// Create an optional socket
    pub fn optional(id: impl Into<String>, label: impl Into<String>, socket_type: SocketType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            socket_type,
            required: false,
        }
    }
}

/// Category of a node, used for palette grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Input nodes (prompt text, numbers, uploaded images)
    Input,
    /// Output nodes (previews, exports)
    Output,
    /// Processing nodes (generation, text transforms)
    Processing,
}

/// Run status of a node instance
///
/// `Idle -> Running -> {Success, Error}`; `Running -> Idle` only through
/// cancellation; any terminal state may go back to `Running` on re-trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Success,
    Error,
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeStatus::Success | NodeStatus::Error)
    }
}

/// A node instance in a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// Node type (references a registered definition)
    pub node_type: String,
    /// Instance configuration, seeded from the definition's defaults
    #[serde(default)]
    pub config: NodeConfig,
    /// Status of the most recent run
    #[serde(default)]
    pub status: NodeStatus,
    /// Output values produced by the most recent successful run
    #[serde(default)]
    pub output_values: NodeOutputs,
    /// Message of the last executor failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Top-left corner on the canvas
    pub position: Point,
    /// Box size on the canvas
    pub size: Size,
}

impl GraphNode {
    /// Canvas box covered by this node
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    /// Center point, used for group membership
    pub fn center(&self) -> Point {
        self.bounds().center()
    }
}

/// A directed edge from an output socket to an input socket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Output socket on the source node
    pub source_socket: SocketId,
    /// Target node ID
    pub target: NodeId,
    /// Input socket on the target node
    pub target_socket: SocketId,
}

impl GraphEdge {
    /// Whether this edge touches the given node on either end
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    /// Whether this edge terminates at the given input socket
    pub fn feeds(&self, node_id: &str, socket_id: &str) -> bool {
        self.target == node_id && self.target_socket == socket_id
    }
}

/// Helper trait for extracting typed values from inputs and config maps
pub trait ValueMapExt {
    /// Get a required string value
    fn get_string(&self, key: &str) -> Result<&str, NodeError>;

    /// Get an optional string value
    fn get_string_opt(&self, key: &str) -> Option<&str>;

    /// Get a required number value
    fn get_number(&self, key: &str) -> Result<f64, NodeError>;

    /// Get an optional number value with default
    fn get_number_or(&self, key: &str, default: f64) -> f64;

    /// Get an optional boolean value with default
    fn get_bool_or(&self, key: &str, default: bool) -> bool;
}

impl ValueMapExt for HashMap<String, SocketValue> {
    fn get_string(&self, key: &str) -> Result<&str, NodeError> {
        match self.get(key) {
            None | Some(SocketValue::Null) => Err(NodeError::MissingInput(key.to_string())),
            Some(value) => value.as_str().ok_or_else(|| NodeError::InvalidInputType {
                port: key.to_string(),
                expected: "string".to_string(),
            }),
        }
    }

    fn get_string_opt(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    fn get_number(&self, key: &str) -> Result<f64, NodeError> {
        match self.get(key) {
            None | Some(SocketValue::Null) => Err(NodeError::MissingInput(key.to_string())),
            Some(value) => value.as_f64().ok_or_else(|| NodeError::InvalidInputType {
                port: key.to_string(),
                expected: "number".to_string(),
            }),
        }
    }

    fn get_number_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
    }

    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALL: [SocketType; 5] = [
        SocketType::Any,
        SocketType::Image,
        SocketType::Text,
        SocketType::Number,
        SocketType::Boolean,
    ];

    #[test]
    fn test_socket_type_compatibility() {
        for output in ALL {
            for input in ALL {
                let expected =
                    output == input || output == SocketType::Any || input == SocketType::Any;
                assert_eq!(
                    is_compatible(output, input),
                    expected,
                    "{} -> {}",
                    output,
                    input
                );
            }
        }
        assert!(SocketType::Any.is_compatible_with(&SocketType::Image));
        assert!(SocketType::Text.is_compatible_with(&SocketType::Any));
        assert!(!SocketType::Number.is_compatible_with(&SocketType::Text));
    }

    #[test]
    fn test_socket_type_serialization() {
        assert_eq!(serde_json::to_string(&SocketType::Image).unwrap(), "\"image\"");
        let parsed: SocketType = serde_json::from_str("\"boolean\"").unwrap();
        assert_eq!(parsed, SocketType::Boolean);
    }

    #[test]
    fn test_node_center() {
        let node = GraphNode {
            id: "n".into(),
            node_type: "text-input".into(),
            config: NodeConfig::new(),
            status: NodeStatus::Idle,
            output_values: NodeOutputs::new(),
            error: None,
            position: Point::new(10.0, 20.0),
            size: Size::new(200.0, 100.0),
        };
        assert_eq!(node.center(), Point::new(110.0, 70.0));
    }

    #[test]
    fn test_value_map_ext() {
        let mut inputs = NodeInputs::new();
        inputs.insert("prompt".into(), json!("a cat"));
        inputs.insert("seed".into(), json!(42));
        inputs.insert("empty".into(), SocketValue::Null);

        assert_eq!(inputs.get_string("prompt").unwrap(), "a cat");
        assert!(matches!(inputs.get_string("missing"), Err(NodeError::MissingInput(_))));
        assert!(matches!(inputs.get_string("empty"), Err(NodeError::MissingInput(_))));
        assert!(matches!(
            inputs.get_string("seed"),
            Err(NodeError::InvalidInputType { .. })
        ));
        assert_eq!(inputs.get_number("seed").unwrap(), 42.0);
        assert_eq!(inputs.get_number_or("missing", 7.0), 7.0);
        assert!(inputs.get_bool_or("missing", true));
    }
}
