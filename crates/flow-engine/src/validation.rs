//! Validation of persisted workflow documents
//!
//! Documents come from storage and may have been produced by an older
//! build or edited by hand, so every rule the graph model enforces on
//! mutation is re-checked here. All problems are collected, not just the
//! first.

use std::collections::{HashMap, HashSet};

use crate::document::WorkflowDocument;
use crate::registry::NodeRegistry;
use crate::types::{is_compatible, SocketDirection, SocketType};

/// Validation error with location context
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Two nodes share an id
    DuplicateNodeId { node_id: String },
    /// Two edges share an id
    DuplicateEdgeId { edge_id: String },
    /// Two groups share an id
    DuplicateGroupId { group_id: String },
    /// A node has an unknown type (not in registry)
    UnknownNodeType { node_id: String, node_type: String },
    /// An edge references a non-existent node
    UnknownNode { edge_id: String, node_id: String },
    /// An edge references a socket its node's definition does not declare
    UnknownSocket {
        edge_id: String,
        node_id: String,
        direction: SocketDirection,
        socket_id: String,
    },
    /// An edge connects incompatible socket types
    IncompatibleSockets {
        edge_id: String,
        source_type: SocketType,
        target_type: SocketType,
    },
    /// An edge starts and ends on the same node
    SelfLoop { edge_id: String, node_id: String },
    /// More than one edge terminates at the same input socket
    DuplicateInput {
        node_id: String,
        socket_id: String,
        edge_ids: Vec<String>,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateNodeId { node_id } => write!(f, "Duplicate node id '{}'", node_id),
            Self::DuplicateEdgeId { edge_id } => write!(f, "Duplicate edge id '{}'", edge_id),
            Self::DuplicateGroupId { group_id } => write!(f, "Duplicate group id '{}'", group_id),
            Self::UnknownNodeType { node_id, node_type } => {
                write!(f, "Unknown node type '{}' for node '{}'", node_type, node_id)
            }
            Self::UnknownNode { edge_id, node_id } => {
                write!(f, "Edge '{}' references unknown node '{}'", edge_id, node_id)
            }
            Self::UnknownSocket {
                edge_id,
                node_id,
                direction,
                socket_id,
            } => {
                write!(
                    f,
                    "Edge '{}' references unknown {} socket '{}' on node '{}'",
                    edge_id, direction, socket_id, node_id
                )
            }
            Self::IncompatibleSockets {
                edge_id,
                source_type,
                target_type,
            } => {
                write!(
                    f,
                    "Edge '{}' connects incompatible types: {} -> {}",
                    edge_id, source_type, target_type
                )
            }
            Self::SelfLoop { edge_id, node_id } => {
                write!(f, "Edge '{}' connects node '{}' to itself", edge_id, node_id)
            }
            Self::DuplicateInput {
                node_id,
                socket_id,
                edge_ids,
            } => {
                write!(
                    f,
                    "Input '{}' on node '{}' has {} producers ({})",
                    socket_id,
                    node_id,
                    edge_ids.len(),
                    edge_ids.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a workflow document against a registry
///
/// Returns all validation errors found (not just the first). Cycles are
/// not an error here: they are reported when a run is requested.
pub fn validate_document(
    document: &WorkflowDocument,
    registry: &NodeRegistry,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_unique_ids(document, &mut errors);
    validate_node_types(document, registry, &mut errors);
    validate_edges(document, registry, &mut errors);
    validate_single_producer(document, &mut errors);

    errors
}

fn validate_unique_ids(document: &WorkflowDocument, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for node in &document.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }

    let mut seen = HashSet::new();
    for edge in &document.edges {
        if !seen.insert(edge.id.as_str()) {
            errors.push(ValidationError::DuplicateEdgeId {
                edge_id: edge.id.clone(),
            });
        }
    }

    let mut seen = HashSet::new();
    for group in &document.groups {
        if !seen.insert(group.id.as_str()) {
            errors.push(ValidationError::DuplicateGroupId {
                group_id: group.id.clone(),
            });
        }
    }
}

/// Check that all nodes have known types in the registry
fn validate_node_types(
    document: &WorkflowDocument,
    registry: &NodeRegistry,
    errors: &mut Vec<ValidationError>,
) {
    for node in &document.nodes {
        if !registry.has_node_type(&node.node_type) {
            errors.push(ValidationError::UnknownNodeType {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            });
        }
    }
}

/// Check endpoints, sockets and socket compatibility of every edge
fn validate_edges(
    document: &WorkflowDocument,
    registry: &NodeRegistry,
    errors: &mut Vec<ValidationError>,
) {
    let node_types: HashMap<&str, &str> = document
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.node_type.as_str()))
        .collect();

    for edge in &document.edges {
        if edge.source == edge.target {
            errors.push(ValidationError::SelfLoop {
                edge_id: edge.id.clone(),
                node_id: edge.source.clone(),
            });
        }

        let mut endpoint_type = |node_id: &str, socket_id: &str, direction: SocketDirection| {
            let Some(node_type) = node_types.get(node_id) else {
                errors.push(ValidationError::UnknownNode {
                    edge_id: edge.id.clone(),
                    node_id: node_id.to_string(),
                });
                return None;
            };
            // Unknown types are already reported per node
            let definition = registry.get(node_type)?;
            match definition.socket(direction, socket_id) {
                Some(socket) => Some(socket.socket_type),
                None => {
                    errors.push(ValidationError::UnknownSocket {
                        edge_id: edge.id.clone(),
                        node_id: node_id.to_string(),
                        direction,
                        socket_id: socket_id.to_string(),
                    });
                    None
                }
            }
        };

        let source_type = endpoint_type(&edge.source, &edge.source_socket, SocketDirection::Output);
        let target_type = endpoint_type(&edge.target, &edge.target_socket, SocketDirection::Input);

        if let (Some(source_type), Some(target_type)) = (source_type, target_type) {
            if !is_compatible(source_type, target_type) {
                errors.push(ValidationError::IncompatibleSockets {
                    edge_id: edge.id.clone(),
                    source_type,
                    target_type,
                });
            }
        }
    }
}

/// Check that every input socket has at most one producer
fn validate_single_producer(document: &WorkflowDocument, errors: &mut Vec<ValidationError>) {
    let mut producers: Vec<((&str, &str), Vec<String>)> = Vec::new();
    for edge in &document.edges {
        let key = (edge.target.as_str(), edge.target_socket.as_str());
        match producers.iter_mut().find(|(k, _)| *k == key) {
            Some((_, edge_ids)) => edge_ids.push(edge.id.clone()),
            None => producers.push((key, vec![edge.id.clone()])),
        }
    }

    for ((node_id, socket_id), edge_ids) in producers {
        if edge_ids.len() > 1 {
            errors.push(ValidationError::DuplicateInput {
                node_id: node_id.to_string(),
                socket_id: socket_id.to_string(),
                edge_ids,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::NodeDescriptor;
    use crate::geometry::{Point, Size};
    use crate::registry::NodeDefinition;
    use crate::types::{GraphEdge, GraphNode, NodeCategory, SocketDefinition};

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry
            .register(NodeDefinition::from_fn(
                NodeDescriptor::new("text", NodeCategory::Input, "Text")
                    .output(SocketDefinition::required("text", "Text", SocketType::Text)),
                |_, _, _| async { Ok::<_, crate::error::NodeError>(Default::default()) },
            ))
            .unwrap();
        registry
            .register(NodeDefinition::from_fn(
                NodeDescriptor::new("preview", NodeCategory::Output, "Preview")
                    .input(SocketDefinition::required("image", "Image", SocketType::Image))
                    .input(SocketDefinition::optional("caption", "Caption", SocketType::Text)),
                |_, _, _| async { Ok::<_, crate::error::NodeError>(Default::default()) },
            ))
            .unwrap();
        registry
    }

    fn node(id: &str, node_type: &str) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            node_type: node_type.to_string(),
            config: Default::default(),
            status: Default::default(),
            output_values: Default::default(),
            error: None,
            position: Point::default(),
            size: Size::new(200.0, 100.0),
        }
    }

    fn edge(id: &str, source: &str, source_socket: &str, target: &str, target_socket: &str) -> GraphEdge {
        GraphEdge {
            id: id.to_string(),
            source: source.to_string(),
            source_socket: source_socket.to_string(),
            target: target.to_string(),
            target_socket: target_socket.to_string(),
        }
    }

    fn document(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> WorkflowDocument {
        WorkflowDocument {
            id: "wf".to_string(),
            name: "Test".to_string(),
            nodes,
            edges,
            groups: Vec::new(),
        }
    }

    #[test]
    fn test_valid_document() {
        let doc = document(
            vec![node("t", "text"), node("p", "preview")],
            vec![edge("e1", "t", "text", "p", "caption")],
        );
        assert!(validate_document(&doc, &registry()).is_empty());
    }

    #[test]
    fn test_collects_all_errors() {
        let doc = document(
            vec![node("t", "text"), node("p", "preview"), node("x", "mystery")],
            vec![
                edge("e1", "t", "text", "p", "image"),
                edge("e2", "t", "text", "ghost", "caption"),
                edge("e3", "t", "nope", "p", "caption"),
            ],
        );
        let errors = validate_document(&doc, &registry());

        assert!(errors.contains(&ValidationError::UnknownNodeType {
            node_id: "x".into(),
            node_type: "mystery".into(),
        }));
        assert!(errors.contains(&ValidationError::IncompatibleSockets {
            edge_id: "e1".into(),
            source_type: SocketType::Text,
            target_type: SocketType::Image,
        }));
        assert!(errors.contains(&ValidationError::UnknownNode {
            edge_id: "e2".into(),
            node_id: "ghost".into(),
        }));
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::UnknownSocket { edge_id, direction: SocketDirection::Output, .. } if edge_id == "e3"
        )));
    }

    #[test]
    fn test_duplicate_input_and_self_loop() {
        let doc = document(
            vec![node("a", "text"), node("b", "text"), node("p", "preview")],
            vec![
                edge("e1", "a", "text", "p", "caption"),
                edge("e2", "b", "text", "p", "caption"),
                edge("e3", "p", "image", "p", "image"),
            ],
        );
        let errors = validate_document(&doc, &registry());

        assert!(errors.contains(&ValidationError::DuplicateInput {
            node_id: "p".into(),
            socket_id: "caption".into(),
            edge_ids: vec!["e1".into(), "e2".into()],
        }));
        assert!(errors.contains(&ValidationError::SelfLoop {
            edge_id: "e3".into(),
            node_id: "p".into(),
        }));
    }

    #[test]
    fn test_duplicate_ids() {
        let doc = document(vec![node("a", "text"), node("a", "text")], vec![]);
        let errors = validate_document(&doc, &registry());
        assert_eq!(
            errors,
            vec![ValidationError::DuplicateNodeId { node_id: "a".into() }]
        );
    }
}
