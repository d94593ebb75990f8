//! Input resolution
//!
//! An input socket's value is whatever its single producer currently holds
//! in `output_values`. Absence (no edge, producer not run yet) is a normal
//! state, not an error.

use crate::graph::WorkflowGraph;
use crate::types::{NodeInputs, SocketValue};

impl WorkflowGraph {
    /// Current value feeding `socket_id` on `node_id`, if any
    pub fn resolve_input(&self, node_id: &str, socket_id: &str) -> Option<&SocketValue> {
        let edge = self.edges().iter().find(|e| e.feeds(node_id, socket_id))?;
        self.node(&edge.source)?
            .output_values
            .get(&edge.source_socket)
    }

    /// Resolve every declared input of a node.
    ///
    /// Unresolved sockets are left out of the map; the executor decides
    /// whether that is fatal.
    pub fn resolve_inputs(&self, node_id: &str) -> NodeInputs {
        let Ok(definition) = self.definition_of(node_id) else {
            return NodeInputs::new();
        };
        definition
            .inputs()
            .iter()
            .filter_map(|socket| {
                self.resolve_input(node_id, &socket.id)
                    .map(|value| (socket.id.clone(), value.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::geometry::Point;
    use crate::graph::tests::test_registry;
    use crate::graph::WorkflowGraph;
    use serde_json::json;

    #[test]
    fn test_resolve_input() {
        let mut graph = WorkflowGraph::new("wf", "Test", test_registry());
        graph.add_node_with_id("a", "text", Point::default()).unwrap();
        graph
            .add_node_with_id("sink", "image-sink", Point::default())
            .unwrap();

        // No edge
        assert!(graph.resolve_input("sink", "caption").is_none());

        // Edge, but the producer has not run
        graph.add_edge("a", "text", "sink", "caption").unwrap();
        assert!(graph.resolve_input("sink", "caption").is_none());
        assert!(graph.resolve_inputs("sink").is_empty());

        graph
            .node_mut("a")
            .unwrap()
            .output_values
            .insert("text".into(), json!("a cat"));
        assert_eq!(graph.resolve_input("sink", "caption"), Some(&json!("a cat")));

        let inputs = graph.resolve_inputs("sink");
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs["caption"], json!("a cat"));
        assert!(!inputs.contains_key("image"));
    }

    #[test]
    fn test_resolve_unknown_node() {
        let graph = WorkflowGraph::new("wf", "Test", test_registry());
        assert!(graph.resolve_input("ghost", "in").is_none());
        assert!(graph.resolve_inputs("ghost").is_empty());
    }
}
