//! Node descriptor trait and metadata types
//!
//! A `NodeDescriptor` is the serializable half of a node definition: the
//! type name, palette metadata, socket layout and default configuration.
//! Node implementations provide it through the `Describe` trait so the same
//! type defines both its behavior and its metadata.

use serde::{Deserialize, Serialize};

use crate::types::{NodeCategory, NodeConfig, SocketDefinition, SocketDirection, SocketValue};

/// Trait for node implementations that describe their own metadata
///
/// # Example
///
/// ```ignore
/// impl Describe for PromptNode {
///     fn descriptor() -> NodeDescriptor {
///         NodeDescriptor::new("text-input", NodeCategory::Input, "Prompt")
///             .output(SocketDefinition::required("text", "Text", SocketType::Text))
///             .default_value("text", serde_json::json!(""))
///     }
/// }
/// ```
pub trait Describe {
    /// Get the static metadata for this node type
    fn descriptor() -> NodeDescriptor
    where
        Self: Sized;
}

/// Complete metadata for a node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    /// Unique type identifier (e.g., "image-generation")
    pub node_type: String,
    /// Category for palette grouping
    pub category: NodeCategory,
    /// Human-readable label
    pub label: String,
    /// Description of what the node does
    #[serde(default)]
    pub description: String,
    /// Input socket definitions
    pub inputs: Vec<SocketDefinition>,
    /// Output socket definitions
    pub outputs: Vec<SocketDefinition>,
    /// Configuration a new instance starts with
    #[serde(default)]
    pub default_config: NodeConfig,
}

impl NodeDescriptor {
    /// Start a descriptor with no sockets and an empty default config
    pub fn new(node_type: impl Into<String>, category: NodeCategory, label: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            category,
            label: label.into(),
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            default_config: NodeConfig::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append an input socket
    pub fn input(mut self, socket: SocketDefinition) -> Self {
        self.inputs.push(socket);
        self
    }

    /// Append an output socket
    pub fn output(mut self, socket: SocketDefinition) -> Self {
        self.outputs.push(socket);
        self
    }

    /// Set one default configuration entry
    pub fn default_value(mut self, key: impl Into<String>, value: SocketValue) -> Self {
        self.default_config.insert(key.into(), value);
        self
    }

    /// Sockets declared for one direction
    pub fn sockets(&self, direction: SocketDirection) -> &[SocketDefinition] {
        match direction {
            SocketDirection::Input => &self.inputs,
            SocketDirection::Output => &self.outputs,
        }
    }

    /// Find a socket by direction and id
    pub fn socket(&self, direction: SocketDirection, id: &str) -> Option<&SocketDefinition> {
        self.sockets(direction).iter().find(|s| s.id == id)
    }

    /// First socket id that appears twice in `direction`, if any
    pub fn duplicate_socket(&self, direction: SocketDirection) -> Option<&str> {
        let sockets = self.sockets(direction);
        sockets
            .iter()
            .enumerate()
            .find(|(i, s)| sockets[..*i].iter().any(|earlier| earlier.id == s.id))
            .map(|(_, s)| s.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SocketType;

    fn prompt_descriptor() -> NodeDescriptor {
        NodeDescriptor::new("text-input", NodeCategory::Input, "Prompt")
            .description("Provides prompt text")
            .output(SocketDefinition::required("text", "Text", SocketType::Text))
            .default_value("text", serde_json::json!(""))
    }

    #[test]
    fn test_socket_lookup() {
        let descriptor = prompt_descriptor();
        assert!(descriptor.socket(SocketDirection::Output, "text").is_some());
        assert!(descriptor.socket(SocketDirection::Input, "text").is_none());
        assert_eq!(descriptor.default_config.get("text"), Some(&serde_json::json!("")));
    }

    #[test]
    fn test_duplicate_socket_detection() {
        let descriptor = prompt_descriptor()
            .input(SocketDefinition::optional("a", "A", SocketType::Text))
            .input(SocketDefinition::optional("b", "B", SocketType::Text))
            .input(SocketDefinition::optional("a", "A again", SocketType::Number));
        assert_eq!(descriptor.duplicate_socket(SocketDirection::Input), Some("a"));
        assert_eq!(descriptor.duplicate_socket(SocketDirection::Output), None);
    }

    #[test]
    fn test_descriptor_serialization() {
        let json = serde_json::to_string(&prompt_descriptor()).unwrap();
        assert!(json.contains("nodeType")); // camelCase
        assert!(json.contains("defaultConfig"));
        assert!(json.contains("\"socketType\":\"text\""));
    }
}
