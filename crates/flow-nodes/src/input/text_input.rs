//! Text Input Node
//!
//! Provides prompt text typed into the node, or passes through text from an
//! upstream node when its input is connected.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{
    Describe, ExecutionContext, NodeCategory, NodeConfig, NodeDefinition, NodeDescriptor,
    NodeError, NodeExecutor, NodeInputs, NodeOutputs, SocketDefinition, SocketType, ValueMapExt,
};
use serde_json::json;

/// Text Input Node
///
/// # Inputs
/// - `text` (optional) - Upstream text; wins over the configured text
///
/// # Config
/// - `text` - The text typed into the node (default: empty)
///
/// # Outputs
/// - `text` - The resulting text
#[derive(Debug, Clone, Copy, Default)]
pub struct TextInputNode;

impl TextInputNode {
    /// Socket ID for the text input and output
    pub const SOCKET_TEXT: &'static str = "text";
    /// Config key holding the typed text
    pub const CONFIG_TEXT: &'static str = "text";

    pub fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::descriptor(), Arc::new(Self))
    }
}

impl Describe for TextInputNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new("text-input", NodeCategory::Input, "Text Input")
            .description("Provides text input to the workflow")
            .input(SocketDefinition::optional(Self::SOCKET_TEXT, "Text", SocketType::Text))
            .output(SocketDefinition::required(Self::SOCKET_TEXT, "Text", SocketType::Text))
            .default_value(Self::CONFIG_TEXT, json!(""))
    }
}

inventory::submit!(flow_engine::DefinitionFn(TextInputNode::definition));

#[async_trait]
impl NodeExecutor for TextInputNode {
    async fn execute(
        &self,
        inputs: NodeInputs,
        config: NodeConfig,
        _ctx: &ExecutionContext,
    ) -> Result<NodeOutputs, NodeError> {
        let text = inputs
            .get_string_opt(Self::SOCKET_TEXT)
            .or_else(|| config.get_string_opt(Self::CONFIG_TEXT))
            .unwrap_or_default();

        log::debug!("TextInputNode: providing {} chars", text.len());

        let mut outputs = NodeOutputs::new();
        outputs.insert(Self::SOCKET_TEXT.to_string(), json!(text));
        Ok(outputs)
    }
}
