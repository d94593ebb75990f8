//! Prompt Combine Node
//!
//! Joins a subject with optional style and detail fragments into a single
//! generation prompt.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{
    Describe, ExecutionContext, NodeCategory, NodeConfig, NodeDefinition, NodeDescriptor,
    NodeError, NodeExecutor, NodeInputs, NodeOutputs, SocketDefinition, SocketType, ValueMapExt,
};
use serde_json::json;

/// Prompt Combine Node
///
/// # Inputs
/// - `subject` (required)
/// - `style` (optional)
/// - `details` (optional)
///
/// # Config
/// - `separator` - Placed between non-empty fragments (default: ", ")
///
/// # Outputs
/// - `prompt` - The combined prompt
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptCombineNode;

impl PromptCombineNode {
    pub const SOCKET_SUBJECT: &'static str = "subject";
    pub const SOCKET_STYLE: &'static str = "style";
    pub const SOCKET_DETAILS: &'static str = "details";
    pub const SOCKET_PROMPT: &'static str = "prompt";
    pub const CONFIG_SEPARATOR: &'static str = "separator";

    pub fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::descriptor(), Arc::new(Self))
    }
}

impl Describe for PromptCombineNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new("prompt-combine", NodeCategory::Processing, "Combine Prompt")
            .description("Joins prompt fragments into one prompt")
            .input(SocketDefinition::required(Self::SOCKET_SUBJECT, "Subject", SocketType::Text))
            .input(SocketDefinition::optional(Self::SOCKET_STYLE, "Style", SocketType::Text))
            .input(SocketDefinition::optional(Self::SOCKET_DETAILS, "Details", SocketType::Text))
            .output(SocketDefinition::required(Self::SOCKET_PROMPT, "Prompt", SocketType::Text))
            .default_value(Self::CONFIG_SEPARATOR, json!(", "))
    }
}

inventory::submit!(flow_engine::DefinitionFn(PromptCombineNode::definition));

#[async_trait]
impl NodeExecutor for PromptCombineNode {
    async fn execute(
        &self,
        inputs: NodeInputs,
        config: NodeConfig,
        _ctx: &ExecutionContext,
    ) -> Result<NodeOutputs, NodeError> {
        let subject = inputs.get_string(Self::SOCKET_SUBJECT)?.trim();
        if subject.is_empty() {
            return Err(NodeError::MissingInput(Self::SOCKET_SUBJECT.to_string()));
        }
        let separator = config.get_string_opt(Self::CONFIG_SEPARATOR).unwrap_or(", ");

        let prompt = [
            Some(subject),
            inputs.get_string_opt(Self::SOCKET_STYLE),
            inputs.get_string_opt(Self::SOCKET_DETAILS),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join(separator);

        let mut outputs = NodeOutputs::new();
        outputs.insert(Self::SOCKET_PROMPT.to_string(), json!(prompt));
        Ok(outputs)
    }
}
