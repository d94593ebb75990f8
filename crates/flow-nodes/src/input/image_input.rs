//! Image Input Node
//!
//! Provides an image reference picked on the canvas: an http(s) URL or a
//! `data:image/...` URI. The node only checks the shape of the reference;
//! fetching the pixels is left to whoever consumes it.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{
    Describe, ExecutionContext, NodeCategory, NodeConfig, NodeDefinition, NodeDescriptor,
    NodeError, NodeExecutor, NodeInputs, NodeOutputs, SocketDefinition, SocketType, ValueMapExt,
};
use serde_json::json;

/// Image Input Node
///
/// # Config
/// - `image` - URL or data URI of the image
///
/// # Outputs
/// - `image` - The same reference, trimmed
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageInputNode;

impl ImageInputNode {
    pub const SOCKET_IMAGE: &'static str = "image";
    pub const CONFIG_IMAGE: &'static str = "image";

    pub fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::descriptor(), Arc::new(Self))
    }
}

/// Whether `reference` looks like something an image socket can carry
pub fn is_image_reference(reference: &str) -> bool {
    reference.starts_with("http://")
        || reference.starts_with("https://")
        || reference.starts_with("data:image/")
}

impl Describe for ImageInputNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new("image-input", NodeCategory::Input, "Image Input")
            .description("Provides an image to the workflow")
            .output(SocketDefinition::required(Self::SOCKET_IMAGE, "Image", SocketType::Image))
            .default_value(Self::CONFIG_IMAGE, json!(""))
    }
}

inventory::submit!(flow_engine::DefinitionFn(ImageInputNode::definition));

#[async_trait]
impl NodeExecutor for ImageInputNode {
    async fn execute(
        &self,
        _inputs: NodeInputs,
        config: NodeConfig,
        _ctx: &ExecutionContext,
    ) -> Result<NodeOutputs, NodeError> {
        let image = config.get_string_opt(Self::CONFIG_IMAGE).unwrap_or_default().trim();

        if image.is_empty() {
            return Err(NodeError::InvalidConfig {
                key: Self::CONFIG_IMAGE.to_string(),
                message: "no image selected".to_string(),
            });
        }
        if !is_image_reference(image) {
            return Err(NodeError::InvalidConfig {
                key: Self::CONFIG_IMAGE.to_string(),
                message: "expected an http(s) URL or an image data URI".to_string(),
            });
        }

        let mut outputs = NodeOutputs::new();
        outputs.insert(Self::SOCKET_IMAGE.to_string(), json!(image));
        Ok(outputs)
    }
}
