//! Image Output Node
//!
//! Terminal node that shows an image on the canvas. It re-exposes the image
//! it received so the preview reads it from the node's own output values.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{
    Describe, ExecutionContext, NodeCategory, NodeConfig, NodeDefinition, NodeDescriptor,
    NodeError, NodeExecutor, NodeInputs, NodeOutputs, SocketDefinition, SocketType, ValueMapExt,
};
use serde_json::json;

use crate::input::is_image_reference;

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageOutputNode;

impl ImageOutputNode {
    pub const SOCKET_IMAGE: &'static str = "image";
    pub const CONFIG_LABEL: &'static str = "label";

    pub fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::descriptor(), Arc::new(Self))
    }
}

impl Describe for ImageOutputNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new("image-output", NodeCategory::Output, "Image Output")
            .description("Displays an image on the canvas")
            .input(SocketDefinition::required(Self::SOCKET_IMAGE, "Image", SocketType::Image))
            .output(SocketDefinition::optional(Self::SOCKET_IMAGE, "Image", SocketType::Image))
            .default_value(Self::CONFIG_LABEL, json!("Output"))
    }
}

inventory::submit!(flow_engine::DefinitionFn(ImageOutputNode::definition));

#[async_trait]
impl NodeExecutor for ImageOutputNode {
    async fn execute(
        &self,
        inputs: NodeInputs,
        config: NodeConfig,
        _ctx: &ExecutionContext,
    ) -> Result<NodeOutputs, NodeError> {
        let image = inputs.get_string(Self::SOCKET_IMAGE)?;
        if !is_image_reference(image) {
            return Err(NodeError::InvalidInputType {
                port: Self::SOCKET_IMAGE.to_string(),
                expected: "image URL or data URI".to_string(),
            });
        }

        log::info!(
            "ImageOutputNode '{}': {}",
            config.get_string_opt(Self::CONFIG_LABEL).unwrap_or("Output"),
            image
        );

        let mut outputs = NodeOutputs::new();
        outputs.insert(Self::SOCKET_IMAGE.to_string(), json!(image));
        Ok(outputs)
    }
}
