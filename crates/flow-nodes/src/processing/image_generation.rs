//! Image Generation Node
//!
//! Sends a prompt to the generation backend selected for the run and outputs
//! the returned image references. The request is dropped as soon as the run
//! is cancelled.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{
    Describe, ExecutionContext, NodeCategory, NodeConfig, NodeDefinition, NodeDescriptor,
    NodeError, NodeExecutor, NodeInputs, NodeOutputs, SocketDefinition, SocketType, SocketValue,
    ValueMapExt,
};
use serde_json::json;

use crate::backend::{BackendSet, GenerationRequest};

/// Upper bound on images per request
pub const MAX_IMAGES: u32 = 8;
/// Upper bound on either image dimension
pub const MAX_DIMENSION: u32 = 4096;

/// Image Generation Node
///
/// # Inputs
/// - `prompt` (required) - What to generate
/// - `negative_prompt` (optional) - What to avoid
/// - `reference` (optional) - Image to start from
/// - `seed` (optional) - Overrides the configured seed
///
/// # Config
/// - `width`, `height` - Output size in pixels (default: 1024)
/// - `count` - Number of images (default: 1)
/// - `seed` - Fixed seed, or null for a random one
///
/// # Outputs
/// - `image` - The first generated image
/// - `images` - All generated images
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageGenerationNode;

impl ImageGenerationNode {
    pub const SOCKET_PROMPT: &'static str = "prompt";
    pub const SOCKET_NEGATIVE_PROMPT: &'static str = "negative_prompt";
    pub const SOCKET_REFERENCE: &'static str = "reference";
    pub const SOCKET_SEED: &'static str = "seed";
    pub const SOCKET_IMAGE: &'static str = "image";
    pub const SOCKET_IMAGES: &'static str = "images";

    pub const CONFIG_WIDTH: &'static str = "width";
    pub const CONFIG_HEIGHT: &'static str = "height";
    pub const CONFIG_COUNT: &'static str = "count";
    pub const CONFIG_SEED: &'static str = "seed";

    pub fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::descriptor(), Arc::new(Self))
    }

    /// Build the backend request from resolved inputs and config
    pub fn build_request(
        inputs: &NodeInputs,
        config: &NodeConfig,
    ) -> Result<GenerationRequest, NodeError> {
        let prompt = inputs.get_string(Self::SOCKET_PROMPT)?.trim();
        if prompt.is_empty() {
            return Err(NodeError::MissingInput(Self::SOCKET_PROMPT.to_string()));
        }

        let mut request = GenerationRequest::new(prompt);
        request.negative_prompt = inputs
            .get_string_opt(Self::SOCKET_NEGATIVE_PROMPT)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        request.reference_image = inputs
            .get_string_opt(Self::SOCKET_REFERENCE)
            .map(str::to_string);
        request.width = positive_int(config, Self::CONFIG_WIDTH, 1024, MAX_DIMENSION)?;
        request.height = positive_int(config, Self::CONFIG_HEIGHT, 1024, MAX_DIMENSION)?;
        request.count = positive_int(config, Self::CONFIG_COUNT, 1, MAX_IMAGES)?;
        request.seed = match inputs.get(Self::SOCKET_SEED) {
            Some(value) if !value.is_null() => Some(seed_from(Self::SOCKET_SEED, value)?),
            _ => match config.get(Self::CONFIG_SEED) {
                Some(value) if !value.is_null() => Some(seed_from(Self::CONFIG_SEED, value)?),
                _ => None,
            },
        };

        Ok(request)
    }
}

fn positive_int(config: &NodeConfig, key: &str, default: u32, max: u32) -> Result<u32, NodeError> {
    let value = config.get_number_or(key, f64::from(default));
    if value.fract() != 0.0 || value < 1.0 || value > f64::from(max) {
        return Err(NodeError::InvalidConfig {
            key: key.to_string(),
            message: format!("expected a whole number between 1 and {}, got {}", max, value),
        });
    }
    Ok(value as u32)
}

fn seed_from(key: &str, value: &SocketValue) -> Result<u64, NodeError> {
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        })
        .ok_or_else(|| NodeError::InvalidInputType {
            port: key.to_string(),
            expected: "non-negative integer".to_string(),
        })
}

impl Describe for ImageGenerationNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new("image-generation", NodeCategory::Processing, "Generate Image")
            .description("Generates images from a prompt using the selected backend")
            .input(SocketDefinition::required(Self::SOCKET_PROMPT, "Prompt", SocketType::Text))
            .input(SocketDefinition::optional(
                Self::SOCKET_NEGATIVE_PROMPT,
                "Negative Prompt",
                SocketType::Text,
            ))
            .input(SocketDefinition::optional(Self::SOCKET_REFERENCE, "Reference", SocketType::Image))
            .input(SocketDefinition::optional(Self::SOCKET_SEED, "Seed", SocketType::Number))
            .output(SocketDefinition::required(Self::SOCKET_IMAGE, "Image", SocketType::Image))
            .output(SocketDefinition::optional(Self::SOCKET_IMAGES, "Images", SocketType::Any))
            .default_value(Self::CONFIG_WIDTH, json!(1024))
            .default_value(Self::CONFIG_HEIGHT, json!(1024))
            .default_value(Self::CONFIG_COUNT, json!(1))
            .default_value(Self::CONFIG_SEED, SocketValue::Null)
    }
}

inventory::submit!(flow_engine::DefinitionFn(ImageGenerationNode::definition));

#[async_trait]
impl NodeExecutor for ImageGenerationNode {
    async fn execute(
        &self,
        inputs: NodeInputs,
        config: NodeConfig,
        ctx: &ExecutionContext,
    ) -> Result<NodeOutputs, NodeError> {
        let request = Self::build_request(&inputs, &config)?;
        let backend = BackendSet::from_context(ctx)?;

        log::debug!(
            "ImageGenerationNode: run '{}' sending {}x{} x{} to backend '{}'",
            ctx.run_id(),
            request.width,
            request.height,
            request.count,
            backend.name()
        );

        let images = backend.generate(&request, ctx.cancellation()).await?;
        let first = images
            .first()
            .cloned()
            .ok_or_else(|| NodeError::Backend("backend returned no images".to_string()))?;

        let mut outputs = NodeOutputs::new();
        outputs.insert(Self::SOCKET_IMAGE.to_string(), json!(first));
        outputs.insert(Self::SOCKET_IMAGES.to_string(), json!(images));
        Ok(outputs)
    }
}
