//! Processing nodes
//!
//! Nodes that transform values: prompt assembly and image generation.

mod image_generation;
mod prompt_combine;

pub use image_generation::{ImageGenerationNode, MAX_DIMENSION, MAX_IMAGES};
pub use prompt_combine::PromptCombineNode;
