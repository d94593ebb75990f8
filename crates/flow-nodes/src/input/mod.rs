//! Input nodes
//!
//! Nodes that bring user-provided values into the workflow.

mod image_input;
mod number_input;
mod text_input;

pub use image_input::{is_image_reference, ImageInputNode};
pub use number_input::NumberInputNode;
pub use text_input::TextInputNode;
