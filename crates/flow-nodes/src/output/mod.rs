//! Output nodes
//!
//! Nodes that present results on the canvas.

mod image_output;

pub use image_output::ImageOutputNode;
