//! Configuration types for the workflow engine and group overlay

use serde::{Deserialize, Serialize};

use crate::constants::defaults;
use crate::geometry::Size;

/// Settings for graph construction and execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Maximum number of executors running at once in a single run.
    /// Zero means no limit beyond the graph's own parallelism.
    pub max_concurrent_nodes: usize,
    /// Size given to nodes created through `add_node`
    pub default_node_size: Size,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_nodes: defaults::MAX_CONCURRENT_NODES,
            default_node_size: Size::new(defaults::NODE_WIDTH, defaults::NODE_HEIGHT),
        }
    }
}

impl EngineConfig {
    /// Limit the number of concurrently running executors
    pub fn with_max_concurrent_nodes(mut self, limit: usize) -> Self {
        self.max_concurrent_nodes = limit;
        self
    }

    /// Concurrency limit, `None` when unbounded
    pub fn concurrency_limit(&self) -> Option<usize> {
        (self.max_concurrent_nodes > 0).then_some(self.max_concurrent_nodes)
    }
}

/// Geometry policy for node groups
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupLayoutConfig {
    /// Padding added on every side when computing bounds from nodes
    pub padding: f64,
    /// Extra space added above the nodes for the title bar
    pub title_height: f64,
    /// Minimum width enforced while resizing
    pub min_width: f64,
    /// Minimum height enforced while resizing
    pub min_height: f64,
    /// Height substituted for collapsed groups
    pub collapsed_height: f64,
    /// Distance from a handle's anchor, per axis, that still hits the handle
    pub handle_radius: f64,
    /// Color of newly created groups
    pub default_color: String,
}

impl Default for GroupLayoutConfig {
    fn default() -> Self {
        Self {
            padding: defaults::GROUP_PADDING,
            title_height: defaults::GROUP_TITLE_HEIGHT,
            min_width: defaults::GROUP_MIN_WIDTH,
            min_height: defaults::GROUP_MIN_HEIGHT,
            collapsed_height: defaults::GROUP_COLLAPSED_HEIGHT,
            handle_radius: defaults::GROUP_HANDLE_RADIUS,
            default_color: defaults::GROUP_COLOR.to_string(),
        }
    }
}
