//! Persisted form of a workflow
//!
//! The engine keeps no on-disk format of its own; hosts store this plain
//! serde structure wherever they like. Restoring a document validates it
//! against the registry and drops run state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, GroupLayoutConfig};
use crate::error::Result;
use crate::graph::WorkflowGraph;
use crate::groups::{GroupLayer, NodeGroup};
use crate::registry::NodeRegistry;
use crate::types::{GraphEdge, GraphNode};

/// Nodes, edges and groups of one workflow as plain data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default)]
    pub groups: Vec<NodeGroup>,
}

impl WorkflowDocument {
    /// Snapshot a graph and its group overlay
    pub fn capture(graph: &WorkflowGraph, groups: &GroupLayer) -> Self {
        Self {
            id: graph.id().to_string(),
            name: graph.name().to_string(),
            nodes: graph.nodes().to_vec(),
            edges: graph.edges().to_vec(),
            groups: groups.groups().to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate and rebuild the live graph and group layer
    pub fn restore(
        &self,
        registry: Arc<NodeRegistry>,
        engine_config: EngineConfig,
        layout: GroupLayoutConfig,
    ) -> Result<(WorkflowGraph, GroupLayer)> {
        let graph = WorkflowGraph::from_document(self, registry, engine_config)?;
        let layer = GroupLayer::with_groups(self.groups.clone(), layout);
        Ok((graph, layer))
    }
}
