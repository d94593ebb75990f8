//! Flow Engine - typed dataflow workflows for the Easel canvas
//!
//! This crate provides the graph engine behind the node editor:
//!
//! - Typed sockets with a fixed compatibility rule checked when edges are made
//! - A registry of node definitions, filled once at startup
//! - The graph model with single-producer inputs and cascading deletes
//! - Dependency-ordered, concurrent execution with branch-isolated failures
//!   and cooperative cancellation
//! - Node groups: rectangular overlays whose membership is derived from
//!   geometry
//!
//! # Example
//!
//! ```ignore
//! use flow_engine::{ExecutionContext, NodeRegistry, RunTarget, WorkflowEngine, WorkflowGraph};
//!
//! let registry = flow_engine::install_global(NodeRegistry::with_builtins()?);
//! let mut graph = WorkflowGraph::new("wf", "Sketch", registry);
//! // ... add nodes and edges ...
//! let summary = WorkflowEngine::default()
//!     .run(&mut graph, RunTarget::All, ExecutionContext::new())
//!     .await?;
//! ```

pub mod builder;
pub mod config;
pub mod constants;
pub mod context;
pub mod descriptor;
pub mod document;
pub mod engine;
pub mod error;
pub mod events;
pub mod geometry;
pub mod graph;
pub mod groups;
mod plan;
pub mod registry;
mod resolver;
pub mod summary;
pub mod types;
pub mod validation;

// Re-export key types
pub use builder::WorkflowBuilder;
pub use config::{EngineConfig, GroupLayoutConfig};
pub use context::{extension_keys, ExecutionContext, ExecutorExtensions};
pub use descriptor::{Describe, NodeDescriptor};
pub use document::WorkflowDocument;
pub use engine::{RunHandle, WorkflowEngine};
pub use error::{FlowError, NodeError, Result};
pub use events::{ChannelEventSink, EventError, EventSink, NullEventSink, RunEvent, VecEventSink};
pub use geometry::{Point, Rect, Size};
pub use graph::{CommandOutcome, Connection, GraphCommand, RemovedNode, WorkflowGraph};
pub use groups::{
    compute_bounds, default_group_bounds, is_member, GroupHit, GroupInteraction, GroupLayer,
    HitTarget, NodeGroup, ResizeHandle,
};
pub use plan::RunTarget;
pub use registry::{
    global, install_global, CallbackExecutor, DefinitionFn, NodeDefinition, NodeExecutor,
    NodeRegistry, SyncCallbackExecutor,
};
pub use summary::{NodeOutcome, RunStatus, RunSummary};
pub use types::{
    is_compatible, EdgeId, GraphEdge, GraphNode, NodeCategory, NodeConfig, NodeId, NodeInputs,
    NodeOutputs, NodeStatus, SocketDefinition, SocketDirection, SocketId, SocketType,
    SocketValue, ValueMapExt,
};
pub use validation::{validate_document, ValidationError};

// Used by the `inventory::submit!` expansions in node crates
pub use inventory;
