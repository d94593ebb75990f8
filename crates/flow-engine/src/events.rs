//! Event types for streaming run progress
//!
//! The engine reports every state change of a run to an [`EventSink`], so
//! hosts can update the canvas while executors are still in flight.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::summary::RunStatus;
use crate::types::{NodeId, NodeOutputs};

/// Trait for sending run events
///
/// This abstracts over the transport (channel, UI bridge, log) so the
/// engine can be used in different hosts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered (e.g., channel
    /// closed). The engine logs and otherwise ignores such failures.
    fn send(&self, event: RunEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunEvent {
    /// Planning succeeded and the run is starting
    #[serde(rename_all = "camelCase")]
    RunStarted { run_id: String, nodes: Vec<NodeId> },

    /// A node's executor was started
    #[serde(rename_all = "camelCase")]
    NodeStarted { run_id: String, node_id: NodeId },

    /// A node produced its outputs
    #[serde(rename_all = "camelCase")]
    NodeCompleted {
        run_id: String,
        node_id: NodeId,
        outputs: NodeOutputs,
    },

    /// A node's executor failed
    #[serde(rename_all = "camelCase")]
    NodeFailed {
        run_id: String,
        node_id: NodeId,
        error: String,
    },

    /// A node will not run because an upstream node failed
    #[serde(rename_all = "camelCase")]
    NodeSkipped {
        run_id: String,
        node_id: NodeId,
        failed_dependency: NodeId,
    },

    /// A running node was stopped by cancellation
    #[serde(rename_all = "camelCase")]
    NodeCancelled { run_id: String, node_id: NodeId },

    /// The run is over
    #[serde(rename_all = "camelCase")]
    RunFinished { run_id: String, status: RunStatus },
}

impl RunEvent {
    pub fn run_id(&self) -> &str {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::NodeStarted { run_id, .. }
            | RunEvent::NodeCompleted { run_id, .. }
            | RunEvent::NodeFailed { run_id, .. }
            | RunEvent::NodeSkipped { run_id, .. }
            | RunEvent::NodeCancelled { run_id, .. }
            | RunEvent::RunFinished { run_id, .. } => run_id,
        }
    }

    /// Node the event is about, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            RunEvent::NodeStarted { node_id, .. }
            | RunEvent::NodeCompleted { node_id, .. }
            | RunEvent::NodeFailed { node_id, .. }
            | RunEvent::NodeSkipped { node_id, .. }
            | RunEvent::NodeCancelled { node_id, .. } => Some(node_id),
            RunEvent::RunStarted { .. } | RunEvent::RunFinished { .. } => None,
        }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: RunEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
#[derive(Default)]
pub struct VecEventSink {
    events: Mutex<Vec<RunEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: RunEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Forwards events into a tokio channel
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelEventSink {
    pub fn new(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
        Self { sender }
    }

    /// Sink plus the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: RunEvent) -> Result<(), EventError> {
        self.sender
            .send(event)
            .map_err(|_| EventError::channel_closed())
    }
}
