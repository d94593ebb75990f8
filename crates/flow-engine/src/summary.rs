//! Outcome of a workflow run

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// What happened to one node during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NodeOutcome {
    /// The executor returned outputs
    Succeeded,
    /// The executor failed (or panicked)
    Failed { error: String },
    /// Never started because an upstream node failed; the node is left idle
    /// with its previous outputs cleared
    Skipped { failed_dependency: NodeId },
    /// Stopped by cancellation while running
    Cancelled,
    /// Never started: the run was cancelled first, or an upstream node was
    NotStarted,
}

impl NodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, NodeOutcome::Succeeded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, NodeOutcome::Failed { .. })
    }
}

/// Overall result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every planned node succeeded
    Completed,
    /// At least one node failed; independent branches still ran
    PartiallyFailed,
    /// The run was cancelled before it finished
    Cancelled,
}

/// Report returned by [`crate::WorkflowEngine::run`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Outcome of every planned node
    pub outcomes: HashMap<NodeId, NodeOutcome>,
    /// Nodes in the order their executors were started
    pub execution_order: Vec<NodeId>,
}

impl RunSummary {
    pub fn outcome(&self, node_id: &str) -> Option<&NodeOutcome> {
        self.outcomes.get(node_id)
    }

    /// Nodes that failed, with their messages
    pub fn failures(&self) -> Vec<(&str, &str)> {
        let mut failures: Vec<(&str, &str)> = self
            .outcomes
            .iter()
            .filter_map(|(id, outcome)| match outcome {
                NodeOutcome::Failed { error } => Some((id.as_str(), error.as_str())),
                _ => None,
            })
            .collect();
        failures.sort_unstable();
        failures
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
