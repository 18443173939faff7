//! Run report types
//!
//! The run report is the engine's outward surface: one terminal outcome
//! per node, the final output attributes of every applied resource and an
//! overall status. A CLI or notification collaborator renders it; the
//! engine itself never formats beyond the summary line.

use chrono::{DateTime, Utc};
use edgeflow_core::{ResourceKind, Scope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Terminal state of a node after a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeOutcome {
    /// Resource was created on the provider
    Created,
    /// An existing remote resource was imported into state
    Adopted,
    /// Resource was reconfigured in place
    Updated,
    /// Desired configuration already matched the recorded state
    NoOp,
    /// Stale resource was deleted and its entry removed
    Deleted,
    /// Stale entry was kept untouched
    Retained,
    /// The node's own operation failed
    Failed,
    /// Never attempted: an upstream failure or cancellation
    Skipped,
}

impl NodeOutcome {
    /// Whether dependents of this node were allowed to proceed
    pub fn is_success(&self) -> bool {
        !matches!(self, NodeOutcome::Failed | NodeOutcome::Skipped)
    }
}

impl std::fmt::Display for NodeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeOutcome::Created => write!(f, "created"),
            NodeOutcome::Adopted => write!(f, "adopted"),
            NodeOutcome::Updated => write!(f, "updated"),
            NodeOutcome::NoOp => write!(f, "no-op"),
            NodeOutcome::Deleted => write!(f, "deleted"),
            NodeOutcome::Retained => write!(f, "retained"),
            NodeOutcome::Failed => write!(f, "failed"),
            NodeOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Why a node failed or was skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    /// A matching remote resource exists but cannot serve as the desired one
    AdoptionConflict { reason: String },

    /// The provider adapter returned an error (after retries, if transient)
    Provider { message: String },

    /// The recorded state entry could not be read
    StateCorruption { error: String },

    /// A referenced dependency output was not available at execution time
    UnresolvedReference { resource: String, attribute: String },

    /// A secret reference could not be resolved
    Secret { message: String },

    /// An upstream dependency did not reach a successful terminal state
    DependencyFailed { dependency: String },

    /// The run was cancelled before this node started
    Cancelled,
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCause::AdoptionConflict { reason } => {
                write!(f, "adoption conflict: {}", reason)
            }
            FailureCause::Provider { message } => write!(f, "provider error: {}", message),
            FailureCause::StateCorruption { error } => {
                write!(f, "state entry is unreadable: {}", error)
            }
            FailureCause::UnresolvedReference {
                resource,
                attribute,
            } => write!(f, "unresolved output reference: ${{{}.{}}}", resource, attribute),
            FailureCause::Secret { message } => write!(f, "secret resolution failed: {}", message),
            FailureCause::DependencyFailed { dependency } => {
                write!(f, "dependency {} did not succeed", dependency)
            }
            FailureCause::Cancelled => write!(f, "run was cancelled before this resource started"),
        }
    }
}

/// Terminal outcome of a single node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    /// Logical resource id (the raw stored key for unreadable entries)
    pub id: String,

    /// Resource kind, when known
    pub kind: Option<ResourceKind>,

    /// Terminal state
    pub outcome: NodeOutcome,

    /// Failure or skip cause, for Failed and Skipped outcomes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<FailureCause>,

    /// Human-readable note (retention reason, adoption identity, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Output attributes after the run, for successfully applied nodes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, serde_json::Value>,
}

impl NodeReport {
    pub fn new(id: impl Into<String>, kind: ResourceKind, outcome: NodeOutcome) -> Self {
        Self {
            id: id.into(),
            kind: Some(kind),
            outcome,
            cause: None,
            detail: None,
            outputs: BTreeMap::new(),
        }
    }

    /// Report for a stored entry whose kind could not be read
    pub fn unreadable(id: impl Into<String>, outcome: NodeOutcome) -> Self {
        Self {
            id: id.into(),
            kind: None,
            outcome,
            cause: None,
            detail: None,
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_cause(mut self, cause: FailureCause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_outputs(mut self, outputs: BTreeMap<String, serde_json::Value>) -> Self {
        self.outputs = outputs;
        self
    }
}

/// A failed node surfaced in the run status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedNode {
    pub id: String,
    pub cause: FailureCause,
}

/// Overall result of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every declared node converged and all stale entries were handled
    Success,

    /// Some nodes failed or were skipped; everything that succeeded is committed
    PartialFailure { failed: Vec<FailedNode> },
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

/// Counts per terminal outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub created: usize,
    pub adopted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub retained: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} adopted, {} updated, {} unchanged, {} deleted, {} retained, {} failed, {} skipped",
            self.created,
            self.adopted,
            self.updated,
            self.unchanged,
            self.deleted,
            self.retained,
            self.failed,
            self.skipped
        )
    }
}

/// Full result of a reconciliation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Scope the run applied to
    pub scope: Scope,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Total wall-clock duration in milliseconds
    pub duration_ms: u64,

    /// Per-node outcomes: declared nodes in execution order, stale entries after
    pub nodes: Vec<NodeReport>,

    /// Overall status
    pub status: RunStatus,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Report for a single node
    pub fn node(&self, id: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Output attributes of a node, if it holds any
    pub fn outputs(&self, id: &str) -> Option<&BTreeMap<String, serde_json::Value>> {
        self.node(id).map(|node| &node.outputs)
    }

    /// Counts per terminal outcome
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for node in &self.nodes {
            match node.outcome {
                NodeOutcome::Created => summary.created += 1,
                NodeOutcome::Adopted => summary.adopted += 1,
                NodeOutcome::Updated => summary.updated += 1,
                NodeOutcome::NoOp => summary.unchanged += 1,
                NodeOutcome::Deleted => summary.deleted += 1,
                NodeOutcome::Retained => summary.retained += 1,
                NodeOutcome::Failed => summary.failed += 1,
                NodeOutcome::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    /// Nodes with a given outcome
    pub fn nodes_with(&self, outcome: NodeOutcome) -> Vec<&NodeReport> {
        self.nodes
            .iter()
            .filter(|node| node.outcome == outcome)
            .collect()
    }
}
