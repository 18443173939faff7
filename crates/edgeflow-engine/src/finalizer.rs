//! Run finalization
//!
//! After the executor drains, the finalizer settles everything that is
//! recorded but no longer declared: deletable stale resources are torn
//! down through their adapters (dependents before dependencies),
//! retained and unreadable entries are reported as such, and the final
//! snapshot is committed. The assembled [`RunReport`] is the engine's
//! complete answer for the run.

use crate::error::Result;
use crate::executor::CancelFlag;
use crate::planner::{Plan, StaleAction, StaleKind};
use crate::provider::{ProviderContext, ProviderRegistry, RetryConfig, with_retry};
use crate::report::{FailedNode, FailureCause, NodeOutcome, NodeReport, RunReport, RunStatus};
use crate::state::{ScopeState, StateBackend};
use chrono::{DateTime, Utc};
use edgeflow_core::Scope;
use std::time::Instant;

/// Settles stale entries and commits the final snapshot
pub struct Finalizer<'a> {
    scope: &'a Scope,
    backend: &'a dyn StateBackend,
    registry: &'a ProviderRegistry,
    retry: &'a RetryConfig,
    cancel: &'a CancelFlag,
}

impl<'a> Finalizer<'a> {
    pub fn new(
        scope: &'a Scope,
        backend: &'a dyn StateBackend,
        registry: &'a ProviderRegistry,
        retry: &'a RetryConfig,
        cancel: &'a CancelFlag,
    ) -> Self {
        Self {
            scope,
            backend,
            registry,
            retry,
            cancel,
        }
    }

    /// Settle the plan's stale entries, commit and assemble the report
    ///
    /// Deletions run one at a time in the plan's teardown order. A
    /// failed deletion keeps its entry so the next run retries it;
    /// everything else still commits.
    pub async fn finish(
        &self,
        plan: &Plan,
        executed: Vec<NodeReport>,
        state: &mut ScopeState,
        started_at: DateTime<Utc>,
        started: Instant,
    ) -> Result<RunReport> {
        let mut nodes = executed;

        for stale in &plan.stale {
            let report = match &stale.action {
                StaleKind::Retain { reason } => {
                    tracing::info!(resource = %stale.id, reason = %reason, "Retaining stale resource");
                    NodeReport::new(stale.id.as_str(), stale.kind, NodeOutcome::Retained)
                        .with_detail(reason.to_string())
                }
                StaleKind::Delete if self.cancel.is_cancelled() => {
                    tracing::warn!(resource = %stale.id, "Run cancelled before stale resource was deleted");
                    NodeReport::new(stale.id.as_str(), stale.kind, NodeOutcome::Skipped)
                        .with_cause(FailureCause::Cancelled)
                }
                StaleKind::Delete => self.delete_stale(stale, state).await?,
            };
            nodes.push(report);
        }

        // Unreadable entries are never deleted; ownership cannot be
        // proven from a record that does not parse.
        for corrupt in &plan.corrupt {
            tracing::warn!(resource = %corrupt.id, error = %corrupt.error, "Retaining unreadable state entry");
            nodes.push(
                NodeReport::unreadable(&corrupt.id, NodeOutcome::Retained)
                    .with_detail(format!("unreadable entry: {}", corrupt.error)),
            );
        }

        self.backend.commit(self.scope).await?;
        tracing::debug!(scope = %self.scope, entries = state.entries.len(), "Committed state snapshot");

        let failed: Vec<FailedNode> = nodes
            .iter()
            .filter(|node| node.outcome == NodeOutcome::Failed)
            .map(|node| FailedNode {
                id: node.id.clone(),
                cause: node.cause.clone().unwrap_or(FailureCause::Provider {
                    message: "unspecified failure".to_string(),
                }),
            })
            .collect();
        let converged = failed.is_empty()
            && !nodes
                .iter()
                .any(|node| node.outcome == NodeOutcome::Skipped);
        let status = if converged {
            RunStatus::Success
        } else {
            RunStatus::PartialFailure { failed }
        };

        let report = RunReport {
            scope: self.scope.clone(),
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            nodes,
            status,
        };
        tracing::info!(
            scope = %self.scope,
            summary = %report.summary(),
            duration_ms = report.duration_ms,
            "Run finished"
        );
        Ok(report)
    }

    /// Delete one stale resource and drop its entry
    async fn delete_stale(&self, stale: &StaleAction, state: &mut ScopeState) -> Result<NodeReport> {
        let adapter = match self.registry.get(stale.kind) {
            Ok(adapter) => adapter,
            Err(error) => {
                tracing::error!(resource = %stale.id, error = %error, "No adapter to delete stale resource");
                return Ok(
                    NodeReport::new(stale.id.as_str(), stale.kind, NodeOutcome::Failed)
                        .with_cause(FailureCause::Provider {
                            message: error.to_string(),
                        }),
                );
            }
        };

        tracing::info!(
            resource = %stale.id,
            kind = %stale.kind,
            provider_ref = %stale.provider_ref,
            "Deleting stale resource"
        );
        let ctx = ProviderContext::new(self.scope.clone());
        let deleted =
            with_retry(self.retry, "delete", || adapter.delete(&ctx, &stale.provider_ref)).await;

        Ok(match deleted {
            Ok(()) => {
                state.remove(&stale.id);
                self.backend.delete(self.scope, &stale.id).await?;
                NodeReport::new(stale.id.as_str(), stale.kind, NodeOutcome::Deleted)
            }
            Err(error) => {
                // Entry stays so the next run retries the deletion.
                tracing::error!(resource = %stale.id, error = %error, "Failed to delete stale resource");
                NodeReport::new(stale.id.as_str(), stale.kind, NodeOutcome::Failed).with_cause(
                    FailureCause::Provider {
                        message: error.to_string(),
                    },
                )
            }
        })
    }
}
