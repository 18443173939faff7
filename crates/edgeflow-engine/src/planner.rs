//! Plan computation
//!
//! The planner diffs the declared descriptor set against the recorded
//! scope state and classifies one action per node. Declared nodes come
//! out in execution order; stale entries (recorded but no longer
//! declared) come out in teardown order with a Delete or Retain decision.
//!
//! The only provider I/O at plan time is the adoption lookup (`find`) for
//! nodes that carry `policy.adopt` and have no state entry. Everything
//! else is a pure diff.

use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::provider::{AdoptionCheck, ProviderContext, ProviderRegistry, RemoteResource, RetryConfig, with_retry};
use crate::report::FailureCause;
use crate::state::{ScopeState, StateEntry};
use edgeflow_core::{Fingerprint, ResourceDescriptor, ResourceId, ResourceKind, Scope};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Classified action for a declared node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionKind {
    /// No state entry and no adoptable remote: provision from scratch
    Create,

    /// Import the observed remote resource without provisioning
    Adopt { remote: RemoteResource },

    /// Reconfigure in place using the recorded provider reference
    Update { provider_ref: String },

    /// Recorded fingerprint matches the desired configuration
    NoOp,

    /// Pre-failed during planning; the executor fails it without a call
    Blocked { cause: FailureCause },
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Create => write!(f, "create"),
            ActionKind::Adopt { .. } => write!(f, "adopt"),
            ActionKind::Update { .. } => write!(f, "update"),
            ActionKind::NoOp => write!(f, "no-op"),
            ActionKind::Blocked { .. } => write!(f, "blocked"),
        }
    }
}

/// Planned action for one declared node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    /// Logical resource id
    pub id: ResourceId,

    /// Resource kind
    pub kind: ResourceKind,

    /// Classified action
    pub action: ActionKind,

    /// Fingerprint of the desired configuration
    pub fingerprint: Fingerprint,
}

/// Why a stale entry is kept instead of deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetainReason {
    /// Production scopes never delete stale resources
    Production,

    /// The entry was recorded with `delete: false`
    Policy,
}

impl std::fmt::Display for RetainReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetainReason::Production => write!(f, "production scope never deletes"),
            RetainReason::Policy => write!(f, "recorded delete policy is false"),
        }
    }
}

/// Decision for a stale entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StaleKind {
    /// Delete the remote resource and remove the entry
    Delete,

    /// Keep the entry and the remote resource untouched
    Retain { reason: RetainReason },
}

/// Planned handling of one stale entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleAction {
    /// Logical resource id of the stale entry
    pub id: ResourceId,

    /// Recorded resource kind
    pub kind: ResourceKind,

    /// Recorded provider reference
    pub provider_ref: String,

    /// Delete or retain
    pub action: StaleKind,
}

/// Stale entry that could not be read; always retained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorruptStale {
    /// Raw stored key
    pub id: String,

    /// Parse error description
    pub error: String,
}

/// Decide what happens to a stale entry
///
/// Pure function of the scope and the policy recorded at provision time:
/// production scopes always retain, otherwise the recorded delete flag
/// decides.
pub fn stale_action(scope: &Scope, entry: &StateEntry) -> StaleKind {
    if scope.is_production() {
        StaleKind::Retain {
            reason: RetainReason::Production,
        }
    } else if entry.delete {
        StaleKind::Delete
    } else {
        StaleKind::Retain {
            reason: RetainReason::Policy,
        }
    }
}

/// Full plan for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Scope the plan applies to
    pub scope: Scope,

    /// Declared nodes in execution (dependency-first) order
    pub actions: Vec<PlannedAction>,

    /// Stale entries in teardown (dependents-first) order
    pub stale: Vec<StaleAction>,

    /// Unreadable stale entries, always retained
    pub corrupt: Vec<CorruptStale>,
}

impl Plan {
    /// Whether applying the plan would touch the provider or the state
    pub fn has_changes(&self) -> bool {
        self.actions
            .iter()
            .any(|action| !matches!(action.action, ActionKind::NoOp))
            || self
                .stale
                .iter()
                .any(|stale| matches!(stale.action, StaleKind::Delete))
    }

    /// Planned action for a node
    pub fn action(&self, id: &ResourceId) -> Option<&PlannedAction> {
        self.actions.iter().find(|action| &action.id == id)
    }

    /// Counts per action
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for action in &self.actions {
            match action.action {
                ActionKind::Create => summary.create += 1,
                ActionKind::Adopt { .. } => summary.adopt += 1,
                ActionKind::Update { .. } => summary.update += 1,
                ActionKind::NoOp => summary.unchanged += 1,
                ActionKind::Blocked { .. } => summary.blocked += 1,
            }
        }
        for stale in &self.stale {
            match stale.action {
                StaleKind::Delete => summary.delete += 1,
                StaleKind::Retain { .. } => summary.retain += 1,
            }
        }
        summary.retain += self.corrupt.len();
        summary
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub adopt: usize,
    pub update: usize,
    pub delete: usize,
    pub retain: usize,
    pub unchanged: usize,
    pub blocked: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to adopt, {} to update, {} to delete, {} unchanged",
            self.create, self.adopt, self.update, self.delete, self.unchanged
        )?;
        if self.retain > 0 {
            write!(f, ", {} retained", self.retain)?;
        }
        if self.blocked > 0 {
            write!(f, ", {} blocked", self.blocked)?;
        }
        Ok(())
    }
}

/// Diffs declarations against recorded state
pub struct Planner<'a> {
    scope: &'a Scope,
    registry: &'a ProviderRegistry,
    retry: &'a RetryConfig,
}

impl<'a> Planner<'a> {
    pub fn new(scope: &'a Scope, registry: &'a ProviderRegistry, retry: &'a RetryConfig) -> Self {
        Self {
            scope,
            registry,
            retry,
        }
    }

    /// Compute the plan for a declaration set
    ///
    /// Every declared kind must have a registered adapter; a missing
    /// adapter aborts planning before any lookup. Adoption lookups are
    /// the only provider calls made here, and a lookup failure pre-fails
    /// only the node it belongs to.
    pub async fn plan(
        &self,
        descriptors: &[ResourceDescriptor],
        graph: &DependencyGraph,
        state: &ScopeState,
    ) -> Result<Plan> {
        let by_id: BTreeMap<ResourceId, &ResourceDescriptor> = descriptors
            .iter()
            .map(|descriptor| (descriptor.id.clone(), descriptor))
            .collect();

        // Adapter preflight: fail before any provider call is made.
        for descriptor in descriptors {
            self.registry.get(descriptor.config.kind())?;
        }

        let mut actions = Vec::with_capacity(graph.len());
        for id in graph.topological() {
            let descriptor = by_id[id];
            let kind = descriptor.config.kind();
            let fingerprint = Fingerprint::of(&descriptor.config)?;

            let action = if let Some(corrupt) = state.corrupt.get(id.as_str()) {
                tracing::warn!(
                    resource = %id,
                    error = %corrupt.error,
                    "State entry is unreadable, refusing to provision over it"
                );
                ActionKind::Blocked {
                    cause: FailureCause::StateCorruption {
                        error: corrupt.error.clone(),
                    },
                }
            } else if let Some(entry) = state.get(id) {
                if entry.fingerprint == fingerprint {
                    ActionKind::NoOp
                } else {
                    ActionKind::Update {
                        provider_ref: entry.provider_ref.clone(),
                    }
                }
            } else {
                self.classify_new(descriptor).await?
            };

            tracing::debug!(resource = %id, kind = %kind, action = %action, "Planned");
            actions.push(PlannedAction {
                id: id.clone(),
                kind,
                action,
                fingerprint,
            });
        }

        let stale = self.classify_stale(state, &by_id);
        let corrupt = state
            .corrupt
            .iter()
            .filter(|(raw_id, _)| !by_id.contains_key(raw_id.as_str()))
            .map(|(raw_id, entry)| CorruptStale {
                id: raw_id.clone(),
                error: entry.error.clone(),
            })
            .collect();

        Ok(Plan {
            scope: self.scope.clone(),
            actions,
            stale,
            corrupt,
        })
    }

    /// Classify a node that has no state entry: Create, Adopt or Blocked
    async fn classify_new(&self, descriptor: &ResourceDescriptor) -> Result<ActionKind> {
        let identity = match descriptor.config.identity() {
            Some(identity) if descriptor.policy.adopt => identity,
            _ => return Ok(ActionKind::Create),
        };

        let adapter = self.registry.get(descriptor.config.kind())?;
        let ctx = ProviderContext::new(self.scope.clone());
        let found = with_retry(self.retry, "find", || adapter.find(&ctx, &identity)).await;

        Ok(match found {
            Ok(Some(remote)) => match adapter.check_adoption(&descriptor.config, &remote) {
                AdoptionCheck::Compatible => ActionKind::Adopt { remote },
                AdoptionCheck::Conflict { reason } => {
                    tracing::warn!(
                        resource = %descriptor.id,
                        identity,
                        reason,
                        "Remote resource exists but cannot be adopted"
                    );
                    ActionKind::Blocked {
                        cause: FailureCause::AdoptionConflict { reason },
                    }
                }
            },
            Ok(None) => ActionKind::Create,
            Err(error) => {
                tracing::warn!(
                    resource = %descriptor.id,
                    identity,
                    error = %error,
                    "Adoption lookup failed"
                );
                ActionKind::Blocked {
                    cause: FailureCause::Provider {
                        message: error.to_string(),
                    },
                }
            }
        })
    }

    /// Stale entries in teardown order: dependents before dependencies
    ///
    /// The descriptors are gone, so ordering comes from the dependency
    /// ids recorded in the entries at provision time. Edges pointing
    /// outside the stale set are ignored.
    fn classify_stale(
        &self,
        state: &ScopeState,
        declared: &BTreeMap<ResourceId, &ResourceDescriptor>,
    ) -> Vec<StaleAction> {
        let stale_ids: BTreeSet<&ResourceId> = state
            .entries
            .keys()
            .filter(|id| !declared.contains_key(id.as_str()))
            .collect();

        let mut indegree: BTreeMap<&ResourceId, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&ResourceId, Vec<&ResourceId>> = BTreeMap::new();
        for id in &stale_ids {
            let recorded = &state.entries[*id].dependencies;
            let degree = recorded
                .iter()
                .filter(|dep| stale_ids.contains(dep))
                .count();
            indegree.insert(*id, degree);
            for dep in recorded {
                if stale_ids.contains(dep) {
                    dependents.entry(dep).or_default().push(*id);
                }
            }
        }

        let mut ready: BTreeSet<&ResourceId> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order: Vec<&ResourceId> = Vec::with_capacity(stale_ids.len());
        while let Some(id) = ready.pop_first() {
            if let Some(downstream) = dependents.get(&id) {
                for dependent in downstream {
                    if let Some(degree) = indegree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(*dependent);
                        }
                    }
                }
            }
            order.push(id);
        }
        // Recorded dependencies of a valid run are acyclic; should the
        // record disagree, the leftovers go last in id order.
        for id in &stale_ids {
            if !order.contains(id) {
                order.push(*id);
            }
        }

        order
            .into_iter()
            .rev()
            .map(|id| {
                let entry = &state.entries[id];
                StaleAction {
                    id: id.clone(),
                    kind: entry.kind,
                    provider_ref: entry.provider_ref.clone(),
                    action: stale_action(self.scope, entry),
                }
            })
            .collect()
    }
}
