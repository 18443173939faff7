//! Plan execution
//!
//! Walks the dependency graph and applies the planned action of every
//! declared node. Independent branches run concurrently; a node starts
//! only after all of its dependencies have reached a successful terminal
//! state, and a failure marks the whole dependent subtree as skipped
//! without touching unrelated branches.
//!
//! State writes are per-node and immediate: a successful provider call
//! is recorded in the backend before the scheduler moves on, so an
//! interrupted run leaves the store consistent with what was actually
//! provisioned.

use crate::error::{EngineError, Result};
use crate::graph::DependencyGraph;
use crate::planner::{ActionKind, Plan, PlannedAction};
use crate::provider::{
    ProviderContext, ProviderRegistry, ProviderResult, RemoteResource, RetryConfig, with_retry,
};
use crate::report::{FailureCause, NodeOutcome, NodeReport};
use crate::secret::SecretResolver;
use crate::state::{ScopeState, StateBackend, StateEntry};
use chrono::Utc;
use edgeflow_core::{ResourceDescriptor, ResourceId, Scope};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinSet;

/// Default number of provider calls in flight at once
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Cooperative cancellation handle
///
/// Cancelling stops new nodes from starting; provider calls already in
/// flight run to completion so remote resources are never left in an
/// ambiguous state. Nodes that had not started are reported as skipped,
/// and everything that completed stays committed.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Applies the declared part of a plan through the provider adapters
pub struct Executor<'a> {
    scope: &'a Scope,
    backend: &'a dyn StateBackend,
    registry: &'a ProviderRegistry,
    resolver: Arc<dyn SecretResolver>,
    retry: RetryConfig,
    max_concurrency: usize,
    cancel: CancelFlag,
}

impl<'a> Executor<'a> {
    pub fn new(
        scope: &'a Scope,
        backend: &'a dyn StateBackend,
        registry: &'a ProviderRegistry,
        resolver: Arc<dyn SecretResolver>,
    ) -> Self {
        Self {
            scope,
            backend,
            registry,
            resolver,
            retry: RetryConfig::default(),
            max_concurrency: DEFAULT_CONCURRENCY,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute the plan's declared actions
    ///
    /// The plan must have been computed from the same `descriptors` and
    /// `graph`. Returns one report per declared node in execution order.
    /// The working state is updated and written through to the backend
    /// as nodes complete; stale entries are left for the finalizer.
    pub async fn run(
        &self,
        descriptors: &[ResourceDescriptor],
        graph: &DependencyGraph,
        plan: &Plan,
        state: &mut ScopeState,
    ) -> Result<Vec<NodeReport>> {
        let mut run = RunState::new(descriptors, plan, graph);
        let mut tasks: JoinSet<(ResourceId, ProviderResult<RemoteResource>)> = JoinSet::new();

        loop {
            // Launch ready nodes up to the concurrency budget. Immediate
            // outcomes (no-op, adopt, pre-failed) may make further nodes
            // ready within the same pass.
            while tasks.len() < self.max_concurrency {
                let Some(id) = run.ready.pop_front() else { break };
                if run.finished(&id) {
                    continue;
                }
                self.launch(&id, graph, &mut run, state, &mut tasks).await?;
            }

            if tasks.is_empty() {
                if run.ready.is_empty() {
                    break;
                }
                continue;
            }

            match tasks.join_next().await {
                Some(Ok((id, result))) => {
                    self.complete(&id, result, graph, &mut run, state).await?;
                }
                Some(Err(join_error)) => {
                    return Err(EngineError::State(format!(
                        "provider task aborted: {join_error}"
                    )));
                }
                None => {}
            }
        }

        Ok(run.into_ordered(plan))
    }

    /// Start one ready node: resolve its inputs and dispatch the action
    async fn launch(
        &self,
        id: &ResourceId,
        graph: &DependencyGraph,
        run: &mut RunState<'_>,
        state: &mut ScopeState,
        tasks: &mut JoinSet<(ResourceId, ProviderResult<RemoteResource>)>,
    ) -> Result<()> {
        let (action, descriptor) = run.lookup(id)?;

        if self.cancel.is_cancelled() {
            tracing::warn!(resource = %id, "Run cancelled before resource started");
            run.mark(
                id,
                NodeReport::new(id.as_str(), action.kind, NodeOutcome::Skipped)
                    .with_cause(FailureCause::Cancelled),
            );
            run.skip_dependents(id, graph, true);
            return Ok(());
        }

        match &action.action {
            ActionKind::NoOp => {
                let outputs = state
                    .get(id)
                    .map(|entry| entry.outputs.clone())
                    .unwrap_or_default();
                tracing::debug!(resource = %id, "Configuration unchanged");
                run.mark(
                    id,
                    NodeReport::new(id.as_str(), action.kind, NodeOutcome::NoOp)
                        .with_outputs(outputs),
                );
                run.unblock_dependents(id, graph);
            }
            ActionKind::Blocked { cause } => {
                tracing::error!(resource = %id, cause = %cause, "Resource cannot be applied");
                run.mark(
                    id,
                    NodeReport::new(id.as_str(), action.kind, NodeOutcome::Failed)
                        .with_cause(cause.clone()),
                );
                run.skip_dependents(id, graph, false);
            }
            ActionKind::Adopt { remote } => {
                tracing::info!(
                    resource = %id,
                    provider_ref = %remote.provider_ref,
                    "Adopting existing resource"
                );
                let entry = StateEntry::new(action.kind, &remote.provider_ref, action.fingerprint.clone())
                    .with_outputs(remote.outputs.clone())
                    .with_adopted(true)
                    .with_delete(descriptor.policy.delete)
                    .with_dependencies(descriptor.dependencies().into_iter().collect());
                state.set(id.clone(), entry.clone());
                self.backend.upsert(self.scope, id, entry).await?;
                run.mark(
                    id,
                    NodeReport::new(id.as_str(), action.kind, NodeOutcome::Adopted)
                        .with_detail(format!("imported remote resource {}", remote.provider_ref))
                        .with_outputs(remote.outputs.clone()),
                );
                run.unblock_dependents(id, graph);
            }
            ActionKind::Create | ActionKind::Update { .. } => {
                let ctx = match self.resolve_context(descriptor, state).await {
                    Ok(ctx) => ctx,
                    Err(cause) => {
                        tracing::error!(resource = %id, cause = %cause, "Resource inputs could not be resolved");
                        run.mark(
                            id,
                            NodeReport::new(id.as_str(), action.kind, NodeOutcome::Failed)
                                .with_cause(cause),
                        );
                        run.skip_dependents(id, graph, false);
                        return Ok(());
                    }
                };
                let adapter = match self.registry.get(action.kind) {
                    Ok(adapter) => adapter,
                    Err(error) => {
                        run.mark(
                            id,
                            NodeReport::new(id.as_str(), action.kind, NodeOutcome::Failed)
                                .with_cause(FailureCause::Provider {
                                    message: error.to_string(),
                                }),
                        );
                        run.skip_dependents(id, graph, false);
                        return Ok(());
                    }
                };

                let retry = self.retry.clone();
                let config = descriptor.config.clone();
                let task_id = id.clone();
                if let ActionKind::Update { provider_ref } = &action.action {
                    tracing::info!(resource = %id, kind = %action.kind, "Updating resource");
                    let provider_ref = provider_ref.clone();
                    tasks.spawn(async move {
                        let result = with_retry(&retry, "update", || {
                            adapter.update(&ctx, &provider_ref, &config)
                        })
                        .await;
                        (task_id, result)
                    });
                } else {
                    tracing::info!(resource = %id, kind = %action.kind, "Creating resource");
                    tasks.spawn(async move {
                        let result =
                            with_retry(&retry, "create", || adapter.create(&ctx, &config)).await;
                        (task_id, result)
                    });
                }
            }
        }
        Ok(())
    }

    /// Record the result of a finished provider call
    async fn complete(
        &self,
        id: &ResourceId,
        result: ProviderResult<RemoteResource>,
        graph: &DependencyGraph,
        run: &mut RunState<'_>,
        state: &mut ScopeState,
    ) -> Result<()> {
        let (action, descriptor) = run.lookup(id)?;
        match result {
            Ok(remote) => {
                let outcome = match action.action {
                    ActionKind::Update { .. } => NodeOutcome::Updated,
                    _ => NodeOutcome::Created,
                };
                let entry = match (&action.action, state.get(id)) {
                    (ActionKind::Update { .. }, Some(previous)) => StateEntry {
                        kind: action.kind,
                        provider_ref: remote.provider_ref.clone(),
                        fingerprint: action.fingerprint.clone(),
                        outputs: remote.outputs.clone(),
                        adopted: previous.adopted,
                        delete: descriptor.policy.delete,
                        dependencies: descriptor.dependencies().into_iter().collect(),
                        created_at: previous.created_at,
                        updated_at: Utc::now(),
                    },
                    _ => StateEntry::new(
                        action.kind,
                        remote.provider_ref.clone(),
                        action.fingerprint.clone(),
                    )
                    .with_outputs(remote.outputs.clone())
                    .with_delete(descriptor.policy.delete)
                    .with_dependencies(descriptor.dependencies().into_iter().collect()),
                };
                state.set(id.clone(), entry.clone());
                self.backend.upsert(self.scope, id, entry).await?;
                tracing::info!(
                    resource = %id,
                    outcome = %outcome,
                    provider_ref = %remote.provider_ref,
                    "Resource applied"
                );
                run.mark(
                    id,
                    NodeReport::new(id.as_str(), action.kind, outcome).with_outputs(remote.outputs),
                );
                run.unblock_dependents(id, graph);
            }
            Err(error) => {
                tracing::error!(resource = %id, error = %error, "Provider operation failed");
                run.mark(
                    id,
                    NodeReport::new(id.as_str(), action.kind, NodeOutcome::Failed).with_cause(
                        FailureCause::Provider {
                            message: error.to_string(),
                        },
                    ),
                );
                run.skip_dependents(id, graph, false);
            }
        }
        Ok(())
    }

    /// Assemble the provider call context for a node
    ///
    /// Collects dependency outputs from the working state, checks that
    /// every referenced output attribute is actually present and
    /// resolves the configuration's secret references. Resolved secrets
    /// live only in the returned context.
    async fn resolve_context(
        &self,
        descriptor: &ResourceDescriptor,
        state: &ScopeState,
    ) -> std::result::Result<ProviderContext, FailureCause> {
        let mut outputs = BTreeMap::new();
        for dependency in descriptor.dependencies() {
            if let Some(entry) = state.get(&dependency) {
                outputs.insert(dependency, entry.outputs.clone());
            }
        }

        for (resource, attribute) in descriptor.config.output_refs() {
            let resolved = outputs
                .get(&resource)
                .is_some_and(|attrs| attrs.contains_key(&attribute));
            if !resolved {
                return Err(FailureCause::UnresolvedReference {
                    resource: resource.to_string(),
                    attribute,
                });
            }
        }

        let mut secrets = BTreeMap::new();
        for secret in descriptor.config.secret_refs() {
            match self.resolver.resolve(secret).await {
                Ok(value) => {
                    secrets.insert(secret.as_str().to_string(), value);
                }
                Err(error) => {
                    return Err(FailureCause::Secret {
                        message: error.to_string(),
                    });
                }
            }
        }

        Ok(ProviderContext::new(self.scope.clone())
            .with_outputs(outputs)
            .with_secrets(secrets))
    }
}

/// Scheduling bookkeeping for one run
struct RunState<'p> {
    planned: BTreeMap<ResourceId, &'p PlannedAction>,
    by_id: BTreeMap<ResourceId, &'p ResourceDescriptor>,
    waiting: BTreeMap<ResourceId, usize>,
    ready: VecDeque<ResourceId>,
    reports: BTreeMap<ResourceId, NodeReport>,
}

impl<'p> RunState<'p> {
    fn new(descriptors: &'p [ResourceDescriptor], plan: &'p Plan, graph: &DependencyGraph) -> Self {
        let by_id = descriptors
            .iter()
            .map(|descriptor| (descriptor.id.clone(), descriptor))
            .collect();
        let planned: BTreeMap<ResourceId, &PlannedAction> = plan
            .actions
            .iter()
            .map(|action| (action.id.clone(), action))
            .collect();

        let mut waiting = BTreeMap::new();
        for action in &plan.actions {
            let pending = graph
                .dependencies_of(&action.id)
                .map_or(0, |deps| deps.len());
            waiting.insert(action.id.clone(), pending);
        }
        let ready = plan
            .actions
            .iter()
            .filter(|action| waiting.get(&action.id) == Some(&0))
            .map(|action| action.id.clone())
            .collect();

        Self {
            planned,
            by_id,
            waiting,
            ready,
            reports: BTreeMap::new(),
        }
    }

    fn lookup(&self, id: &ResourceId) -> Result<(&'p PlannedAction, &'p ResourceDescriptor)> {
        match (self.planned.get(id).copied(), self.by_id.get(id).copied()) {
            (Some(action), Some(descriptor)) => Ok((action, descriptor)),
            _ => Err(EngineError::State(format!(
                "plan does not cover resource {id}"
            ))),
        }
    }

    fn finished(&self, id: &ResourceId) -> bool {
        self.reports.contains_key(id)
    }

    fn mark(&mut self, id: &ResourceId, report: NodeReport) {
        self.reports.insert(id.clone(), report);
    }

    /// A node reached terminal success: queue dependents with no other
    /// outstanding dependencies.
    fn unblock_dependents(&mut self, id: &ResourceId, graph: &DependencyGraph) {
        let Some(dependents) = graph.dependents_of(id) else {
            return;
        };
        for dependent in dependents {
            if let Some(remaining) = self.waiting.get_mut(dependent) {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 && !self.reports.contains_key(dependent) {
                    self.ready.push_back(dependent.clone());
                }
            }
        }
    }

    /// Mark every direct and indirect dependent as skipped
    fn skip_dependents(&mut self, id: &ResourceId, graph: &DependencyGraph, cancelled: bool) {
        for dependent in graph.transitive_dependents(id) {
            if self.reports.contains_key(&dependent) {
                continue;
            }
            let Some(action) = self.planned.get(&dependent) else {
                continue;
            };
            tracing::warn!(resource = %dependent, after = %id, "Skipping dependent resource");
            let cause = if cancelled {
                FailureCause::Cancelled
            } else {
                FailureCause::DependencyFailed {
                    dependency: id.to_string(),
                }
            };
            let report = NodeReport::new(dependent.as_str(), action.kind, NodeOutcome::Skipped)
                .with_cause(cause);
            self.reports.insert(dependent.clone(), report);
        }
    }

    /// Reports in execution order
    fn into_ordered(mut self, plan: &Plan) -> Vec<NodeReport> {
        plan.actions
            .iter()
            .filter_map(|action| self.reports.remove(&action.id))
            .collect()
    }
}
