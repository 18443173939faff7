//! Reconciliation entry point
//!
//! [`Reconciler`] ties the engine together for one scope: build the
//! dependency graph, take the state lock, load, plan, execute, finalize.
//! Embedding callers construct it once with their backend and adapter
//! registry and then drive runs with [`Reconciler::reconcile`],
//! [`Reconciler::plan`] and [`Reconciler::destroy`].

use crate::error::{EngineError, Result};
use crate::executor::{CancelFlag, DEFAULT_CONCURRENCY, Executor};
use crate::finalizer::Finalizer;
use crate::graph::DependencyGraph;
use crate::planner::{Plan, Planner};
use crate::provider::{ProviderRegistry, RetryConfig};
use crate::report::RunReport;
use crate::secret::{EnvSecretResolver, SecretResolver};
use crate::state::StateBackend;
use chrono::{DateTime, Utc};
use edgeflow_core::{ResourceDescriptor, Scope};
use std::sync::Arc;
use std::time::Instant;

/// Drives reconciliation runs for one scope
pub struct Reconciler {
    scope: Scope,
    backend: Arc<dyn StateBackend>,
    registry: ProviderRegistry,
    resolver: Arc<dyn SecretResolver>,
    retry: RetryConfig,
    max_concurrency: usize,
    cancel: CancelFlag,
}

impl Reconciler {
    /// Secrets default to environment resolution (`env://` references)
    pub fn new(scope: Scope, backend: Arc<dyn StateBackend>, registry: ProviderRegistry) -> Self {
        Self {
            scope,
            backend,
            registry,
            resolver: Arc::new(EnvSecretResolver::new()),
            retry: RetryConfig::default(),
            max_concurrency: DEFAULT_CONCURRENCY,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn SecretResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Handle that cancels this reconciler's runs when triggered
    ///
    /// Cancellation is cooperative: in-flight provider calls finish and
    /// are committed, everything not yet started is reported as skipped.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Compute the plan without mutating remote resources or state
    ///
    /// The only provider I/O is the adoption lookup for descriptors that
    /// carry `policy.adopt` and have no state entry yet.
    pub async fn plan(&self, descriptors: &[ResourceDescriptor]) -> Result<Plan> {
        let graph = DependencyGraph::build(descriptors)?;
        let state = self.backend.load(&self.scope).await?;
        Planner::new(&self.scope, &self.registry, &self.retry)
            .plan(descriptors, &graph, &state)
            .await
    }

    /// Bring the scope's resources into agreement with the declarations
    ///
    /// Holds the scope's state lock for the whole run. Structural errors
    /// (duplicate ids, unknown dependencies, cycles, missing adapters)
    /// abort before anything runs; per-node failures are isolated and
    /// surface in the returned report instead.
    pub async fn reconcile(&self, descriptors: &[ResourceDescriptor]) -> Result<RunReport> {
        let started_at = Utc::now();
        let started = Instant::now();
        let graph = DependencyGraph::build(descriptors)?;
        tracing::info!(scope = %self.scope, resources = graph.len(), "Starting reconciliation");

        let lock = self.backend.acquire_lock(&self.scope).await?;
        let result = self.run(descriptors, &graph, started_at, started).await;
        let released = lock.release().await;
        let report = result?;
        released?;
        Ok(report)
    }

    async fn run(
        &self,
        descriptors: &[ResourceDescriptor],
        graph: &DependencyGraph,
        started_at: DateTime<Utc>,
        started: Instant,
    ) -> Result<RunReport> {
        let mut state = self.backend.load(&self.scope).await?;
        let plan = Planner::new(&self.scope, &self.registry, &self.retry)
            .plan(descriptors, graph, &state)
            .await?;
        tracing::info!(scope = %self.scope, plan = %plan.summary(), "Plan computed");

        let executed = Executor::new(
            &self.scope,
            self.backend.as_ref(),
            &self.registry,
            Arc::clone(&self.resolver),
        )
        .with_retry(self.retry.clone())
        .with_concurrency(self.max_concurrency)
        .with_cancel(self.cancel.clone())
        .run(descriptors, graph, &plan, &mut state)
        .await?;

        Finalizer::new(
            &self.scope,
            self.backend.as_ref(),
            &self.registry,
            &self.retry,
            &self.cancel,
        )
        .finish(&plan, executed, &mut state, started_at, started)
        .await
    }

    /// Tear down everything recorded for the scope
    ///
    /// Runs a reconciliation with an empty declaration set: every entry
    /// is stale and is deleted or retained per its recorded policy.
    /// Production scopes are refused outright.
    pub async fn destroy(&self) -> Result<RunReport> {
        if self.scope.is_production() {
            return Err(EngineError::ProductionGuard(self.scope.qualified()));
        }
        tracing::warn!(scope = %self.scope, "Destroying all recorded resources");
        self.reconcile(&[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateBackend;
    use edgeflow_core::{QueueConfig, ResourceConfig, ResourceDescriptor, ResourceId, STAGE_PRODUCTION};

    fn id(value: &str) -> ResourceId {
        ResourceId::new(value).unwrap()
    }

    fn reconciler(stage: &str) -> Reconciler {
        Reconciler::new(
            Scope::new("deep-thought", stage),
            Arc::new(MemoryStateBackend::new()),
            ProviderRegistry::new(),
        )
    }

    #[tokio::test]
    async fn test_cycle_aborts_before_anything_runs() {
        let a = ResourceDescriptor::named("a", ResourceConfig::Queue(QueueConfig::new("a")))
            .unwrap()
            .with_dependency(id("b"));
        let b = ResourceDescriptor::named("b", ResourceConfig::Queue(QueueConfig::new("b")))
            .unwrap()
            .with_dependency(id("a"));

        let engine = reconciler("test");
        let err = engine.reconcile(&[a, b]).await.unwrap_err();
        assert!(matches!(err, EngineError::Cycle(_)));
    }

    #[tokio::test]
    async fn test_destroy_refuses_production() {
        let engine = reconciler(STAGE_PRODUCTION);
        let err = engine.destroy().await.unwrap_err();
        match err {
            EngineError::ProductionGuard(scope) => {
                assert_eq!(scope, "deep-thought/production");
            }
            other => panic!("expected production guard, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_declaration_on_empty_state_succeeds() {
        let backend = Arc::new(MemoryStateBackend::new());
        let engine = Reconciler::new(
            Scope::new("deep-thought", "test"),
            backend.clone(),
            ProviderRegistry::new(),
        );

        let report = engine.reconcile(&[]).await.unwrap();
        assert!(report.is_success());
        assert!(report.nodes.is_empty());
        assert!(backend.committed(engine.scope()).await.is_some());
    }

    #[test]
    fn test_cancel_flag_is_shared_with_runs() {
        let engine = reconciler("test");
        let flag = engine.cancel_flag();
        assert!(!engine.cancel.is_cancelled());
        flag.cancel();
        assert!(engine.cancel.is_cancelled());
    }
}
