//! EdgeFlow Reconciliation Engine
//!
//! This crate turns a set of declarative resource descriptors into
//! provider API calls: it diffs the declarations against the recorded
//! state of a scope, applies the difference concurrently in dependency
//! order, and garbage-collects what is recorded but no longer declared.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               embedding caller                   │
//! │          (CLI, CI job, preview bot)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │ descriptors
//! ┌─────────────────▼───────────────────────────────┐
//! │               edgeflow-engine                    │
//! │  ┌─────────┐   ┌─────────┐   ┌──────────────┐  │
//! │  │  graph  │──▶│ planner │──▶│   executor   │  │
//! │  └─────────┘   └─────────┘   └──────┬───────┘  │
//! │                                     │          │
//! │  ┌──────────────────────────────────▼───────┐  │
//! │  │       scope state (write-through)         │  │
//! │  └──────────────────┬───────────────────────┘  │
//! │                     │ finalizer: GC + commit    │
//! └─────────┬───────────┴───────────────────────────┘
//!           │
//! ┌─────────▼─────────────────┐
//! │     provider adapters      │
//! │ (queue, worker, domain, …) │
//! └───────────────────────────┘
//! ```
//!
//! # Run lifecycle
//!
//! 1. Build the dependency graph; structural errors abort here.
//! 2. Take the scope's state lock and load the recorded state.
//! 3. Plan: classify every declared node (create / adopt / update /
//!    no-op) and every stale entry (delete / retain).
//! 4. Execute: apply declared actions concurrently, dependencies first,
//!    writing each entry through to the backend as it completes.
//! 5. Finalize: tear down deletable stale resources, commit the
//!    snapshot, assemble the [`RunReport`].
//!
//! Per-node failures never abort the run: the failed node and its
//! dependents are reported, everything else proceeds, and a second run
//! converges on whatever is still missing.

pub mod error;
pub mod executor;
pub mod finalizer;
pub mod graph;
pub mod planner;
pub mod provider;
pub mod reconciler;
pub mod report;
pub mod secret;
pub mod state;
pub mod store;

// Re-exports
pub use error::{EngineError, Result};
pub use executor::{CancelFlag, DEFAULT_CONCURRENCY, Executor};
pub use finalizer::Finalizer;
pub use graph::DependencyGraph;
pub use planner::{
    ActionKind, CorruptStale, Plan, PlanSummary, PlannedAction, Planner, RetainReason,
    StaleAction, StaleKind, stale_action,
};
pub use provider::{
    AdoptionCheck, ProviderAdapter, ProviderContext, ProviderError, ProviderRegistry,
    ProviderResult, RemoteResource, RetryConfig, with_retry,
};
pub use reconciler::Reconciler;
pub use report::{
    FailedNode, FailureCause, NodeOutcome, NodeReport, RunReport, RunStatus, RunSummary,
};
pub use secret::{EnvSecretResolver, SecretResolver, StaticSecretResolver};
pub use state::{
    CorruptEntry, MemoryStateBackend, STATE_VERSION, ScopeState, StateBackend, StateEntry,
    StateLock,
};
pub use store::LocalStateBackend;
