//! Engine error types

use thiserror::Error;

/// Reconciliation engine errors
///
/// Structural problems in the declaration set (duplicates, unknown
/// dependencies, cycles) surface here before any provider call is made.
/// Per-node provider failures do not appear as engine errors; they are
/// recorded in the run report instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Duplicate resource id: {0}")]
    DuplicateId(String),

    #[error("Unknown dependency: {id} depends on {dependency}")]
    UnknownDependency { id: String, dependency: String },

    #[error("Dependency cycle detected among: {0}")]
    Cycle(String),

    #[error("No adapter registered for resource kind: {0}")]
    AdapterNotFound(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("Secret resolution failed: {0}")]
    Secret(String),

    #[error("Refusing to destroy production scope: {0}")]
    ProductionGuard(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Resource(#[from] edgeflow_core::ResourceError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
