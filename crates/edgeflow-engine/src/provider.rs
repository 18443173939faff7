//! Provider adapter trait definition
//!
//! All provider integrations (queues, vector indexes, workers, domains,
//! event sources, comments) implement [`ProviderAdapter`] to give the
//! engine a uniform create/update/delete/find surface per resource kind.

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use edgeflow_core::{ResourceConfig, ResourceId, ResourceKind, Scope, SecretRef, SecretString, Template};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Provider operation errors
///
/// `Network` and `RateLimited` are transient and eligible for retry with
/// backoff; every other variant is permanent and fails the node on the
/// first occurrence.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error {code}: {message}")]
    Api { code: u16, message: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Remote resource not found: {0}")]
    NotFound(String),

    #[error("Remote resource already exists: {0}")]
    AlreadyExists(String),
}

impl ProviderError {
    /// Whether a retry with backoff may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_) | ProviderError::RateLimited(_)
        )
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Observed remote resource
///
/// Returned by adapters from `find`, `create` and `update`. The
/// `provider_ref` is the provider-side identifier recorded in state and
/// passed back for later updates and deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResource {
    /// Provider-side resource identifier
    pub provider_ref: String,

    /// Exported attributes (id, name, url, ...)
    pub outputs: BTreeMap<String, serde_json::Value>,
}

impl RemoteResource {
    pub fn new(provider_ref: impl Into<String>) -> Self {
        Self {
            provider_ref: provider_ref.into(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.outputs.insert(key.into(), value);
        self
    }
}

/// Result of an adoption compatibility check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AdoptionCheck {
    /// The remote resource can safely serve as the desired resource
    Compatible,
    /// The remote resource diverges in a way the adapter cannot reconcile
    Conflict { reason: String },
}

impl AdoptionCheck {
    pub fn conflict(reason: impl Into<String>) -> Self {
        AdoptionCheck::Conflict {
            reason: reason.into(),
        }
    }
}

/// Call context handed to adapter operations
///
/// Carries the scope, the outputs of already-applied dependencies and the
/// resolved secrets for the node being applied. Secrets are resolved by
/// the engine immediately before the call and never persisted.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    scope: Scope,
    outputs: BTreeMap<ResourceId, BTreeMap<String, serde_json::Value>>,
    secrets: BTreeMap<String, SecretString>,
}

impl ProviderContext {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            outputs: BTreeMap::new(),
            secrets: BTreeMap::new(),
        }
    }

    pub fn with_outputs(
        mut self,
        outputs: BTreeMap<ResourceId, BTreeMap<String, serde_json::Value>>,
    ) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_secrets(mut self, secrets: BTreeMap<String, SecretString>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Output attribute of a dependency
    pub fn output(&self, resource: &str, attribute: &str) -> Option<&serde_json::Value> {
        self.outputs.get(resource)?.get(attribute)
    }

    /// Resolved secret for a reference in the node's configuration
    pub fn secret(&self, secret: &SecretRef) -> Option<&SecretString> {
        self.secrets.get(secret.as_str())
    }

    /// Render a template against the dependency outputs
    pub fn render(&self, template: &Template) -> ProviderResult<String> {
        template
            .render(|resource, attribute| {
                self.output(resource, attribute).map(|value| match value {
                    serde_json::Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
            })
            .map_err(|e| ProviderError::Validation(e.to_string()))
    }
}

/// Provider adapter abstraction
///
/// One adapter is registered per [`ResourceKind`]. All operations receive
/// a [`ProviderContext`]; mutating operations additionally receive the
/// desired configuration or the recorded `provider_ref`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The resource kind this adapter manages
    fn kind(&self) -> ResourceKind;

    /// Look up a remote resource by its natural identity (name, hostname, ...)
    async fn find(
        &self,
        ctx: &ProviderContext,
        identity: &str,
    ) -> ProviderResult<Option<RemoteResource>>;

    /// Create the resource described by `config`
    async fn create(
        &self,
        ctx: &ProviderContext,
        config: &ResourceConfig,
    ) -> ProviderResult<RemoteResource>;

    /// Reconfigure an existing resource in place
    async fn update(
        &self,
        ctx: &ProviderContext,
        provider_ref: &str,
        config: &ResourceConfig,
    ) -> ProviderResult<RemoteResource>;

    /// Delete the resource identified by `provider_ref`
    async fn delete(&self, ctx: &ProviderContext, provider_ref: &str) -> ProviderResult<()>;

    /// Decide whether an unmanaged remote resource may be adopted
    ///
    /// Pure check, no I/O. The default accepts every remote resource;
    /// adapters override this when immutable attributes (dimensions of a
    /// vector index, the zone of a domain) must match.
    fn check_adoption(&self, _config: &ResourceConfig, _remote: &RemoteResource) -> AdoptionCheck {
        AdoptionCheck::Compatible
    }
}

impl std::fmt::Debug for dyn ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("kind", &self.kind())
            .finish()
    }
}

/// Registry of provider adapters, one per resource kind
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    adapters: BTreeMap<ResourceKind, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own kind, replacing any previous one
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn get(&self, kind: ResourceKind) -> Result<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(&kind)
            .cloned()
            .ok_or_else(|| EngineError::AdapterNotFound(kind.to_string()))
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.adapters.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.adapters.keys().copied().collect()
    }
}

/// Retry configuration for provider operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (first call included)
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No retries, single attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the retry following `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay.as_millis() as f64;
        let max = self.max_delay.as_millis() as f64;
        let delay = initial * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(delay.min(max) as u64)
    }
}

/// Run a provider operation with exponential backoff on transient errors
///
/// Permanent errors are returned on the first occurrence.
pub async fn with_retry<T, F, Fut>(
    retry: &RetryConfig,
    operation: &str,
    mut call: F,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt + 1 < retry.max_attempts => {
                let delay = retry.delay_for_attempt(attempt);
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    max_attempts = retry.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient provider error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
