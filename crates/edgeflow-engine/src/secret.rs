//! Secret resolution boundary
//!
//! Configurations carry secret references (`env://NAME`), never values.
//! The executor resolves references through a [`SecretResolver`] right
//! before the provider call that needs them; resolved values live only in
//! the call context and are dropped with it.

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use edgeflow_core::{SecretRef, SecretString};
use edgeflow_core::secret::SCHEME_ENV;
use std::collections::BTreeMap;

/// Resolves secret references to values
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, secret: &SecretRef) -> Result<SecretString>;
}

/// Resolves `env://NAME` references from the process environment
#[derive(Debug, Default, Clone)]
pub struct EnvSecretResolver;

impl EnvSecretResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SecretResolver for EnvSecretResolver {
    async fn resolve(&self, secret: &SecretRef) -> Result<SecretString> {
        if secret.scheme() != SCHEME_ENV {
            return Err(EngineError::Secret(format!(
                "unsupported secret scheme '{}' in {}",
                secret.scheme(),
                secret
            )));
        }
        match std::env::var(secret.name()) {
            Ok(value) => Ok(SecretString::new(value)),
            Err(_) => Err(EngineError::Secret(format!(
                "environment variable {} is not set",
                secret.name()
            ))),
        }
    }
}

/// Fixed map of reference strings to values
///
/// Intended for tests and for embedding callers that already hold their
/// secrets in memory.
#[derive(Debug, Default, Clone)]
pub struct StaticSecretResolver {
    values: BTreeMap<String, String>,
}

impl StaticSecretResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, reference: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(reference.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretResolver for StaticSecretResolver {
    async fn resolve(&self, secret: &SecretRef) -> Result<SecretString> {
        self.values
            .get(secret.as_str())
            .map(|value| SecretString::new(value.clone()))
            .ok_or_else(|| EngineError::Secret(format!("no value registered for {}", secret)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_env_resolver_reads_environment() {
        // set_var is unsafe since the process environment is global state
        unsafe { std::env::set_var("EDGEFLOW_TEST_TOKEN", "marvin") };

        let resolver = EnvSecretResolver::new();
        let secret = SecretRef::env("EDGEFLOW_TEST_TOKEN").unwrap();
        let value = resolver.resolve(&secret).await.unwrap();
        assert_eq!(value.expose(), "marvin");
    }

    #[tokio::test]
    async fn test_env_resolver_rejects_unknown_scheme() {
        let resolver = EnvSecretResolver::new();
        let secret = SecretRef::parse("vault://TOKEN").unwrap();
        let err = resolver.resolve(&secret).await.unwrap_err();
        assert!(err.to_string().contains("vault"));
    }

    #[tokio::test]
    async fn test_env_resolver_missing_variable() {
        let resolver = EnvSecretResolver::new();
        let secret = SecretRef::env("EDGEFLOW_TEST_DEFINITELY_UNSET").unwrap();
        assert!(resolver.resolve(&secret).await.is_err());
    }

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticSecretResolver::new().with_secret("env://API_KEY", "forty-two");
        let secret = SecretRef::env("API_KEY").unwrap();
        assert_eq!(resolver.resolve(&secret).await.unwrap().expose(), "forty-two");

        let missing = SecretRef::env("OTHER").unwrap();
        assert!(resolver.resolve(&missing).await.is_err());
    }
}
