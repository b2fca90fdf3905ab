//! Provider registry.
//!
//! Maps provider names to constructors. The registry is a plain value owned by the
//! composition root and populated once at startup; adapters add themselves through a
//! `register` function.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ConfigMap;
use crate::provider::{LogProvider, ProviderError};

/// Future returned by a provider constructor.
pub type ProviderFuture =
    Pin<Box<dyn Future<Output = Result<Arc<dyn LogProvider>, ProviderError>> + Send>>;

/// Builds a provider from an untyped config map.
pub type ProviderConstructor = Arc<dyn Fn(ConfigMap) -> ProviderFuture + Send + Sync>;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A constructor is already registered under this name.
    #[error("provider '{0}' is already registered")]
    Duplicate(String),

    /// No constructor is registered under this name.
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    /// The constructor failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Name-to-constructor mapping.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    constructors: HashMap<String, ProviderConstructor>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the name is taken; the existing
    /// constructor is kept.
    pub fn register<F, Fut>(&mut self, name: &str, constructor: F) -> Result<(), RegistryError>
    where
        F: Fn(ConfigMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn LogProvider>, ProviderError>> + Send + 'static,
    {
        if self.constructors.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        let boxed: ProviderConstructor =
            Arc::new(move |config: ConfigMap| -> ProviderFuture { Box::pin(constructor(config)) });
        self.constructors.insert(name.to_string(), boxed);

        tracing::debug!(provider = name, "Registered log provider");
        Ok(())
    }

    /// Returns the constructor registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ProviderConstructor> {
        self.constructors.get(name).cloned()
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered provider names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Builds the provider registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown or construction fails.
    pub async fn build(&self, name: &str, config: ConfigMap) -> Result<Arc<dyn LogProvider>, RegistryError> {
        let constructor = self
            .get(name)
            .ok_or_else(|| RegistryError::UnknownProvider(name.to_string()))?;
        Ok(constructor(config).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogEntry, LogQuery};
    use crate::provider::{QueryContext, QueryError};
    use async_trait::async_trait;
    use serde_json::json;

    struct StaticProvider;

    #[async_trait]
    impl LogProvider for StaticProvider {
        async fn query(&self, _ctx: &QueryContext, _query: &LogQuery) -> Result<Vec<LogEntry>, QueryError> {
            Ok(vec![LogEntry::new("hello", "info", "test")])
        }
    }

    async fn static_provider(_config: ConfigMap) -> Result<Arc<dyn LogProvider>, ProviderError> {
        Ok(Arc::new(StaticProvider))
    }

    #[tokio::test]
    async fn test_register_and_build() {
        let mut registry = ProviderRegistry::new();
        registry.register("static", static_provider).unwrap();

        let provider = registry.build("static", ConfigMap::new()).await.unwrap();
        let entries = provider
            .query(&QueryContext::new(), &LogQuery::new())
            .await
            .unwrap();
        assert_eq!(entries[0].message, "hello");
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = ProviderRegistry::new();
        registry.register("static", static_provider).unwrap();

        let result = registry.register("static", static_provider);
        assert!(matches!(result, Err(RegistryError::Duplicate(name)) if name == "static"));
        assert_eq!(registry.names(), vec!["static"]);
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let registry = ProviderRegistry::new();
        let result = registry.build("missing", ConfigMap::new()).await;
        assert!(matches!(result, Err(RegistryError::UnknownProvider(name)) if name == "missing"));
    }

    #[tokio::test]
    async fn test_constructor_errors_pass_through() {
        let mut registry = ProviderRegistry::new();
        crate::register(&mut registry).unwrap();

        let config = json!({"indexPattern": "logs-*"}).as_object().cloned().unwrap();
        let result = registry.build(crate::PROVIDER_NAME, config).await;

        let Err(err) = result else {
            panic!("expected construction to fail");
        };
        assert_eq!(err.to_string(), "either 'addresses' or 'cloudID' must be provided");
    }

    #[test]
    fn test_names_are_sorted() {
        let mut registry = ProviderRegistry::new();
        registry.register("zeta", static_provider).unwrap();
        registry.register("alpha", static_provider).unwrap();
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
        assert!(registry.contains("alpha"));
        assert!(!registry.contains("beta"));
    }
}
