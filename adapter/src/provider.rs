//! The Elasticsearch log provider.
//!
//! [`ElasticProvider`] ties the pieces together: it validates the connection config,
//! builds and probes a [`SearchBackend`], then answers [`LogQuery`] values by building a
//! search body, running it, and normalizing every hit.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::backend::{BackendError, ElasticClient, SearchBackend};
use crate::config::{ConfigError, ConfigMap, ElasticConfig};
use crate::models::{LogEntry, LogQuery};
use crate::normalize::normalize_hit;
use crate::query::{build_search, discover_url};

/// Errors that can occur while constructing a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The connection config is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The backend client could not be created.
    #[error("failed to create Elasticsearch client: {0}")]
    ClientSetup(#[source] BackendError),

    /// The liveness probe failed.
    #[error("failed to connect to Elasticsearch: {0}")]
    Unreachable(#[source] BackendError),
}

/// Errors that can occur while executing a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The backend rejected or failed the search.
    #[error("elasticsearch query failed: {0}")]
    Backend(#[from] BackendError),

    /// The search did not finish within the caller's deadline.
    #[error("query deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

/// Per-call execution context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryContext {
    /// Upper bound on the backend round trip; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl QueryContext {
    /// Creates a context without a deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A source of normalized log entries.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait LogProvider: Send + Sync {
    /// Runs a query and returns matching entries in backend order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the deadline expires.
    async fn query(&self, ctx: &QueryContext, query: &LogQuery) -> Result<Vec<LogEntry>, QueryError>;
}

/// Log provider backed by Elasticsearch.
pub struct ElasticProvider {
    config: ElasticConfig,
    backend: Arc<dyn SearchBackend>,
}

impl std::fmt::Debug for ElasticProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ElasticProvider {
    /// Validates `raw`, creates an HTTP client, and pings the cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid, the client cannot be created, or the
    /// cluster does not answer the ping.
    pub async fn connect(raw: &ConfigMap) -> Result<Self, ProviderError> {
        let config = ElasticConfig::from_map(raw)?;
        let client = ElasticClient::new(&config).map_err(ProviderError::ClientSetup)?;

        tracing::debug!(nodes = ?client.nodes(), auth = ?client.auth(), "Elasticsearch client created");

        Self::with_backend(config, Arc::new(client)).await
    }

    /// Creates a provider over an existing backend, pinging it first.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the backend does not answer the ping.
    pub async fn with_backend(
        config: ElasticConfig,
        backend: Arc<dyn SearchBackend>,
    ) -> Result<Self, ProviderError> {
        config.validate_connection()?;
        backend.ping().await.map_err(ProviderError::Unreachable)?;

        tracing::info!(
            index_pattern = %config.index_pattern,
            addresses = config.addresses.len(),
            cloud = config.cloud_id.is_some(),
            "Connected to Elasticsearch"
        );

        Ok(Self { config, backend })
    }

    /// The validated connection config.
    #[must_use]
    pub fn config(&self) -> &ElasticConfig {
        &self.config
    }

    /// Kibana Discover link for `query`, if a Kibana URL is configured.
    #[must_use]
    pub fn discover_url(&self, query: &LogQuery) -> Option<String> {
        let base = self.config.kibana_url.as_deref()?;
        discover_url(base, &self.config.index_pattern, query)
    }
}

#[async_trait]
impl LogProvider for ElasticProvider {
    async fn query(&self, ctx: &QueryContext, query: &LogQuery) -> Result<Vec<LogEntry>, QueryError> {
        let body = build_search(query).to_body();
        let index = self.config.index_pattern.as_str();

        tracing::debug!(index, body = %body, "Executing search");

        let search = self.backend.search(index, &body);
        let response = match ctx.timeout {
            Some(limit) => tokio::time::timeout(limit, search)
                .await
                .map_err(|_| QueryError::DeadlineExceeded(limit))??,
            None => search.await?,
        };

        let total = response.hits.total.map(|total| total.value);
        let entries: Vec<LogEntry> = response.hits.hits.into_iter().map(normalize_hit).collect();

        tracing::debug!(index, returned = entries.len(), total = ?total, "Search completed");

        Ok(entries)
    }
}

/// Builds an Elasticsearch provider from an untyped config map.
///
/// This is the constructor registered under [`PROVIDER_NAME`](crate::PROVIDER_NAME).
///
/// # Errors
///
/// See [`ElasticProvider::connect`].
pub async fn new_provider(raw: ConfigMap) -> Result<Arc<dyn LogProvider>, ProviderError> {
    let provider = ElasticProvider::connect(&raw).await?;
    Ok(Arc::new(provider))
}
