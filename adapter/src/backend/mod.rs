//! Search backend trait and implementations.
//!
//! The [`SearchBackend`] trait is the seam between the provider and the search engine.
//! [`ElasticClient`] talks to a real cluster over HTTP; [`InMemoryBackend`] evaluates
//! the query DSL against documents held in memory, for development and testing.

pub mod elastic;
pub mod memory;

pub use elastic::{cloud_id_endpoint, ElasticAuth, ElasticClient};
pub use memory::InMemoryBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to a search backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The HTTP client could not be created.
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request could not be sent or its response not read.
    #[error("request to {node} failed: {source}")]
    Request {
        /// The node the request was sent to.
        node: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("elasticsearch returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned by the backend.
        body: String,
    },

    /// The response body could not be parsed.
    #[error("failed to parse response: {0}")]
    Decode(String),

    /// The configured cloud ID is malformed.
    #[error("invalid cloud ID: {0}")]
    CloudId(String),

    /// No node is configured or the backend refuses service.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// A single search hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Index the document was found in.
    #[serde(rename = "_index", default)]
    pub index: String,

    /// Document identifier.
    #[serde(rename = "_id", default)]
    pub id: String,

    /// Relevance score; absent on sorted searches.
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,

    /// The stored document.
    #[serde(rename = "_source", default)]
    pub source: serde_json::Map<String, serde_json::Value>,
}

/// Total hit count as reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalHits {
    /// Number of matching documents.
    #[serde(default)]
    pub value: u64,
}

/// The `hits` envelope of a search response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hits {
    /// Total matches (before `size` is applied).
    #[serde(default)]
    pub total: Option<TotalHits>,

    /// Returned hits, in backend order.
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

/// A search response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Hit envelope.
    #[serde(default)]
    pub hits: Hits,
}

/// Trait for search backend implementations.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Checks that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or reports a failure.
    async fn ping(&self) -> Result<(), BackendError>;

    /// Runs a search body against an index pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    async fn search(
        &self,
        index: &str,
        body: &serde_json::Value,
    ) -> Result<SearchResponse, BackendError>;
}
