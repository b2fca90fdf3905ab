//! Elasticsearch HTTP backend.
//!
//! A deliberately small client: `HEAD /` for liveness and `POST /{index}/_search` for
//! queries. Nodes are tried in order and a node is skipped only when the connection
//! itself fails.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

use super::{BackendError, SearchBackend, SearchResponse};
use crate::config::ElasticConfig;

/// Upper bound on establishing a TCP connection to one node. Also bounds the
/// construction ping, which runs outside any query deadline.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How requests authenticate against the cluster.
#[derive(Clone, PartialEq, Eq)]
pub enum ElasticAuth {
    /// No authentication.
    None,
    /// `Authorization: ApiKey <key>`.
    ApiKey(String),
    /// HTTP basic authentication.
    Basic {
        /// User name.
        username: String,
        /// Password, if any.
        password: Option<String>,
    },
}

impl ElasticAuth {
    /// Picks the authentication method for a configuration.
    ///
    /// An API key wins over username/password.
    #[must_use]
    pub fn from_config(config: &ElasticConfig) -> Self {
        if let Some(key) = &config.api_key {
            return Self::ApiKey(key.clone());
        }
        if config.username.is_some() || config.password.is_some() {
            return Self::Basic {
                username: config.username.clone().unwrap_or_default(),
                password: config.password.clone(),
            };
        }
        Self::None
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ApiKey(_) => "api_key",
            Self::Basic { .. } => "basic",
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::None => request,
            Self::ApiKey(key) => request.header(reqwest::header::AUTHORIZATION, format!("ApiKey {key}")),
            Self::Basic { username, password } => request.basic_auth(username, password.as_ref()),
        }
    }
}

impl std::fmt::Debug for ElasticAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// Resolves an Elastic Cloud ID to the cluster's HTTPS endpoint.
///
/// A cloud ID has the form `name:base64(host$es_uuid[$kibana_uuid])`.
///
/// # Errors
///
/// Returns [`BackendError::CloudId`] if the ID cannot be decoded.
///
/// # Example
///
/// ```
/// use adapter::backend::cloud_id_endpoint;
///
/// let url = cloud_id_endpoint("my-cloud:dXMtY2VudHJhbDEuZ2NwLmNsb3VkLmVzLmlvJDEyMzQ1Njc4").unwrap();
/// assert_eq!(url, "https://12345678.us-central1.gcp.cloud.es.io");
/// ```
pub fn cloud_id_endpoint(cloud_id: &str) -> Result<String, BackendError> {
    let encoded = cloud_id.rsplit(':').next().unwrap_or_default();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| BackendError::CloudId(e.to_string()))?;
    let decoded = String::from_utf8(decoded).map_err(|e| BackendError::CloudId(e.to_string()))?;

    let mut parts = decoded.split('$');
    let host = parts.next().filter(|s| !s.is_empty());
    let es_uuid = parts.next().filter(|s| !s.is_empty());

    match (host, es_uuid) {
        (Some(host), Some(es_uuid)) => Ok(format!("https://{es_uuid}.{host}")),
        _ => Err(BackendError::CloudId(
            "expected 'host$es_uuid' after decoding".to_string(),
        )),
    }
}

/// Elasticsearch HTTP client.
#[derive(Debug, Clone)]
pub struct ElasticClient {
    http: Client,
    nodes: Vec<String>,
    auth: ElasticAuth,
}

impl ElasticClient {
    /// Creates a client for a validated configuration.
    ///
    /// A cloud ID takes precedence over the address list.
    ///
    /// # Errors
    ///
    /// Returns an error if the cloud ID is malformed, no node is configured, or the
    /// HTTP client cannot be built.
    pub fn new(config: &ElasticConfig) -> Result<Self, BackendError> {
        let nodes = match &config.cloud_id {
            Some(cloud_id) => vec![cloud_id_endpoint(cloud_id)?],
            None => config
                .addresses
                .iter()
                .map(|address| address.trim_end_matches('/').to_string())
                .collect(),
        };
        if nodes.is_empty() {
            return Err(BackendError::Unavailable("no nodes configured".to_string()));
        }

        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(BackendError::Client)?;

        Ok(Self {
            http,
            nodes,
            auth: ElasticAuth::from_config(config),
        })
    }

    /// Node base URLs, in the order they are tried.
    #[must_use]
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// The authentication method in use.
    #[must_use]
    pub fn auth(&self) -> &ElasticAuth {
        &self.auth
    }

    /// Sends a request to the first node that accepts a connection.
    async fn send<F>(&self, build: F) -> Result<(String, Response), BackendError>
    where
        F: Fn(&Client, &str) -> RequestBuilder,
    {
        let mut last_error = None;

        for node in &self.nodes {
            let request = self.auth.apply(build(&self.http, node));
            match request.send().await {
                Ok(response) => return Ok((node.clone(), response)),
                Err(e) if e.is_connect() => {
                    tracing::warn!(node = %node, error = %e, "Elasticsearch node unreachable");
                    last_error = Some(BackendError::Request {
                        node: node.clone(),
                        source: e,
                    });
                }
                Err(e) => {
                    return Err(BackendError::Request {
                        node: node.clone(),
                        source: e,
                    })
                }
            }
        }

        Err(last_error.unwrap_or_else(|| BackendError::Unavailable("no nodes configured".to_string())))
    }

    async fn error_status(response: Response) -> BackendError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        BackendError::Status { status, body }
    }
}

#[async_trait]
impl SearchBackend for ElasticClient {
    async fn ping(&self) -> Result<(), BackendError> {
        let (node, response) = self.send(|http, node| http.head(format!("{node}/"))).await?;

        if !response.status().is_success() {
            return Err(Self::error_status(response).await);
        }

        tracing::debug!(node = %node, "Elasticsearch ping succeeded");
        Ok(())
    }

    async fn search(
        &self,
        index: &str,
        body: &serde_json::Value,
    ) -> Result<SearchResponse, BackendError> {
        let (node, response) = self
            .send(|http, node| {
                http.post(format!("{node}/{index}/_search"))
                    .query(&[("track_total_hits", "true")])
                    .json(body)
            })
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_status(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| BackendError::Request { node, source })?;

        serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
    }
}
