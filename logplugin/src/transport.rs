//! Line-delimited JSON request/response loop.
//!
//! Each input line is one UTF-8 JSON [`RpcRequest`]; each request gets exactly one [`RpcResponse`]
//! line. The provider is built from the first request that carries a usable config
//! and reused for the rest of the stream.

use adapter::config::ConfigMap;
use adapter::models::LogQuery;
use adapter::{LogProvider, ProviderRegistry, QueryContext, RegistryError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::OnceCell;

/// The only supported method.
pub const METHOD_LOG_QUERY: &str = "log.query";

/// Errors that end the request loop.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Reading from or writing to the stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A request line was not valid JSON for a request.
    #[error("malformed request: {0}")]
    Protocol(#[source] serde_json::Error),

    /// A response could not be serialized.
    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

/// A request record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Method name.
    #[serde(default)]
    pub method: String,

    /// Provider config; only used until a provider has been built.
    #[serde(default)]
    pub config: Option<ConfigMap>,

    /// Method arguments.
    #[serde(default)]
    pub payload: Option<Value>,
}

/// A response record. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Successful result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RpcResponse {
    /// Creates a successful response.
    #[must_use]
    pub fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Request loop state: the registry to build from and the memoized provider.
pub struct Transport {
    registry: ProviderRegistry,
    provider_name: String,
    request_timeout: Option<Duration>,
    provider: OnceCell<Arc<dyn LogProvider>>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("provider_name", &self.provider_name)
            .field("request_timeout", &self.request_timeout)
            .field("initialized", &self.provider.initialized())
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Creates a transport that builds `provider_name` from `registry`.
    #[must_use]
    pub fn new(
        registry: ProviderRegistry,
        provider_name: impl Into<String>,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            provider_name: provider_name.into(),
            request_timeout,
            provider: OnceCell::new(),
        }
    }

    /// Processes requests until end of stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or a request line cannot be decoded. In the
    /// latter case an error response is written first.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<(), TransportError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = Vec::new();
        let mut handled = 0_u64;

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let request: RpcRequest = match serde_json::from_slice(&line) {
                Ok(request) => request,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to decode request, closing stream");
                    write_response(&mut writer, &RpcResponse::failure(e.to_string())).await?;
                    return Err(TransportError::Protocol(e));
                }
            };

            let response = self.handle(request).await;
            write_response(&mut writer, &response).await?;
            handled += 1;
        }

        tracing::info!(requests = handled, "Input closed, shutting down");
        Ok(())
    }

    /// Handles a single decoded request.
    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        let provider = match self.provider(request.config.unwrap_or_default()).await {
            Ok(provider) => provider,
            Err(e) => {
                tracing::warn!(error = %e, "Provider construction failed");
                return RpcResponse::failure(e.to_string());
            }
        };

        match request.method.as_str() {
            METHOD_LOG_QUERY => self.log_query(provider.as_ref(), request.payload).await,
            other => {
                tracing::warn!(method = other, "Unknown method");
                RpcResponse::failure(format!("unknown method: {other}"))
            }
        }
    }

    async fn provider(&self, config: ConfigMap) -> Result<Arc<dyn LogProvider>, RegistryError> {
        self.provider
            .get_or_try_init(|| self.registry.build(&self.provider_name, config))
            .await
            .cloned()
    }

    async fn log_query(&self, provider: &dyn LogProvider, payload: Option<Value>) -> RpcResponse {
        let query: LogQuery = match payload {
            None | Some(Value::Null) => LogQuery::default(),
            Some(payload) => match serde_json::from_value(payload) {
                Ok(query) => query,
                Err(e) => return RpcResponse::failure(format!("invalid log.query payload: {e}")),
            },
        };

        let ctx = QueryContext {
            timeout: self.request_timeout,
        };

        let entries = match provider.query(&ctx, &query).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Query failed");
                return RpcResponse::failure(e.to_string());
            }
        };

        tracing::debug!(entries = entries.len(), "Query succeeded");

        match serde_json::to_value(&entries) {
            Ok(result) => RpcResponse::success(result),
            Err(e) => RpcResponse::failure(e.to_string()),
        }
    }
}

async fn write_response<W>(writer: &mut W, response: &RpcResponse) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(response).map_err(TransportError::Encode)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
