//! Elasticsearch Log Plugin
//!
//! This crate exposes the Elasticsearch log provider as an out-of-process plugin. The
//! host writes one JSON request per line to the plugin's stdin and reads one JSON
//! response per line from its stdout. Diagnostics go to stderr.
//!
//! # Example
//!
//! ```no_run
//! use logplugin::{run_stdio, PluginConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_stdio(PluginConfig::from_env()?).await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
pub mod transport;

pub use config::{LogFormat, PluginConfig, LOG_FORMAT_ENV, REQUEST_TIMEOUT_ENV};
pub use transport::{RpcRequest, RpcResponse, Transport, TransportError, METHOD_LOG_QUERY};

use adapter::ProviderRegistry;
use anyhow::Result;
use tokio::io::BufReader;

/// Serves requests from stdin until it closes.
///
/// # Errors
///
/// Returns an error if:
/// - The provider registry cannot be populated
/// - Reading stdin or writing stdout fails
/// - A request line cannot be decoded
pub async fn run_stdio(config: PluginConfig) -> Result<()> {
    let mut registry = ProviderRegistry::new();
    adapter::register(&mut registry)?;

    tracing::info!(
        provider = adapter::PROVIDER_NAME,
        version = adapter::ADAPTER_VERSION,
        requires_core = adapter::REQUIRES_CORE,
        request_timeout = ?config.request_timeout,
        "Log plugin starting"
    );

    let transport = Transport::new(registry, adapter::PROVIDER_NAME, config.request_timeout);
    transport
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    Ok(())
}
