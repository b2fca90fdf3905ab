//! Elasticsearch Log Plugin Binary
//!
//! Entry point for the out-of-process log plugin.

#![deny(unsafe_code)]

use anyhow::Result;
use logplugin::{LogFormat, PluginConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = PluginConfig::from_env()?;

    // Initialize tracing; stdout carries the protocol.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    logplugin::run_stdio(config).await
}
