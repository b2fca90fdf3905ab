//! Plugin process configuration.
//!
//! Handles loading configuration from environment variables with sensible defaults.
//! Connection settings are not read here; they arrive with every request.

use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Environment variable holding the per-request timeout in seconds.
pub const REQUEST_TIMEOUT_ENV: &str = "ELASTIC_LOGPLUGIN_REQUEST_TIMEOUT_SECS";

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "ELASTIC_LOGPLUGIN_LOG_FORMAT";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Format of diagnostic log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => bail!("unknown log format '{other}', expected 'text' or 'json'"),
        }
    }
}

/// Plugin configuration.
///
/// Configuration values can be set via environment variables:
/// - `ELASTIC_LOGPLUGIN_REQUEST_TIMEOUT_SECS`: Deadline for each query (default: 30, 0 disables it)
/// - `ELASTIC_LOGPLUGIN_LOG_FORMAT`: `text` or `json` (default: text)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    /// Deadline applied to every query; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Format of the diagnostic logs written to stderr.
    pub log_format: LogFormat,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            log_format: LogFormat::Text,
        }
    }
}

impl PluginConfig {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `ELASTIC_LOGPLUGIN_REQUEST_TIMEOUT_SECS` is set but is not a whole number
    /// - `ELASTIC_LOGPLUGIN_LOG_FORMAT` is set but is neither `text` nor `json`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let timeout_secs = lookup(REQUEST_TIMEOUT_ENV)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("{REQUEST_TIMEOUT_ENV} must be a whole number of seconds"))
            })
            .transpose()?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let log_format = lookup(LOG_FORMAT_ENV)
            .map(|raw| raw.trim().parse::<LogFormat>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            request_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            log_format,
        })
    }
}
