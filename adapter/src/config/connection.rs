//! Connection configuration for the Elasticsearch backend.
//!
//! The host hands the adapter an untyped, already-decrypted key/value map. This module
//! extracts the known keys into a typed [`ElasticConfig`] and validates it.

use serde::Serialize;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Untyped configuration map as received from the host.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Index pattern used when the host does not configure one.
pub const DEFAULT_INDEX_PATTERN: &str = "logs-*";

/// Errors that can occur while validating a connection configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither an address list nor a cloud ID was supplied.
    #[error("either 'addresses' or 'cloudID' must be provided")]
    MissingEndpoint,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Typed connection configuration.
///
/// # Example
///
/// ```
/// use adapter::config::ElasticConfig;
/// use serde_json::json;
///
/// let raw = json!({"addresses": ["http://localhost:9200"], "apiKey": "id:key"});
/// let config = ElasticConfig::from_map(raw.as_object().unwrap()).unwrap();
///
/// assert_eq!(config.addresses, vec!["http://localhost:9200"]);
/// assert_eq!(config.index_pattern, "logs-*");
/// assert!(!format!("{config:?}").contains("id:key"));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_endpoint"))]
pub struct ElasticConfig {
    /// Node URLs, tried in order.
    pub addresses: Vec<String>,
    /// Basic-auth user name.
    pub username: Option<String>,
    /// Basic-auth password.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// API key; takes precedence over username/password.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Elastic Cloud ID; takes precedence over `addresses`.
    #[serde(rename = "cloudID")]
    pub cloud_id: Option<String>,
    /// Index pattern to search.
    #[validate(length(min = 1, message = "Index pattern cannot be empty"))]
    pub index_pattern: String,
    /// Base URL of a Kibana instance for Discover links.
    #[serde(rename = "kibanaURL")]
    pub kibana_url: Option<String>,
}

/// Key under which `validator` reports struct-level errors.
const SCHEMA_ERRORS: &str = "__all__";

fn validate_endpoint(config: &ElasticConfig) -> Result<(), ValidationError> {
    if config.addresses.is_empty() && config.cloud_id.is_none() {
        return Err(ValidationError::new("missing_endpoint"));
    }
    Ok(())
}

impl std::fmt::Debug for ElasticConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |secret: &Option<String>| secret.as_ref().map(|_| "<redacted>");
        f.debug_struct("ElasticConfig")
            .field("addresses", &self.addresses)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("api_key", &redact(&self.api_key))
            .field("cloud_id", &self.cloud_id)
            .field("index_pattern", &self.index_pattern)
            .field("kibana_url", &self.kibana_url)
            .finish()
    }
}

impl ElasticConfig {
    /// Extracts the known keys from an untyped map without validating them.
    ///
    /// Non-string `addresses` entries are skipped, empty strings count as absent, and
    /// `indexPattern` falls back to [`DEFAULT_INDEX_PATTERN`].
    #[must_use]
    pub fn parse(raw: &ConfigMap) -> Self {
        let addresses = raw
            .get("addresses")
            .and_then(serde_json::Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            addresses,
            username: string_field(raw, "username"),
            password: string_field(raw, "password"),
            api_key: string_field(raw, "apiKey"),
            cloud_id: string_field(raw, "cloudID"),
            index_pattern: string_field(raw, "indexPattern")
                .unwrap_or_else(|| DEFAULT_INDEX_PATTERN.to_string()),
            kibana_url: string_field(raw, "kibanaURL"),
        }
    }

    /// Parses and validates an untyped map.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEndpoint`] when neither `addresses` nor `cloudID`
    /// is set.
    pub fn from_map(raw: &ConfigMap) -> Result<Self, ConfigError> {
        let config = Self::parse(raw);
        config.validate_connection()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Both `addresses` and `cloudID` are empty ([`ConfigError::MissingEndpoint`])
    /// - `index_pattern` is empty
    pub fn validate_connection(&self) -> Result<(), ConfigError> {
        self.validate().map_err(|errors| {
            if errors.errors().contains_key(SCHEMA_ERRORS) {
                ConfigError::MissingEndpoint
            } else {
                ConfigError::ValidationError(errors)
            }
        })
    }
}

fn string_field(raw: &ConfigMap, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(serde_json::Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
