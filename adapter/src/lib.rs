//! Elasticsearch Log Adapter
//!
//! This crate translates canonical log queries into Elasticsearch query DSL, runs them,
//! and normalizes the resulting documents into canonical log entries.
//!
//! # Modules
//!
//! - [`models`] - Canonical query and log entry types
//! - [`config`] - Connection config parsing and validation
//! - [`query`] - Query DSL builder and Kibana Discover links
//! - [`backend`] - Search backend trait, HTTP client and in-memory implementation
//! - [`normalize`] - Search hit to log entry conversion
//! - [`provider`] - The `LogProvider` trait and the Elasticsearch provider
//! - [`registry`] - Name-to-constructor provider registry
//!
//! # Example
//!
//! ```
//! use adapter::models::{LogFilter, LogQuery};
//! use adapter::query::build_search;
//!
//! let query = LogQuery::new()
//!     .with_search("timeout")
//!     .with_filter(LogFilter::new("host", "!=", "web-1"))
//!     .with_service("checkout");
//!
//! let body = build_search(&query).to_body();
//! assert_eq!(body["size"], 1000);
//! assert_eq!(body["query"]["bool"]["must"].as_array().unwrap().len(), 3);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod backend;
pub mod config;
pub mod models;
pub mod normalize;
pub mod provider;
pub mod query;
pub mod registry;

pub use provider::{ElasticProvider, LogProvider, ProviderError, QueryContext, QueryError};
pub use registry::{ProviderRegistry, RegistryError};

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;

/// Name the provider is registered under.
pub const PROVIDER_NAME: &str = "elastic";

/// Version of this adapter.
pub const ADAPTER_VERSION: &str = "0.1.0";

/// Host versions this adapter is compatible with.
pub const REQUIRES_CORE: &str = ">=0.1.0";

/// Registers the Elasticsearch provider.
///
/// # Errors
///
/// Returns [`RegistryError::Duplicate`] if a provider named [`PROVIDER_NAME`] is
/// already registered.
pub fn register(registry: &mut ProviderRegistry) -> Result<(), RegistryError> {
    registry.register(PROVIDER_NAME, provider::new_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_elastic() {
        let mut registry = ProviderRegistry::new();
        register(&mut registry).unwrap();

        assert_eq!(registry.names(), vec![PROVIDER_NAME]);
        assert!(matches!(
            register(&mut registry),
            Err(RegistryError::Duplicate(_))
        ));
    }

    #[test]
    fn test_adapter_version_matches_package() {
        assert_eq!(ADAPTER_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
