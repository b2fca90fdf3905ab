//! Configuration module for the adapter.
//!
//! This module contains the connection configuration parsed from the host's config map.

pub mod connection;

pub use connection::{ConfigError, ConfigMap, ElasticConfig, DEFAULT_INDEX_PATTERN};
