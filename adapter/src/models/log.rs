//! Log entry data model.
//!
//! Defines the canonical `LogEntry` every backend result is normalized into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::wire_time;

/// A normalized log entry.
///
/// The well-known attributes (timestamp, message, severity, service) are promoted to
/// named fields. Everything else in the source document lands in `fields`, and the
/// string-valued subset of it in `labels`.
///
/// # Example
///
/// ```
/// use adapter::models::LogEntry;
///
/// let entry = LogEntry::new("Connection reset", "error", "checkout")
///     .with_field("host", "web-1")
///     .with_field("attempt", 3);
///
/// assert_eq!(entry.labels.get("host").map(String::as_str), Some("web-1"));
/// assert!(!entry.labels.contains_key("attempt"));
/// assert!(entry.validate_partition().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the event occurred; `None` when the source had no parsable timestamp.
    #[serde(with = "wire_time", default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// The log message content.
    #[serde(default)]
    pub message: String,

    /// Severity as reported by the source document.
    #[serde(default)]
    pub severity: String,

    /// Name of the service that produced the log.
    #[serde(default)]
    pub service: String,

    /// String-valued extra fields.
    #[serde(default)]
    pub labels: HashMap<String, String>,

    /// All extra fields, including non-string values.
    #[serde(default)]
    pub fields: HashMap<String, serde_json::Value>,

    /// Backend provenance (index, document id, score).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Errors reported when a log entry breaks the labels/fields partition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogPartitionError {
    /// A label has no counterpart in `fields`, or the values differ.
    #[error("Label '{0}' does not match its field value")]
    LabelMismatch(String),

    /// A promoted attribute name leaked into `labels` or `fields`.
    #[error("Promoted field '{0}' must not appear in labels or fields")]
    PromotedField(String),
}

impl LogEntry {
    /// Field names promoted to named attributes and excluded from `labels`/`fields`.
    pub const PROMOTED_FIELDS: [&'static str; 5] =
        ["@timestamp", "message", "severity", "level", "service"];

    /// Creates a new entry without a timestamp.
    #[must_use]
    pub fn new(
        message: impl Into<String>,
        severity: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            severity: severity.into(),
            service: service.into(),
            ..Self::default()
        }
    }

    /// Sets the event timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Adds an extra field, mirroring it into `labels` when it is a string.
    ///
    /// Promoted field names are ignored.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert_field(key.into(), value.into());
        self
    }

    /// Adds a provenance entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns true when `key` is one of the promoted field names.
    #[must_use]
    pub fn is_promoted(key: &str) -> bool {
        Self::PROMOTED_FIELDS.contains(&key)
    }

    pub(crate) fn insert_field(&mut self, key: String, value: serde_json::Value) {
        if Self::is_promoted(&key) {
            return;
        }
        if let serde_json::Value::String(s) = &value {
            self.labels.insert(key.clone(), s.clone());
        }
        self.fields.insert(key, value);
    }

    /// Checks that `labels` is the string-valued subset of `fields` and that neither
    /// contains a promoted name.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate_partition(&self) -> Result<(), LogPartitionError> {
        for key in self.fields.keys().chain(self.labels.keys()) {
            if Self::is_promoted(key) {
                return Err(LogPartitionError::PromotedField(key.clone()));
            }
        }
        for (key, label) in &self.labels {
            match self.fields.get(key) {
                Some(serde_json::Value::String(value)) if value == label => {}
                _ => return Err(LogPartitionError::LabelMismatch(key.clone())),
            }
        }
        Ok(())
    }
}
