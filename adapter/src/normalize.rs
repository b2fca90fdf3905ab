//! Result normalization.
//!
//! Converts backend hits into canonical [`LogEntry`] values.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::backend::SearchHit;
use crate::models::LogEntry;
use crate::query::TIMESTAMP_FIELD;

/// Metadata key holding the source index.
pub const INDEX_KEY: &str = "_index";
/// Metadata key holding the document id.
pub const ID_KEY: &str = "_id";
/// Metadata key holding the relevance score.
pub const SCORE_KEY: &str = "_score";

/// Converts one search hit into a log entry.
///
/// Promoted attributes are read only when they hold strings. An unparsable or missing
/// `@timestamp` leaves the timestamp unset; the entry is still returned.
///
/// # Example
///
/// ```
/// use adapter::backend::SearchHit;
/// use adapter::normalize::normalize_hit;
/// use serde_json::json;
///
/// let hit: SearchHit = serde_json::from_value(json!({
///     "_index": "logs-a",
///     "_id": "1",
///     "_source": {"message": "boom", "level": "error", "host": "web-1"}
/// }))
/// .unwrap();
///
/// let entry = normalize_hit(hit);
/// assert_eq!(entry.severity, "error");
/// assert_eq!(entry.labels["host"], "web-1");
/// assert_eq!(entry.metadata["_id"], "1");
/// ```
#[must_use]
pub fn normalize_hit(hit: SearchHit) -> LogEntry {
    let SearchHit {
        index,
        id,
        score,
        mut source,
    } = hit;

    let string = |key: &str| source.get(key).and_then(Value::as_str).map(str::to_string);

    let mut entry = LogEntry {
        timestamp: source.get(TIMESTAMP_FIELD).and_then(parse_timestamp),
        message: string("message").unwrap_or_default(),
        severity: string("severity")
            .or_else(|| string("level"))
            .unwrap_or_default(),
        service: string("service").unwrap_or_default(),
        ..LogEntry::default()
    };

    source.retain(|key, _| !LogEntry::is_promoted(key));
    for (key, value) in source {
        entry.insert_field(key, value);
    }

    entry.metadata.insert(INDEX_KEY.to_string(), Value::String(index));
    entry.metadata.insert(ID_KEY.to_string(), Value::String(id));
    entry.metadata.insert(
        SCORE_KEY.to_string(),
        score.map_or(Value::Null, Value::from),
    );

    entry
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!(timestamp = raw, error = %e, "Unparsable @timestamp");
            None
        }
    }
}
