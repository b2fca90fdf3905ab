//! Serde helpers for host wire timestamps.
//!
//! The host encodes an unset timestamp as its zero instant (`0001-01-01T00:00:00Z`)
//! rather than omitting it. These helpers map that instant, `null`, and absent fields
//! to `None`, and encode `None` back as the zero instant.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// The host's zero instant as it appears on the wire.
pub const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

/// Unix seconds of `0001-01-01T00:00:00Z`.
const ZERO_UNIX_SECONDS: i64 = -62_135_596_800;

/// Returns true when `ts` is the host's zero instant.
#[must_use]
pub fn is_zero(ts: &DateTime<Utc>) -> bool {
    ts.timestamp() == ZERO_UNIX_SECONDS && ts.timestamp_subsec_nanos() == 0
}

/// Serializes an optional timestamp, writing the zero instant for `None`.
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        None => serializer.serialize_str(ZERO_TIME),
    }
}

/// Deserializes an optional timestamp, treating `null` and the zero instant as `None`.
///
/// # Errors
///
/// Returns an error if the value is a string that is not valid RFC 3339.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(raw.filter(|ts| !is_zero(ts)))
}
