//! Serde helper for host fields that may be `null`.
//!
//! The host writes empty lists, maps, and nested records as `null`. Use with
//! `#[serde(deserialize_with = "nullable::deserialize")]` to decode `null` as the
//! field's default value.

use serde::{Deserialize, Deserializer};

/// Deserializes `T`, mapping `null` to `T::default()`.
///
/// # Errors
///
/// Returns an error if the value is neither `null` nor a valid `T`.
pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
