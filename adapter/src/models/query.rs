//! Canonical log query model.
//!
//! Defines the backend-agnostic `LogQuery` the host sends and its building blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{nullable, wire_time};

/// Operator of a structured filter.
///
/// Unknown operators are kept verbatim in [`FilterOperator::Other`] so that a
/// newer host can send operators this adapter does not understand yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterOperator {
    /// Exact equality (`=`).
    Eq,
    /// Negated equality (`!=`).
    NotEq,
    /// Substring match (`contains`).
    Contains,
    /// Regular expression match (`regex`).
    Regex,
    /// Any operator not listed above.
    Other(String),
}

impl FilterOperator {
    /// Returns the wire representation of the operator.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Contains => "contains",
            Self::Regex => "regex",
            Self::Other(op) => op,
        }
    }
}

impl From<String> for FilterOperator {
    fn from(op: String) -> Self {
        match op.as_str() {
            "=" => Self::Eq,
            "!=" => Self::NotEq,
            "contains" => Self::Contains,
            "regex" => Self::Regex,
            _ => Self::Other(op),
        }
    }
}

impl From<&str> for FilterOperator {
    fn from(op: &str) -> Self {
        Self::from(op.to_string())
    }
}

impl From<FilterOperator> for String {
    fn from(op: FilterOperator) -> Self {
        match op {
            FilterOperator::Other(op) => op,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured field filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    /// The document field to test.
    pub field: String,
    /// How the field is compared with `value`.
    pub operator: FilterOperator,
    /// The value to compare against.
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub value: String,
}

impl LogFilter {
    /// Creates a new filter.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<FilterOperator>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// Free-text, severity, and structured filter expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogExpression {
    /// Free-text search in the backend's query-string syntax.
    #[serde(deserialize_with = "nullable::deserialize")]
    pub search: String,
    /// Severities to match (set membership).
    #[serde(deserialize_with = "nullable::deserialize")]
    pub severity_in: Vec<String>,
    /// Structured filters, applied in order.
    #[serde(deserialize_with = "nullable::deserialize")]
    pub filters: Vec<LogFilter>,
}

/// Service/environment/team scope of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryScope {
    /// Exact service name.
    #[serde(deserialize_with = "nullable::deserialize")]
    pub service: String,
    /// Exact environment name.
    #[serde(deserialize_with = "nullable::deserialize")]
    pub environment: String,
    /// Exact team name.
    #[serde(deserialize_with = "nullable::deserialize")]
    pub team: String,
}

/// A canonical, backend-agnostic log query.
///
/// # Example
///
/// ```
/// use adapter::models::LogQuery;
///
/// let query: LogQuery = serde_json::from_str(
///     r#"{"expression": {"search": "timeout", "severityIn": ["error"]}, "limit": 5}"#,
/// )
/// .unwrap();
///
/// assert_eq!(query.limit, 5);
/// assert_eq!(query.expression.unwrap().severity_in, vec!["error"]);
/// assert!(query.start.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogQuery {
    /// Inclusive lower time bound; `None` is unbounded.
    #[serde(with = "wire_time")]
    pub start: Option<DateTime<Utc>>,

    /// Inclusive upper time bound; `None` is unbounded.
    #[serde(with = "wire_time")]
    pub end: Option<DateTime<Utc>>,

    /// Optional search expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<LogExpression>,

    /// Scope restrictions.
    #[serde(deserialize_with = "nullable::deserialize")]
    pub scope: QueryScope,

    /// Extra exact-match field constraints.
    #[serde(deserialize_with = "nullable::deserialize")]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Maximum number of entries; zero or negative uses the backend default.
    pub limit: i64,
}

impl LogQuery {
    /// Creates a new empty query (matches everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the start time bound.
    #[must_use]
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Sets the end time bound.
    #[must_use]
    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Sets the free-text search.
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.expression.get_or_insert_with(LogExpression::default).search = search.into();
        self
    }

    /// Adds a severity to match.
    #[must_use]
    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.expression
            .get_or_insert_with(LogExpression::default)
            .severity_in
            .push(severity.into());
        self
    }

    /// Appends a structured filter.
    #[must_use]
    pub fn with_filter(mut self, filter: LogFilter) -> Self {
        self.expression
            .get_or_insert_with(LogExpression::default)
            .filters
            .push(filter);
        self
    }

    /// Sets the service scope.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.scope.service = service.into();
        self
    }

    /// Sets the environment scope.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.scope.environment = environment.into();
        self
    }

    /// Sets the team scope.
    #[must_use]
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.scope.team = team.into();
        self
    }

    /// Adds an exact-match metadata constraint.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the maximum number of results.
    #[must_use]
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}
