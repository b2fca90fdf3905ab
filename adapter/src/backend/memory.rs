//! In-memory search backend.
//!
//! Stores documents in a `Vec` protected by a `RwLock` and evaluates the subset of the
//! query DSL that [`build_search`](crate::query::build_search) produces. It is meant
//! for development and tests, not as a faithful Elasticsearch emulation: text matching
//! is a case-insensitive substring test and `query_string` only understands bare or
//! `field:value` terms joined by `OR`/`AND`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, PoisonError, RwLock};

use super::{BackendError, Hits, SearchBackend, SearchHit, SearchResponse, TotalHits};
use crate::query::TIMESTAMP_FIELD;

/// Result size Elasticsearch uses when a body has no `size`.
const DEFAULT_BACKEND_SIZE: usize = 10;

#[derive(Debug, Clone)]
struct StoredDocument {
    index: String,
    id: String,
    source: Map<String, Value>,
}

impl StoredDocument {
    fn new(index: impl Into<String>, id: impl Into<String>, source: Value) -> Self {
        let source = match source {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            index: index.into(),
            id: id.into(),
            source,
        }
    }
}

/// In-memory search backend.
///
/// # Example
///
/// ```
/// use adapter::backend::{InMemoryBackend, SearchBackend};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let backend = InMemoryBackend::new()
///     .with_document("logs-a", "1", json!({"message": "disk full", "severity": "error"}));
///
/// let body = json!({"query": {"bool": {"must": [{"term": {"severity": "error"}}]}}});
/// let response = backend.search("logs-*", &body).await.unwrap();
/// assert_eq!(response.hits.hits.len(), 1);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    documents: Arc<RwLock<Vec<StoredDocument>>>,
    reachable: bool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// Creates a new empty, reachable backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(Vec::new())),
            reachable: true,
        }
    }

    /// Creates a backend whose ping always fails.
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    /// Adds a document and returns the backend.
    ///
    /// Non-object sources are stored as empty documents. A poisoned lock is recovered,
    /// so this never fails.
    #[must_use]
    pub fn with_document(self, index: impl Into<String>, id: impl Into<String>, source: Value) -> Self {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoredDocument::new(index, id, source));
        self
    }

    /// Adds a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn insert(
        &self,
        index: impl Into<String>,
        id: impl Into<String>,
        source: Value,
    ) -> Result<(), BackendError> {
        let mut documents = self.documents.write().map_err(|_| lock_error())?;
        documents.push(StoredDocument::new(index, id, source));
        Ok(())
    }

    /// Returns the number of stored documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn count(&self) -> Result<usize, BackendError> {
        let documents = self.documents.read().map_err(|_| lock_error())?;
        Ok(documents.len())
    }
}

fn lock_error() -> BackendError {
    BackendError::Unavailable("failed to acquire lock on in-memory store".to_string())
}

fn bad_request(reason: impl Into<String>) -> BackendError {
    BackendError::Status {
        status: 400,
        body: reason.into(),
    }
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    async fn ping(&self) -> Result<(), BackendError> {
        if self.reachable {
            Ok(())
        } else {
            Err(BackendError::Unavailable("in-memory backend is offline".to_string()))
        }
    }

    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse, BackendError> {
        let clauses = match body.pointer("/query/bool/must") {
            Some(Value::Array(clauses)) => clauses.as_slice(),
            Some(_) => return Err(bad_request("query.bool.must must be an array")),
            None => &[],
        };
        let size = body
            .get("size")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_BACKEND_SIZE, |size| usize::try_from(size).unwrap_or(usize::MAX));
        let index_matcher = wildcard_regex(index)?;

        let documents = self.documents.read().map_err(|_| lock_error())?;

        let mut matched = Vec::new();
        for document in documents.iter() {
            if !index_matcher.is_match(&document.index) {
                continue;
            }
            if all_match(clauses, &document.source)? {
                matched.push(document);
            }
        }

        // Newest first; documents without a timestamp sort last.
        matched.sort_by(|a, b| timestamp_of(&b.source).cmp(&timestamp_of(&a.source)));

        let total = matched.len() as u64;
        let hits = matched
            .into_iter()
            .take(size)
            .map(|document| SearchHit {
                index: document.index.clone(),
                id: document.id.clone(),
                score: None,
                source: document.source.clone(),
            })
            .collect();

        Ok(SearchResponse {
            hits: Hits {
                total: Some(TotalHits { value: total }),
                hits,
            },
        })
    }
}

fn all_match(clauses: &[Value], source: &Map<String, Value>) -> Result<bool, BackendError> {
    for clause in clauses {
        if !clause_matches(clause, source)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clause_matches(clause: &Value, source: &Map<String, Value>) -> Result<bool, BackendError> {
    let Some((kind, params)) = clause.as_object().and_then(|object| object.iter().next()) else {
        return Err(bad_request("empty query clause"));
    };
    let (field, argument) = params
        .as_object()
        .and_then(|object| object.iter().next())
        .ok_or_else(|| bad_request(format!("malformed {kind} clause")))?;

    match kind.as_str() {
        "range" => Ok(range_matches(lookup(source, field), argument)),
        "query_string" => Ok(query_string_matches(params, source)),
        "term" => Ok(lookup(source, field).is_some_and(|value| scalar_eq(value, argument))),
        "terms" => {
            let candidates = argument
                .as_array()
                .ok_or_else(|| bad_request("terms clause expects an array"))?;
            Ok(lookup(source, field)
                .is_some_and(|value| candidates.iter().any(|candidate| scalar_eq(value, candidate))))
        }
        "wildcard" => {
            let pattern = wildcard_regex(pattern_value(argument)?)?;
            Ok(text_of(lookup(source, field)).is_some_and(|text| pattern.is_match(&text)))
        }
        "regexp" => {
            let pattern = Regex::new(&format!("^(?:{})$", pattern_value(argument)?))
                .map_err(|e| bad_request(format!("invalid regexp: {e}")))?;
            Ok(text_of(lookup(source, field)).is_some_and(|text| pattern.is_match(&text)))
        }
        "bool" => bool_matches(params, source),
        other => Err(bad_request(format!("unsupported query clause: {other}"))),
    }
}

fn bool_matches(params: &Value, source: &Map<String, Value>) -> Result<bool, BackendError> {
    let as_list = |value: Option<&Value>| match value {
        Some(Value::Array(items)) => items.clone(),
        Some(item) => vec![item.clone()],
        None => Vec::new(),
    };

    if !all_match(&as_list(params.get("must")), source)? {
        return Ok(false);
    }
    for clause in as_list(params.get("must_not")) {
        if clause_matches(&clause, source)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Resolves `field` directly, then as a dotted path into nested objects.
fn lookup<'a>(source: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    if let Some(value) = source.get(field) {
        return Some(value);
    }
    let mut parts = field.split('.');
    let mut current = source.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_eq(value: &Value, expected: &Value) -> bool {
    if let Value::Array(items) = value {
        return items.iter().any(|item| scalar_eq(item, expected));
    }
    value == expected || text_of(Some(value)).is_some_and(|text| Some(text) == text_of(Some(expected)))
}

fn pattern_value(argument: &Value) -> Result<&str, BackendError> {
    argument
        .get("value")
        .and_then(Value::as_str)
        .or_else(|| argument.as_str())
        .ok_or_else(|| bad_request("pattern clause expects a string value"))
}

fn wildcard_regex(pattern: &str) -> Result<Regex, BackendError> {
    let mut expression = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => expression.push_str(".*"),
            '?' => expression.push('.'),
            other => expression.push_str(&regex::escape(&other.to_string())),
        }
    }
    expression.push('$');
    Regex::new(&expression).map_err(|e| bad_request(format!("invalid wildcard: {e}")))
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

fn timestamp_of(source: &Map<String, Value>) -> Option<DateTime<Utc>> {
    source.get(TIMESTAMP_FIELD).and_then(parse_timestamp)
}

fn range_matches(value: Option<&Value>, bounds: &Value) -> bool {
    let Some(ts) = value.and_then(parse_timestamp) else {
        return false;
    };
    let bound = |key: &str| bounds.get(key).and_then(parse_timestamp);

    bound("gte").map_or(true, |gte| ts >= gte)
        && bound("gt").map_or(true, |gt| ts > gt)
        && bound("lte").map_or(true, |lte| ts <= lte)
        && bound("lt").map_or(true, |lt| ts < lt)
}

fn query_string_matches(params: &Value, source: &Map<String, Value>) -> bool {
    let query = params.get("query").and_then(Value::as_str).unwrap_or_default();

    // OR binds tighter than AND here: "a OR b AND c" is (a OR b) AND c.
    query.split(" AND ").all(|group| {
        let terms: Vec<&str> = group
            .split_whitespace()
            .filter(|token| *token != "OR")
            .collect();
        terms.is_empty() || terms.iter().any(|term| term_matches(term, source))
    })
}

fn term_matches(term: &str, source: &Map<String, Value>) -> bool {
    let contains = |value: &Value, needle: &str| {
        text_of(Some(value)).is_some_and(|text| text.to_lowercase().contains(needle))
    };

    if let Some((field, needle)) = term.split_once(':') {
        let needle = needle.trim_matches('"').to_lowercase();
        return lookup(source, field).is_some_and(|value| contains(value, &needle));
    }

    let needle = term.trim_matches('"').to_lowercase();
    source.values().any(|value| contains(value, &needle))
}
