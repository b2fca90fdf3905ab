//! Elasticsearch query DSL builder.
//!
//! Translates a canonical [`LogQuery`] into a `bool`/`must` search body. Clause order is
//! deterministic: time range, free text, severities, filters (input order), scope, then
//! metadata (sorted by key).

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::models::{FilterOperator, LogFilter, LogQuery};

/// Document field holding the event time.
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// Result size used when the query does not set a positive limit.
pub const DEFAULT_SIZE: usize = 1000;

/// A built search request: the conjunctive clauses plus paging.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Clauses combined with logical AND.
    pub must: Vec<Value>,
    /// Maximum number of hits to return.
    pub size: usize,
}

impl SearchRequest {
    /// Renders the request as a search body.
    #[must_use]
    pub fn to_body(&self) -> Value {
        json!({
            "query": {
                "bool": {
                    "must": self.must,
                },
            },
            "sort": [
                { TIMESTAMP_FIELD: { "order": "desc" } },
            ],
            "size": self.size,
        })
    }
}

/// Builds the search request for a canonical query.
///
/// # Example
///
/// ```
/// use adapter::models::{LogFilter, LogQuery};
/// use adapter::query::build_search;
///
/// let query = LogQuery::new()
///     .with_search("timeout")
///     .with_filter(LogFilter::new("status", "=", "500"))
///     .with_filter(LogFilter::new("status", ">=", "400"))
///     .with_limit(20);
///
/// let request = build_search(&query);
/// assert_eq!(request.must.len(), 2);
/// assert_eq!(request.size, 20);
/// assert_eq!(request.to_body()["sort"][0]["@timestamp"]["order"], "desc");
/// ```
#[must_use]
pub fn build_search(query: &LogQuery) -> SearchRequest {
    let mut must = Vec::new();

    if let Some(range) = time_range_clause(query.start, query.end) {
        must.push(range);
    }

    if let Some(expression) = &query.expression {
        if !expression.search.is_empty() {
            must.push(json!({ "query_string": { "query": expression.search } }));
        }

        if !expression.severity_in.is_empty() {
            must.push(json!({ "terms": { "severity": expression.severity_in } }));
        }

        must.extend(expression.filters.iter().filter_map(filter_clause));
    }

    for (field, value) in [
        ("service", &query.scope.service),
        ("environment", &query.scope.environment),
        ("team", &query.scope.team),
    ] {
        if !value.is_empty() {
            must.push(term(field, json!(value)));
        }
    }

    let mut metadata: Vec<_> = query.metadata.iter().collect();
    metadata.sort_by(|a, b| a.0.cmp(b.0));
    must.extend(metadata.into_iter().map(|(key, value)| term(key, value.clone())));

    let size = usize::try_from(query.limit)
        .ok()
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_SIZE);

    tracing::debug!(clauses = must.len(), size, "Built search request");

    SearchRequest { must, size }
}

/// Translates one structured filter into a clause.
///
/// Returns `None` for operators this adapter does not know; such filters are dropped so
/// that newer hosts can send operators ahead of adapter support.
#[must_use]
pub fn filter_clause(filter: &LogFilter) -> Option<Value> {
    let field = filter.field.as_str();
    let value = filter.value.as_str();

    match &filter.operator {
        FilterOperator::Eq => Some(term(field, json!(value))),
        FilterOperator::NotEq => Some(json!({
            "bool": { "must_not": term(field, json!(value)) }
        })),
        FilterOperator::Contains => Some(json!({
            "wildcard": { field: { "value": format!("*{value}*") } }
        })),
        FilterOperator::Regex => Some(json!({
            "regexp": { field: { "value": value } }
        })),
        FilterOperator::Other(op) => {
            tracing::warn!(field, operator = %op, "Dropping filter with unsupported operator");
            None
        }
    }
}

fn term(field: &str, value: Value) -> Value {
    json!({ "term": { field: value } })
}

fn time_range_clause(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<Value> {
    if start.is_none() && end.is_none() {
        return None;
    }

    let mut bounds = serde_json::Map::new();
    if let Some(start) = start {
        bounds.insert("gte".to_string(), json!(format_bound(start)));
    }
    if let Some(end) = end {
        bounds.insert("lte".to_string(), json!(format_bound(end)));
    }

    Some(json!({ "range": { TIMESTAMP_FIELD: bounds } }))
}

fn format_bound(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_query_has_no_clauses_and_default_size() {
        let request = build_search(&LogQuery::new());

        assert!(request.must.is_empty());
        assert_eq!(request.size, DEFAULT_SIZE);

        let body = request.to_body();
        assert_eq!(body["query"]["bool"]["must"], json!([]));
        assert_eq!(body["size"], 1000);
        assert_eq!(body["sort"], json!([{"@timestamp": {"order": "desc"}}]));
    }

    #[test]
    fn test_time_range_bounds() {
        let both = build_search(&LogQuery::new().with_start(ts(10)).with_end(ts(11)));
        assert_eq!(
            both.must[0],
            json!({"range": {"@timestamp": {
                "gte": "2024-01-15T10:00:00Z",
                "lte": "2024-01-15T11:00:00Z"
            }}})
        );

        let start_only = build_search(&LogQuery::new().with_start(ts(10)));
        assert_eq!(
            start_only.must[0],
            json!({"range": {"@timestamp": {"gte": "2024-01-15T10:00:00Z"}}})
        );

        let end_only = build_search(&LogQuery::new().with_end(ts(11)));
        assert_eq!(
            end_only.must[0],
            json!({"range": {"@timestamp": {"lte": "2024-01-15T11:00:00Z"}}})
        );
    }

    #[test]
    fn test_inverted_range_is_passed_through() {
        let request = build_search(&LogQuery::new().with_start(ts(11)).with_end(ts(10)));
        assert_eq!(request.must.len(), 1);
    }

    #[test]
    fn test_search_is_passed_unescaped() {
        let request = build_search(&LogQuery::new().with_search("status:[500 TO 599] AND \"db"));
        assert_eq!(
            request.must[0],
            json!({"query_string": {"query": "status:[500 TO 599] AND \"db"}})
        );
    }

    #[test]
    fn test_severity_terms() {
        let request = build_search(
            &LogQuery::new()
                .with_severity("error")
                .with_severity("critical"),
        );
        assert_eq!(
            request.must[0],
            json!({"terms": {"severity": ["error", "critical"]}})
        );
    }

    #[test]
    fn test_filter_equals() {
        let clause = filter_clause(&LogFilter::new("status", "=", "200"));
        assert_eq!(clause, Some(json!({"term": {"status": "200"}})));
    }

    #[test]
    fn test_filter_not_equals() {
        let clause = filter_clause(&LogFilter::new("status", "!=", "200"));
        assert_eq!(
            clause,
            Some(json!({"bool": {"must_not": {"term": {"status": "200"}}}}))
        );
    }

    #[test]
    fn test_filter_contains_is_not_escaped() {
        let clause = filter_clause(&LogFilter::new("message", "contains", "err?r*"));
        assert_eq!(
            clause,
            Some(json!({"wildcard": {"message": {"value": "*err?r**"}}}))
        );
    }

    #[test]
    fn test_filter_regex() {
        let clause = filter_clause(&LogFilter::new("url", "regex", "/api/.*"));
        assert_eq!(
            clause,
            Some(json!({"regexp": {"url": {"value": "/api/.*"}}}))
        );
    }

    #[test]
    fn test_unknown_operator_emits_no_clause() {
        assert!(filter_clause(&LogFilter::new("latency", ">", "500")).is_none());
        assert!(filter_clause(&LogFilter::new("status", "", "200")).is_none());
    }

    #[test]
    fn test_unknown_operator_changes_clause_count_by_nothing() {
        let base = LogQuery::new()
            .with_search("error")
            .with_filter(LogFilter::new("status", "=", "500"))
            .with_filter(LogFilter::new("host", "contains", "web"));
        let with_invalid = base
            .clone()
            .with_filter(LogFilter::new("latency", "between", "1..5"));

        let expected = build_search(&base);
        let actual = build_search(&with_invalid);

        assert_eq!(actual.must.len(), expected.must.len());
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_scope_clauses_skip_empty_values() {
        let request = build_search(&LogQuery::new().with_service("api").with_team("core"));

        assert_eq!(
            request.must,
            vec![
                json!({"term": {"service": "api"}}),
                json!({"term": {"team": "core"}}),
            ]
        );
    }

    #[test]
    fn test_metadata_terms_are_sorted_and_keep_value_types() {
        let request = build_search(
            &LogQuery::new()
                .with_metadata("zone", "b")
                .with_metadata("attempt", 3)
                .with_metadata("canary", true),
        );

        assert_eq!(
            request.must,
            vec![
                json!({"term": {"attempt": 3}}),
                json!({"term": {"canary": true}}),
                json!({"term": {"zone": "b"}}),
            ]
        );
    }

    #[test]
    fn test_clause_order_is_deterministic() {
        let query = LogQuery::new()
            .with_metadata("region", "eu")
            .with_service("api")
            .with_filter(LogFilter::new("status", "=", "500"))
            .with_severity("error")
            .with_search("timeout")
            .with_start(ts(9));

        let request = build_search(&query);
        let kinds: Vec<&str> = request
            .must
            .iter()
            .map(|clause| clause.as_object().unwrap().keys().next().unwrap().as_str())
            .collect();

        assert_eq!(
            kinds,
            vec!["range", "query_string", "terms", "term", "term", "term"]
        );
        assert_eq!(request.must[3], json!({"term": {"status": "500"}}));
        assert_eq!(request.must[4], json!({"term": {"service": "api"}}));
        assert_eq!(request.must[5], json!({"term": {"region": "eu"}}));
        assert_eq!(build_search(&query), request);
    }

    #[test]
    fn test_limit_sets_size() {
        assert_eq!(build_search(&LogQuery::new().with_limit(3)).size, 3);
        assert_eq!(build_search(&LogQuery::new().with_limit(0)).size, DEFAULT_SIZE);
        assert_eq!(build_search(&LogQuery::new().with_limit(-1)).size, DEFAULT_SIZE);
    }
}
