//! Kibana Discover deep links.
//!
//! Renders a canonical query as a Discover URL so a human can open the same search in
//! Kibana. The query is expressed in KQL; the URL state uses Rison encoding and is
//! left readable in the fragment, with only `%`, `&`, `#`, and control characters
//! percent-encoded.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{FilterOperator, LogQuery};

/// Builds a Kibana Discover URL for `query`.
///
/// Returns `None` when `kibana_url` is empty. Regex filters and metadata constraints
/// have no KQL equivalent and are left out of the link.
///
/// # Example
///
/// ```
/// use adapter::models::LogQuery;
/// use adapter::query::discover_url;
///
/// let query = LogQuery::new().with_search("error").with_environment("production");
/// let url = discover_url("http://kibana:5601", "logs-*", &query).unwrap();
///
/// assert!(url.starts_with("http://kibana:5601/app/kibana#/discover?"));
/// assert!(discover_url("", "logs-*", &query).is_none());
/// ```
#[must_use]
pub fn discover_url(kibana_url: &str, index_pattern: &str, query: &LogQuery) -> Option<String> {
    let base = kibana_url.trim_end_matches('/');
    if base.is_empty() {
        return None;
    }

    let time = format!(
        "(time:(from:{},to:{}))",
        rison_string(&time_bound(query.start, "now-15m")),
        rison_string(&time_bound(query.end, "now")),
    );
    let app = format!(
        "(index:{},query:(language:kuery,query:{}))",
        rison_string(index_pattern),
        rison_string(&kql(query)),
    );

    Some(format!(
        "{base}/app/kibana#/discover?_g={}&_a={}",
        fragment_escape(&time),
        fragment_escape(&app),
    ))
}

/// Renders the KQL expression for a query, joining terms with `and`.
#[must_use]
pub fn kql(query: &LogQuery) -> String {
    let mut terms = Vec::new();

    if let Some(expression) = &query.expression {
        if !expression.search.is_empty() {
            terms.push(format!("({})", expression.search));
        }

        if !expression.severity_in.is_empty() {
            let severities: Vec<String> = expression
                .severity_in
                .iter()
                .map(|s| kql_quote(s))
                .collect();
            terms.push(format!("severity:({})", severities.join(" or ")));
        }

        for filter in &expression.filters {
            let field = &filter.field;
            match filter.operator {
                FilterOperator::Eq => terms.push(format!("{field}:{}", kql_quote(&filter.value))),
                FilterOperator::NotEq => {
                    terms.push(format!("not {field}:{}", kql_quote(&filter.value)));
                }
                FilterOperator::Contains => terms.push(format!("{field}:*{}*", filter.value)),
                FilterOperator::Regex | FilterOperator::Other(_) => {}
            }
        }
    }

    for (field, value) in [
        ("service", &query.scope.service),
        ("environment", &query.scope.environment),
        ("team", &query.scope.team),
    ] {
        if !value.is_empty() {
            terms.push(format!("{field}:{}", kql_quote(value)));
        }
    }

    terms.join(" and ")
}

fn time_bound(ts: Option<DateTime<Utc>>, fallback: &str) -> String {
    ts.map_or_else(
        || fallback.to_string(),
        |ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

fn kql_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Percent-encodes the characters a `_g`/`_a` fragment parameter cannot carry verbatim.
fn fragment_escape(state: &str) -> String {
    let mut out = String::with_capacity(state.len());
    for ch in state.chars() {
        if matches!(ch, '%' | '&' | '#') || ch.is_control() {
            out.push_str(&urlencoding::encode(ch.encode_utf8(&mut [0; 4])));
        } else {
            out.push(ch);
        }
    }
    out
}

/// Quotes a string for Rison (`'` and `!` are escaped with `!`).
fn rison_string(value: &str) -> String {
    format!("'{}'", value.replace('!', "!!").replace('\'', "!'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogFilter;
    use chrono::TimeZone;

    #[test]
    fn test_discover_url_table() {
        let cases: Vec<(&str, &str, &str, LogQuery, Vec<&str>)> = vec![
            (
                "basic URL without filters",
                "http://kibana:5601",
                "logs-*",
                LogQuery::new(),
                vec!["http://kibana:5601/app/kibana#/discover", "logs-*"],
            ),
            (
                "search expression",
                "http://kibana:5601",
                "logs-app",
                LogQuery::new().with_search("error connection"),
                vec!["error connection", "logs-app"],
            ),
            (
                "structured filter",
                "http://kibana:5601",
                "logs-*",
                LogQuery::new().with_filter(LogFilter::new("service", "=", "api-gateway")),
                vec!["api-gateway", "logs-*"],
            ),
            (
                "scope filter",
                "http://kibana:5601",
                "logs-*",
                LogQuery::new().with_service("api").with_environment("production"),
                vec!["api", "production", "logs-*"],
            ),
            (
                "multiple filters",
                "http://kibana:5601",
                "logs-prod",
                LogQuery::new()
                    .with_search("error")
                    .with_filter(LogFilter::new("status", "=", "500"))
                    .with_environment("production"),
                vec!["error", "500", "production", "logs-prod"],
            ),
        ];

        for (name, base, index, query, expected) in cases {
            let url = discover_url(base, index, &query)
                .unwrap_or_else(|| panic!("{name}: expected a URL"));
            for needle in expected {
                assert!(url.contains(needle), "{name}: {url} should contain {needle}");
            }
        }
    }

    #[test]
    fn test_empty_base_url_yields_none() {
        assert!(discover_url("", "logs-*", &LogQuery::new()).is_none());
        assert!(discover_url("/", "logs-*", &LogQuery::new()).is_none());
    }

    #[test]
    fn test_basic_url_state() {
        let url = discover_url("http://kibana:5601/", "logs-*", &LogQuery::new()).unwrap();

        assert!(url.starts_with("http://kibana:5601/app/kibana#/discover?_g=(time:"));
        assert!(url.contains("index:'logs-*'"));
        assert!(url.contains("from:'now-15m',to:'now'"));
        assert!(url.contains("query:(language:kuery,query:'')"));
    }

    #[test]
    fn test_url_with_time_range() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let query = LogQuery::new().with_start(start);
        let url = discover_url("http://kibana:5601", "logs-*", &query).unwrap();

        assert!(url.contains("from:'2024-01-15T10:00:00.000Z',to:'now'"));
    }

    #[test]
    fn test_fragment_delimiters_are_escaped() {
        let query = LogQuery::new().with_search("a & b #c 50%");
        let url = discover_url("http://kibana:5601", "logs-*", &query).unwrap();

        assert!(url.contains("(a %26 b %23c 50%25)"));
        assert_eq!(url.matches('&').count(), 1);
        assert_eq!(url.matches('#').count(), 1);

        let app = url.split_once("&_a=").unwrap().1;
        let app = urlencoding::decode(app).unwrap();
        assert!(app.contains("(a & b #c 50%)"));
    }

    #[test]
    fn test_kql_with_multiple_filters() {
        let query = LogQuery::new()
            .with_search("error")
            .with_severity("error")
            .with_severity("critical")
            .with_filter(LogFilter::new("status", "=", "500"))
            .with_filter(LogFilter::new("host", "!=", "web-1"))
            .with_filter(LogFilter::new("path", "contains", "checkout"))
            .with_filter(LogFilter::new("url", "regex", "/api/.*"))
            .with_environment("production");

        assert_eq!(
            kql(&query),
            "(error) and severity:(\"error\" or \"critical\") and status:\"500\" \
             and not host:\"web-1\" and path:*checkout* and environment:\"production\""
        );
    }

    #[test]
    fn test_kql_scope_filters() {
        let query = LogQuery::new().with_service("api").with_environment("production");
        assert_eq!(kql(&query), "service:\"api\" and environment:\"production\"");
    }

    #[test]
    fn test_rison_escaping() {
        assert_eq!(rison_string("it's!"), "'it!'s!!'");
    }

    #[test]
    fn test_kql_quote_escapes() {
        assert_eq!(kql_quote(r#"say "hi"\"#), r#""say \"hi\"\\""#);
    }
}
