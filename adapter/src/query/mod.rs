//! Query translation for Elasticsearch.
//!
//! Converts canonical [`LogQuery`](crate::models::LogQuery) values into the backend's
//! query DSL, and into Kibana Discover links for humans.
//!
//! # Example
//!
//! ```
//! use adapter::models::LogQuery;
//! use adapter::query::build_search;
//!
//! let body = build_search(&LogQuery::new().with_severity("error").with_limit(10)).to_body();
//! assert_eq!(body["query"]["bool"]["must"][0]["terms"]["severity"][0], "error");
//! assert_eq!(body["size"], 10);
//! ```

mod builder;
mod discover;

pub use builder::{build_search, filter_clause, SearchRequest, DEFAULT_SIZE, TIMESTAMP_FIELD};
pub use discover::{discover_url, kql};
