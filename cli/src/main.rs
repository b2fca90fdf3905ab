//! Elastic Logs CLI
//!
//! Command-line interface for running log queries against Elasticsearch through the
//! same provider the plugin uses.
//!
//! # Usage
//!
//! ```bash
//! elastic-logs --help
//! elastic-logs -a http://localhost:9200 query --search "error OR warning" --limit 20
//! elastic-logs --kibana-url http://localhost:5601 link --service api --eq host=web-1
//! ```

#![deny(unsafe_code)]

use adapter::chrono::{DateTime, Utc};
use adapter::config::{ConfigMap, ElasticConfig};
use adapter::models::{LogFilter, LogQuery};
use adapter::{LogProvider, ProviderRegistry, QueryContext};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Elastic Logs CLI - Query Elasticsearch logs from the command line
#[derive(Parser)]
#[command(name = "elastic-logs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Elasticsearch node URL (repeatable)
    #[arg(
        short,
        long = "address",
        env = "ELASTIC_ADDRESSES",
        value_delimiter = ','
    )]
    addresses: Vec<String>,

    /// Elastic Cloud ID (overrides --address)
    #[arg(long, env = "ELASTIC_CLOUD_ID")]
    cloud_id: Option<String>,

    /// Basic-auth user name
    #[arg(short, long, env = "ELASTIC_USERNAME")]
    username: Option<String>,

    /// Basic-auth password
    #[arg(long, env = "ELASTIC_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// API key (overrides username/password)
    #[arg(long, env = "ELASTIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Index pattern to search
    #[arg(short, long, env = "ELASTIC_INDEX_PATTERN", default_value = "logs-*")]
    index_pattern: String,

    /// Kibana base URL, used by `link`
    #[arg(long, env = "KIBANA_URL")]
    kibana_url: Option<String>,

    /// Query timeout in seconds (0 disables it)
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and print one JSON entry per line
    Query(QueryArgs),
    /// Print a Kibana Discover link for a query
    Link(QueryArgs),
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Free-text search in query-string syntax
    #[arg(short, long)]
    search: Option<String>,

    /// Severity to match (repeatable)
    #[arg(long = "severity")]
    severities: Vec<String>,

    /// Field equals value (`field=value`, repeatable)
    #[arg(long, value_parser = parse_field_value)]
    eq: Vec<(String, String)>,

    /// Field does not equal value (`field=value`, repeatable)
    #[arg(long, value_parser = parse_field_value)]
    ne: Vec<(String, String)>,

    /// Field contains value (`field=value`, repeatable)
    #[arg(long, value_parser = parse_field_value)]
    contains: Vec<(String, String)>,

    /// Field matches regular expression (`field=pattern`, repeatable)
    #[arg(long, value_parser = parse_field_value)]
    regex: Vec<(String, String)>,

    /// Service scope
    #[arg(long)]
    service: Option<String>,

    /// Environment scope
    #[arg(long)]
    environment: Option<String>,

    /// Team scope
    #[arg(long)]
    team: Option<String>,

    /// Start of the time range (RFC 3339)
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// End of the time range (RFC 3339)
    #[arg(long)]
    end: Option<DateTime<Utc>>,

    /// Maximum number of entries (0 uses the default)
    #[arg(short, long, default_value_t = 0)]
    limit: i64,
}

fn parse_field_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.is_empty() => Ok((field.to_string(), value.to_string())),
        _ => Err(format!("expected field=value, got '{raw}'")),
    }
}

impl QueryArgs {
    fn to_query(&self) -> LogQuery {
        let mut query = LogQuery::new().with_limit(self.limit);

        if let Some(start) = self.start {
            query = query.with_start(start);
        }
        if let Some(end) = self.end {
            query = query.with_end(end);
        }
        if let Some(search) = &self.search {
            query = query.with_search(search);
        }
        for severity in &self.severities {
            query = query.with_severity(severity);
        }

        let filters = [
            ("=", &self.eq),
            ("!=", &self.ne),
            ("contains", &self.contains),
            ("regex", &self.regex),
        ];
        for (operator, pairs) in filters {
            for (field, value) in pairs {
                query = query.with_filter(LogFilter::new(field, operator, value));
            }
        }

        if let Some(service) = &self.service {
            query = query.with_service(service);
        }
        if let Some(environment) = &self.environment {
            query = query.with_environment(environment);
        }
        if let Some(team) = &self.team {
            query = query.with_team(team);
        }

        query
    }
}

impl Cli {
    /// Builds the untyped config map the provider constructor expects.
    fn config_map(&self) -> ConfigMap {
        let mut map = ConfigMap::new();
        map.insert("addresses".to_string(), json!(self.addresses));
        map.insert("indexPattern".to_string(), json!(self.index_pattern));

        let optional = [
            ("cloudID", &self.cloud_id),
            ("username", &self.username),
            ("password", &self.password),
            ("apiKey", &self.api_key),
            ("kibanaURL", &self.kibana_url),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                map.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        map
    }

    fn query_context(&self) -> QueryContext {
        match self.timeout {
            0 => QueryContext::new(),
            secs => QueryContext::new().with_timeout(Duration::from_secs(secs)),
        }
    }
}

async fn run_query(cli: &Cli, args: &QueryArgs) -> Result<()> {
    let mut registry = ProviderRegistry::new();
    adapter::register(&mut registry)?;

    let provider = registry
        .build(adapter::PROVIDER_NAME, cli.config_map())
        .await
        .context("failed to create provider")?;

    let entries = provider.query(&cli.query_context(), &args.to_query()).await?;
    tracing::info!(entries = entries.len(), "Query finished");

    for entry in &entries {
        println!("{}", serde_json::to_string(entry)?);
    }
    Ok(())
}

fn print_link(cli: &Cli, args: &QueryArgs) -> Result<()> {
    let config = ElasticConfig::parse(&cli.config_map());
    let Some(kibana_url) = config.kibana_url.as_deref() else {
        bail!("--kibana-url (or KIBANA_URL) is required to build a link");
    };

    match adapter::query::discover_url(kibana_url, &config.index_pattern, &args.to_query()) {
        Some(url) => println!("{url}"),
        None => bail!("--kibana-url must not be empty"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Query(args)) => run_query(&cli, args).await?,
        Some(Commands::Link(args)) => print_link(&cli, args)?,
        None => {
            println!("Elastic Logs CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapter::models::FilterOperator;

    #[test]
    fn test_cli_parse() {
        // Verify CLI can parse without arguments
        let cli = Cli::try_parse_from(["elastic-logs"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_query_command() {
        let cli = Cli::try_parse_from([
            "elastic-logs",
            "-a",
            "http://es-1:9200",
            "--address",
            "http://es-2:9200",
            "query",
            "--search",
            "error OR warning",
            "--severity",
            "error",
            "--eq",
            "host=web-1",
            "--regex",
            "path=/api/.*",
            "--service",
            "checkout",
            "--limit",
            "20",
        ])
        .unwrap();

        assert_eq!(cli.addresses, vec!["http://es-1:9200", "http://es-2:9200"]);
        let Some(Commands::Query(args)) = &cli.command else {
            panic!("expected query command");
        };

        let query = args.to_query();
        let expression = query.expression.unwrap();
        assert_eq!(expression.search, "error OR warning");
        assert_eq!(expression.severity_in, vec!["error"]);
        assert_eq!(expression.filters.len(), 2);
        assert_eq!(expression.filters[0].operator, FilterOperator::Eq);
        assert_eq!(expression.filters[1].operator, FilterOperator::Regex);
        assert_eq!(expression.filters[1].value, "/api/.*");
        assert_eq!(query.scope.service, "checkout");
        assert_eq!(query.limit, 20);
    }

    #[test]
    fn test_cli_rejects_malformed_filter() {
        let cli = Cli::try_parse_from(["elastic-logs", "query", "--eq", "no-equals-sign"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_parses_time_range() {
        let cli = Cli::try_parse_from([
            "elastic-logs",
            "link",
            "--start",
            "2024-01-15T10:00:00Z",
        ])
        .unwrap();

        let Some(Commands::Link(args)) = &cli.command else {
            panic!("expected link command");
        };
        assert!(args.to_query().start.is_some());
        assert!(args.to_query().end.is_none());
    }

    #[test]
    fn test_config_map() {
        let cli = Cli::try_parse_from([
            "elastic-logs",
            "--cloud-id",
            "prod:abc",
            "--api-key",
            "id:key",
            "-i",
            "app-*",
        ])
        .unwrap();

        let config = ElasticConfig::parse(&cli.config_map());
        assert_eq!(config.cloud_id.as_deref(), Some("prod:abc"));
        assert_eq!(config.api_key.as_deref(), Some("id:key"));
        assert_eq!(config.index_pattern, "app-*");
        assert!(config.password.is_none());
    }

    #[test]
    fn test_query_context_timeout() {
        let cli = Cli::try_parse_from(["elastic-logs", "--timeout", "0"]).unwrap();
        assert!(cli.query_context().timeout.is_none());

        let cli = Cli::try_parse_from(["elastic-logs"]).unwrap();
        assert_eq!(cli.query_context().timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_parse_field_value() {
        assert_eq!(
            parse_field_value("a=b=c"),
            Ok(("a".to_string(), "b=c".to_string()))
        );
        assert!(parse_field_value("=x").is_err());
    }
}
