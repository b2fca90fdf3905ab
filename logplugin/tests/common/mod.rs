//! Common test utilities and helpers for integration tests.
//!
//! Provides a registry whose provider runs against an in-memory backend, and helpers
//! to drive a [`Transport`] with in-memory streams.

use adapter::backend::InMemoryBackend;
use adapter::config::{ConfigMap, ElasticConfig};
use adapter::{ElasticProvider, LogProvider, ProviderError, ProviderRegistry};
use logplugin::{RpcResponse, Transport, TransportError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Name the fixture provider is registered under.
pub const FIXTURE_PROVIDER: &str = "fixture";

/// Two documents one minute apart: an error, and a slow response logged at `warn`
/// whose text matches neither "error" nor "warning".
pub fn fixture_backend() -> InMemoryBackend {
    InMemoryBackend::new()
        .with_document(
            "logs-app",
            "1",
            json!({
                "@timestamp": "2024-01-15T10:00:00Z",
                "message": "database error",
                "severity": "error",
                "service": "api",
                "host": "web-1"
            }),
        )
        .with_document(
            "logs-app",
            "2",
            json!({
                "@timestamp": "2024-01-15T10:01:00Z",
                "message": "slow response",
                "level": "warn",
                "service": "api",
                "latency_ms": 950
            }),
        )
}

/// Creates a registry with the fixture provider and a counter of construction attempts.
pub fn fixture_registry() -> (ProviderRegistry, Arc<AtomicUsize>) {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    let mut registry = ProviderRegistry::new();
    registry
        .register(FIXTURE_PROVIDER, move |raw: ConfigMap| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let config = ElasticConfig::from_map(&raw)?;
                let provider =
                    ElasticProvider::with_backend(config, Arc::new(fixture_backend())).await?;
                Ok::<Arc<dyn LogProvider>, ProviderError>(Arc::new(provider))
            }
        })
        .unwrap();

    (registry, attempts)
}

/// Creates a transport over the fixture registry.
pub fn fixture_transport() -> (Transport, Arc<AtomicUsize>) {
    let (registry, attempts) = fixture_registry();
    let transport = Transport::new(registry, FIXTURE_PROVIDER, Some(Duration::from_secs(5)));
    (transport, attempts)
}

/// A config map the fixture provider accepts.
pub fn valid_config() -> Value {
    json!({"addresses": ["http://localhost:9200"], "indexPattern": "logs-*"})
}

/// Serializes requests as input lines.
pub fn lines(requests: &[Value]) -> Vec<u8> {
    let mut input = Vec::new();
    for request in requests {
        input.extend(serde_json::to_vec(request).unwrap());
        input.push(b'\n');
    }
    input
}

/// Feeds `input` to the transport and returns the loop result and parsed responses.
pub async fn run(transport: &Transport, input: &[u8]) -> (Result<(), TransportError>, Vec<RpcResponse>) {
    let mut output = Vec::new();
    let result = transport.serve(input, &mut output).await;
    (result, parse_responses(&output))
}

/// Parses one response per output line.
pub fn parse_responses(output: &[u8]) -> Vec<RpcResponse> {
    String::from_utf8(output.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
