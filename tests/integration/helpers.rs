//! Helper functions for integration tests

use std::collections::BTreeMap;
use std::time::Duration;

use poker::config::{EncoderOptions, PokerConfig, ProbeConfig, TargetEntry};
use poker::{CycleDriver, Registry};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn tagged_entry(endpoint: &str, tags: &[(&str, &str)]) -> TargetEntry {
    TargetEntry::Tagged {
        endpoint: endpoint.to_string(),
        name: None,
        tags: tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

pub fn create_test_config(backend_url: &str) -> PokerConfig {
    PokerConfig {
        influxdb_endpoint: backend_url.to_string(),
        interval: None,
        measurement: "pokes".to_string(),
        probe: ProbeConfig {
            timeout: Duration::from_secs(2),
            ..ProbeConfig::default()
        },
        encoder: EncoderOptions::default(),
        max_concurrency: None,
        debug: true,
    }
}

/// Start a mock backend that accepts every write with 204
pub async fn start_backend() -> MockServer {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&backend)
        .await;
    backend
}

pub fn create_driver(config: &PokerConfig, entries: Vec<TargetEntry>) -> CycleDriver {
    CycleDriver::from_config(config, Registry::new(entries)).unwrap()
}

/// Bodies of every payload posted to the backend, in arrival order
pub async fn posted_payloads(backend: &MockServer) -> Vec<String> {
    backend
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|request| String::from_utf8(request.body).unwrap())
        .collect()
}

/// Sort lines so payloads can be compared independent of line order
pub fn sorted_lines(payload: &str) -> Vec<String> {
    let mut lines: Vec<String> = payload.lines().map(str::to_string).collect();
    lines.sort();
    lines
}
