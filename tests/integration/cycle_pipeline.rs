//! End-to-end tests of full cycles
//!
//! These tests verify that:
//! - Every target ends up in the submitted payload exactly once
//! - Records of one batch share a single timestamp
//! - Running once returns without waiting for a timer
//! - Running on an interval produces independent batches

use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_two_targets_ok_and_error() {
    let targets = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&targets)
        .await;
    Mock::given(method("GET"))
        .and(path("/b/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&targets)
        .await;

    let backend = start_backend().await;
    let config = create_test_config(&format!("{}/write", backend.uri()));

    let a = format!("{}/a/", targets.uri());
    let b = format!("{}/b/", targets.uri());
    let mut driver = create_driver(
        &config,
        vec![
            tagged_entry(&a, &[("env", "prod")]),
            tagged_entry(&b, &[("env", "prod")]),
        ],
    );

    let report = driver.run_cycle().await;

    assert_eq!(report.ok, 1);
    assert_eq!(report.error, 1);
    assert!(report.submitted);

    let payloads = posted_payloads(&backend).await;
    assert_eq!(payloads.len(), 1);

    let t = report.timestamp;
    assert_eq!(
        sorted_lines(&payloads[0]),
        vec![
            format!("pokes,endpoint={a},env=prod value=0 {t}"),
            format!("pokes,endpoint={b},env=prod value=1 {t}"),
        ]
    );
    assert!(!payloads[0].ends_with('\n'));
}

#[tokio::test]
async fn test_legacy_entries_become_tags() {
    let targets = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&targets)
        .await;

    let backend = start_backend().await;
    let mut config = create_test_config(&backend.uri());
    config.measurement = "checker".to_string();

    let entries = poker::config::parse_target_entries(&format!(
        r#"[{{"name": "shop", "endpoint": "{}/", "environment": "production", "application": "myapp"}}]"#,
        targets.uri()
    ))
    .unwrap();

    let mut driver = create_driver(&config, entries);
    let report = driver.run_cycle().await;

    let payloads = posted_payloads(&backend).await;
    assert_eq!(
        payloads[0],
        format!(
            "checker,endpoint={}/,application=myapp,environment=production value=0 {}",
            targets.uri(),
            report.timestamp
        )
    );
}

#[tokio::test]
async fn test_run_once_returns_after_single_cycle() {
    let targets = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&targets)
        .await;

    let backend = start_backend().await;
    let config = create_test_config(&backend.uri());
    let driver = create_driver(&config, vec![tagged_entry(&targets.uri(), &[])]);

    let cycles = tokio::time::timeout(Duration::from_secs(5), driver.run())
        .await
        .expect("run once must not block on a timer");

    assert_eq!(cycles, 1);
    assert_eq!(posted_payloads(&backend).await.len(), 1);
}

#[tokio::test]
async fn test_interval_runs_repeated_cycles() {
    let targets = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&targets)
        .await;

    let backend = start_backend().await;
    let mut config = create_test_config(&backend.uri());
    config.interval = Some(Duration::from_secs(1));
    config.encoder.emit_counter = true;

    let driver = create_driver(&config, vec![tagged_entry(&targets.uri(), &[])]);

    // Two intervals plus slack
    let started = Instant::now();
    let result = tokio::time::timeout(Duration::from_millis(2500), driver.run()).await;
    assert!(result.is_err(), "interval driver must keep running");
    assert!(started.elapsed() < Duration::from_secs(3));

    let payloads = posted_payloads(&backend).await;
    assert!(
        payloads.len() >= 2,
        "expected at least two cycles, got {}",
        payloads.len()
    );

    for (index, payload) in payloads.iter().enumerate() {
        assert_eq!(payload.lines().count(), 1);
        assert!(
            payload.contains(&format!(",counter={}i ", index + 1)),
            "payload {index} was {payload}"
        );
    }
}

#[tokio::test]
async fn test_records_share_one_timestamp() {
    let targets = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1200)))
        .mount(&targets)
        .await;
    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&targets)
        .await;

    let backend = start_backend().await;
    let config = create_test_config(&backend.uri());
    let mut driver = create_driver(
        &config,
        vec![
            tagged_entry(&format!("{}/slow", targets.uri()), &[]),
            tagged_entry(&format!("{}/fast", targets.uri()), &[]),
        ],
    );

    let report = driver.run_cycle().await;

    let payloads = posted_payloads(&backend).await;
    let timestamps: Vec<&str> = payloads[0]
        .lines()
        .map(|line| line.rsplit(' ').next().unwrap())
        .collect();
    let expected = report.timestamp.to_string();
    assert_eq!(timestamps, vec![expected.as_str(), expected.as_str()]);
}
