//! Concurrency tests
//!
//! These tests verify that:
//! - Probes of one cycle run in parallel
//! - A bounded worker pool still probes every target exactly once
//! - Batches contain each target exactly once regardless of completion order

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

async fn start_slow_targets(delay: Duration) -> (MockServer, Arc<AtomicUsize>) {
    let targets = MockServer::start().await;

    let request_count = Arc::new(AtomicUsize::new(0));
    let request_count_clone = request_count.clone();

    Mock::given(method("GET"))
        .respond_with(move |_req: &wiremock::Request| {
            request_count_clone.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(200).set_delay(delay)
        })
        .mount(&targets)
        .await;

    (targets, request_count)
}

#[tokio::test]
async fn test_probes_run_in_parallel() {
    let (targets, request_count) = start_slow_targets(Duration::from_millis(800)).await;
    let backend = start_backend().await;
    let config = create_test_config(&backend.uri());

    let entries = (0..8)
        .map(|i| tagged_entry(&format!("{}/{i}", targets.uri()), &[]))
        .collect();
    let mut driver = create_driver(&config, entries);

    let started = Instant::now();
    let report = driver.run_cycle().await;
    let elapsed = started.elapsed();

    assert_eq!(report.ok, 8);
    assert_eq!(request_count.load(Ordering::SeqCst), 8);
    assert!(
        elapsed < Duration::from_millis(8 * 800 / 2),
        "probes appear to run sequentially: {elapsed:?}"
    );
}

#[tokio::test]
async fn test_bounded_pool_probes_each_target_once() {
    let (targets, request_count) = start_slow_targets(Duration::from_millis(200)).await;
    let backend = start_backend().await;
    let mut config = create_test_config(&backend.uri());
    config.max_concurrency = Some(1);

    let entries = (0..3)
        .map(|i| tagged_entry(&format!("{}/{i}", targets.uri()), &[]))
        .collect();
    let mut driver = create_driver(&config, entries);

    let started = Instant::now();
    let report = driver.run_cycle().await;

    assert_eq!(report.ok, 3);
    assert_eq!(request_count.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_millis(3 * 200));
}

#[tokio::test]
async fn test_batch_has_every_target_once() {
    let targets = MockServer::start().await;
    // Later targets answer faster, so completion order is reversed
    for i in 0..10u64 {
        Mock::given(method("GET"))
            .and(wiremock::matchers::path(format!("/{i}")))
            .respond_with(
                ResponseTemplate::new(if i % 3 == 0 { 500 } else { 200 })
                    .set_delay(Duration::from_millis((10 - i) * 30)),
            )
            .mount(&targets)
            .await;
    }

    let backend = start_backend().await;
    let config = create_test_config(&backend.uri());
    let entries = (0..10)
        .map(|i| tagged_entry(&format!("{}/{i}", targets.uri()), &[("n", i.to_string().as_str())]))
        .collect();
    let mut driver = create_driver(&config, entries);

    let report = driver.run_cycle().await;
    assert_eq!(report.total(), 10);
    assert_eq!(report.error, 4);

    let payload = &posted_payloads(&backend).await[0];
    let lines: Vec<&str> = payload.lines().collect();
    assert_eq!(lines.len(), 10);

    let unique: HashSet<&str> = lines
        .iter()
        .map(|line| line.split(' ').next().unwrap())
        .collect();
    assert_eq!(unique.len(), 10);

    // Sealed batches are ordered by load order, not completion order
    for (i, line) in lines.iter().enumerate() {
        assert!(line.contains(&format!(",n={i} ")), "line {i} was {line}");
    }
}
