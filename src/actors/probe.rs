//! ProbeExecutor - performs one HTTP GET per target and classifies it
//!
//! ## Message Flow
//!
//! ```text
//! dispatch rx → worker → GET target.url → classify → ProbeOutcome → collection tx
//! ```
//!
//! Failures never leave this module as errors: a refused connection, a
//! timeout or a non-200 answer all become a [`ProbeOutcome`] carrying the
//! matching [`ProbeStatus`].

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, instrument, trace, warn};

use crate::config::ProbeConfig;
use crate::registry::Target;

use super::messages::{ProbeOutcome, ProbeStatus};

/// Upper bound of response body bytes kept in an error detail
const MAX_BODY_DETAIL: usize = 512;

/// Executes probes with a shared HTTP client
#[derive(Debug, Clone)]
pub struct ProbeExecutor {
    /// HTTP client (reused across probes and cycles)
    client: reqwest::Client,

    config: ProbeConfig,
}

impl ProbeExecutor {
    pub fn new(config: ProbeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .context("failed to build probe HTTP client")?;

        Ok(Self { client, config })
    }

    /// Probe a single target exactly once
    #[instrument(skip_all, fields(target = %target.display_name()))]
    pub async fn probe(&self, target: Arc<Target>) -> ProbeOutcome {
        trace!("probing {}", target.url);

        let start = Instant::now();

        let mut response = match self.client.get(&target.url).send().await {
            Ok(response) => response,
            Err(e) => {
                let detail = self.describe_transport_error(&e);
                debug!("probe failed without response: {detail}");
                return ProbeOutcome {
                    target,
                    status: self.config.transport_failure.as_status(),
                    latency_ms: None,
                    http_status: None,
                    error_detail: Some(detail),
                };
            }
        };

        let status_code = response.status().as_u16();

        if status_code == 200 {
            let latency_ms = start.elapsed().as_millis() as u64;
            trace!("got 200 after {latency_ms}ms");
            return ProbeOutcome {
                target,
                status: ProbeStatus::Ok,
                latency_ms: Some(latency_ms),
                http_status: Some(status_code),
                error_detail: None,
            };
        }

        // Body is diagnostic only; a failed read does not change the status
        let body = read_body_prefix(&mut response, MAX_BODY_DETAIL).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        debug!("got unsuccessful status code {status_code}");

        ProbeOutcome {
            target,
            status: ProbeStatus::Error,
            latency_ms: Some(latency_ms),
            http_status: Some(status_code),
            error_detail: Some(describe_http_failure(status_code, &body)),
        }
    }

    fn describe_transport_error(&self, e: &reqwest::Error) -> String {
        if e.is_timeout() {
            format!("request timed out after {}ms", self.config.timeout.as_millis())
        } else if e.is_connect() {
            format!("connection failed: {}", error_chain(e))
        } else {
            format!("request failed: {}", error_chain(e))
        }
    }

    /// Run a probe worker until the dispatch channel is drained
    ///
    /// Several workers may share one dispatch receiver. The lock is only held
    /// while waiting for the next target, never during the request.
    pub async fn run_worker(
        self,
        dispatch_rx: Arc<Mutex<mpsc::Receiver<Arc<Target>>>>,
        outcome_tx: mpsc::Sender<ProbeOutcome>,
    ) {
        loop {
            let next = dispatch_rx.lock().await.recv().await;
            let Some(target) = next else {
                break;
            };

            let outcome = self.probe(target).await;

            if outcome_tx.send(outcome).await.is_err() {
                warn!("outcome channel closed, stopping probe worker");
                break;
            }
        }
    }
}

/// Read at most `limit` bytes of the response body
///
/// Stops at the first failed chunk and keeps whatever arrived before it.
async fn read_body_prefix(response: &mut reqwest::Response, limit: usize) -> String {
    let mut body = Vec::new();
    while body.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(limit - body.len());
                body.extend_from_slice(&chunk[..take]);
            }
            Ok(None) | Err(_) => break,
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

fn describe_http_failure(status_code: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("unexpected status code {status_code}")
    } else {
        format!(
            "unexpected status code {status_code}: {}",
            truncate(body, MAX_BODY_DETAIL)
        )
    }
}

/// Render an error with all of its sources, `reqwest` hides the cause otherwise
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
