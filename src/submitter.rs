//! Submission of encoded payloads to the metrics backend
//!
//! This module defines the `MetricsSink` trait the cycle driver hands its
//! payload to, and the InfluxDB implementation posting it over HTTP.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument, trace};

/// Timeout for a single submission
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while submitting a payload
#[derive(Debug)]
pub enum SubmissionError {
    /// The request could not be sent or no response arrived
    Transport(String),

    /// The backend answered with anything other than 204
    UnexpectedStatus { status: u16, body: String },
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionError::Transport(msg) => {
                write!(f, "unable to post pokes to InfluxDB: {}", msg)
            }
            SubmissionError::UnexpectedStatus { status, body } => write!(
                f,
                "unable to post pokes to InfluxDB, got HTTP status code {} and body: {}",
                status, body
            ),
        }
    }
}

impl std::error::Error for SubmissionError {}

impl From<reqwest::Error> for SubmissionError {
    fn from(err: reqwest::Error) -> Self {
        SubmissionError::Transport(err.to_string())
    }
}

/// Destination of the encoded payload of every cycle
///
/// A submission is a single attempt; implementations must not retry.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn submit(&self, payload: &str) -> Result<(), SubmissionError>;
}

/// Posts payloads to an InfluxDB `/write` endpoint
#[derive(Debug, Clone)]
pub struct InfluxSink {
    client: reqwest::Client,
    endpoint: String,
}

impl InfluxSink {
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SUBMIT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl MetricsSink for InfluxSink {
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn submit(&self, payload: &str) -> Result<(), SubmissionError> {
        trace!("posting {} bytes", payload.len());

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(payload.to_string())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmissionError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        debug!("payload accepted");

        Ok(())
    }
}
