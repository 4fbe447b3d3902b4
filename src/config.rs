use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tracing::{trace, warn};

use crate::actors::messages::ProbeStatus;

/// Default per-request timeout for probes
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default measurement name written to the backend
pub const DEFAULT_MEASUREMENT: &str = "pokes";

/// Status recorded when a probe never received an HTTP response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TransportFailureStatus {
    #[default]
    Unknown,
    Error,
}

impl TransportFailureStatus {
    pub fn as_status(self) -> ProbeStatus {
        match self {
            TransportFailureStatus::Unknown => ProbeStatus::Unknown,
            TransportFailureStatus::Error => ProbeStatus::Error,
        }
    }
}

/// Settings for the probe executor
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub timeout: Duration,

    /// Skip certificate validation so self-signed endpoints stay reachable
    pub accept_invalid_certs: bool,

    pub transport_failure: TransportFailureStatus,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            accept_invalid_certs: true,
            transport_failure: TransportFailureStatus::default(),
        }
    }
}

/// Optional fields appended after `value` on every line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Append `counter=<cycle>i`
    pub emit_counter: bool,

    /// Append `err="<detail>"` for outcomes carrying an error detail
    pub emit_error: bool,
}

/// Everything the core needs to run, gathered from flags and environment
#[derive(Debug, Clone)]
pub struct PokerConfig {
    /// Backend write endpoint the payload is posted to
    pub influxdb_endpoint: String,

    /// `None` runs a single cycle
    pub interval: Option<Duration>,

    pub measurement: String,

    pub probe: ProbeConfig,

    pub encoder: EncoderOptions,

    /// Upper bound on concurrent probes, one worker per target if unset
    pub max_concurrency: Option<usize>,

    /// Log every encoded payload before submission
    pub debug: bool,
}

impl PokerConfig {
    pub fn new(influxdb_endpoint: impl Into<String>) -> Self {
        Self {
            influxdb_endpoint: influxdb_endpoint.into(),
            interval: None,
            measurement: DEFAULT_MEASUREMENT.to_string(),
            probe: ProbeConfig::default(),
            encoder: EncoderOptions::default(),
            max_concurrency: None,
            debug: false,
        }
    }

    /// Convert an interval in seconds, where 0 means "run once"
    pub fn interval_from_secs(secs: u64) -> Option<Duration> {
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.influxdb_endpoint.trim().is_empty() {
            anyhow::bail!("no InfluxDB endpoint configured");
        }

        validate_measurement(&self.measurement)?;

        if self.probe.timeout.is_zero() {
            anyhow::bail!("probe timeout must be greater than zero");
        }

        if self.max_concurrency == Some(0) {
            anyhow::bail!("max concurrency must be at least 1");
        }

        Ok(())
    }
}

fn validate_measurement(measurement: &str) -> anyhow::Result<()> {
    if measurement.is_empty() {
        anyhow::bail!("measurement name must not be empty");
    }

    if measurement.contains([' ', ',']) {
        anyhow::bail!("measurement name {measurement:?} must not contain spaces or commas");
    }

    Ok(())
}

/// One entry of the endpoints file
///
/// Two shapes are accepted: the tagged form and the legacy form with fixed
/// `environment`/`application` fields.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(untagged)]
pub enum TargetEntry {
    Tagged {
        endpoint: String,
        #[serde(default)]
        name: Option<String>,
        tags: BTreeMap<String, String>,
    },
    Legacy(LegacyEntry),
}

/// Legacy entry shape
///
/// Unknown fields are refused so that a tagged entry with a broken `tags`
/// object is skipped instead of being loaded without its tags.
#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyEntry {
    pub endpoint: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub application: Option<String>,
}

impl TargetEntry {
    pub fn endpoint(&self) -> &str {
        match self {
            TargetEntry::Tagged { endpoint, .. } => endpoint,
            TargetEntry::Legacy(legacy) => &legacy.endpoint,
        }
    }

    /// Split into `(url, display name, tags)`
    pub fn into_parts(self) -> (String, Option<String>, BTreeMap<String, String>) {
        match self {
            TargetEntry::Tagged {
                endpoint,
                name,
                tags,
            } => (endpoint, name, tags),
            TargetEntry::Legacy(LegacyEntry {
                endpoint,
                name,
                environment,
                application,
            }) => {
                let mut tags = BTreeMap::new();
                if let Some(environment) = environment {
                    tags.insert("environment".to_string(), environment);
                }
                if let Some(application) = application {
                    tags.insert("application".to_string(), application);
                }
                (endpoint, name, tags)
            }
        }
    }
}

/// Parse the endpoints document
///
/// Invalid JSON is an error. A document that is not an array yields no
/// entries, and array items that fit neither shape are skipped.
pub fn parse_target_entries(content: &str) -> anyhow::Result<Vec<TargetEntry>> {
    let document: serde_json::Value =
        serde_json::from_str(content).context("endpoints file is not valid JSON")?;

    let serde_json::Value::Array(items) = document else {
        warn!("endpoints file does not contain a JSON array, treating it as empty");
        return Ok(Vec::new());
    };

    let entries = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<TargetEntry>(item) {
            Ok(entry) if entry.endpoint().trim().is_empty() => {
                warn!("skipping endpoint entry #{index}: empty endpoint");
                None
            }
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping malformed endpoint entry #{index}: {e}");
                None
            }
        })
        .collect::<Vec<_>>();

    trace!("parsed {} endpoint entries", entries.len());

    Ok(entries)
}

pub fn read_targets_file(path: impl AsRef<Path>) -> anyhow::Result<Vec<TargetEntry>> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read endpoints file {}", path.display()))?;
    parse_target_entries(&file_content)
        .with_context(|| format!("invalid endpoints file {}", path.display()))
}
