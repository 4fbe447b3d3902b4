//! Message types passed between the probe workers, the aggregator and the
//! cycle driver.
//!
//! ## Design Principles
//!
//! 1. **Dispatch**: targets travel to probe workers over an mpsc channel
//! 2. **Collection**: outcomes travel back to the aggregator over an mpsc channel
//! 3. **Completion**: the sealed batch is handed back through a oneshot channel

use std::sync::Arc;

use crate::registry::Target;

/// Classified result of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeStatus {
    /// Endpoint answered with HTTP 200
    Ok,

    /// Endpoint answered with any other status code
    Error,

    /// No HTTP response was received
    Unknown,
}

impl ProbeStatus {
    /// Numeric value written to the `value` field
    pub fn code(self) -> i8 {
        match self {
            ProbeStatus::Ok => 0,
            ProbeStatus::Error => 1,
            ProbeStatus::Unknown => -1,
        }
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStatus::Ok => write!(f, "ok"),
            ProbeStatus::Error => write!(f, "error"),
            ProbeStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Outcome of probing one target once
///
/// Produced exactly once per target per cycle and never modified afterwards.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub target: Arc<Target>,

    pub status: ProbeStatus,

    /// Time until the response was read (absent on transport failure)
    pub latency_ms: Option<u64>,

    /// HTTP status code if a response was received
    pub http_status: Option<u16>,

    /// Human readable cause for anything other than `Ok`
    pub error_detail: Option<String>,
}

/// Per-cycle summary returned by the cycle driver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Sequence number of the cycle, starting at 1
    pub cycle: u64,

    /// Capture timestamp shared by every record of the cycle
    pub timestamp: i64,

    pub ok: usize,
    pub error: usize,
    pub unknown: usize,

    /// Whether the backend accepted the payload
    pub submitted: bool,
}

impl CycleReport {
    pub fn total(&self) -> usize {
        self.ok + self.error + self.unknown
    }

    pub(crate) fn count(&mut self, status: ProbeStatus) {
        match status {
            ProbeStatus::Ok => self.ok += 1,
            ProbeStatus::Error => self.error += 1,
            ProbeStatus::Unknown => self.unknown += 1,
        }
    }
}
