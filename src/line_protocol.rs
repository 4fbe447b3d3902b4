//! Line protocol encoding of sealed batches
//!
//! Every outcome becomes one record:
//!
//! ```text
//! <measurement>,endpoint=<url>,<tag>=<value>,... value=<status>[,counter=<n>i][,err="<detail>"] <unix seconds>
//! ```
//!
//! Tags follow the implicit `endpoint` tag in key order, so the same batch
//! always encodes to the same bytes.

use std::fmt::Write;

use crate::actors::aggregator::SealedBatch;
use crate::actors::messages::ProbeOutcome;
use crate::config::EncoderOptions;
use crate::registry::ENDPOINT_TAG;

/// Escape `=` and `,` in a tag key or value
///
/// Each character is substituted once, so backslashes introduced by one
/// substitution are never escaped again and literal backslashes stay as-is.
pub fn escape_tag(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '=' | ',') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Escape a string field value (`\` and `"`)
pub fn escape_field_string(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len() + 2);
    for c in raw.chars() {
        match c {
            '\\' | '"' => {
                escaped.push('\\');
                escaped.push(c);
            }
            // Newlines would split the record
            '\n' | '\r' => escaped.push(' '),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Encodes sealed batches for one measurement
#[derive(Debug, Clone)]
pub struct LineProtocolEncoder {
    measurement: String,
    options: EncoderOptions,
}

impl LineProtocolEncoder {
    pub fn new(measurement: impl Into<String>, options: EncoderOptions) -> Self {
        Self {
            measurement: measurement.into(),
            options,
        }
    }

    /// Render the whole batch, one line per outcome, without a trailing newline
    pub fn encode(&self, batch: &SealedBatch) -> String {
        batch
            .outcomes()
            .iter()
            .map(|outcome| self.encode_line(outcome, batch.cycle, batch.timestamp))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn encode_line(&self, outcome: &ProbeOutcome, cycle: u64, timestamp: i64) -> String {
        let target = &outcome.target;

        let mut line = format!(
            "{},{ENDPOINT_TAG}={}",
            self.measurement,
            escape_tag(&target.url)
        );

        for (key, value) in &target.tags {
            // Empty tag keys and values are rejected by the backend
            if key.is_empty() || value.is_empty() {
                continue;
            }
            let _ = write!(line, ",{}={}", escape_tag(key), escape_tag(value));
        }

        let _ = write!(line, " value={}", outcome.status.code());

        if self.options.emit_counter {
            let _ = write!(line, ",counter={cycle}i");
        }

        if self.options.emit_error
            && let Some(detail) = &outcome.error_detail
        {
            let _ = write!(line, ",err=\"{}\"", escape_field_string(detail));
        }

        let _ = write!(line, " {timestamp}");

        line
    }
}
