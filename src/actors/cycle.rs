//! CycleDriver - runs dispatch → aggregate → encode → submit
//!
//! ## Message Flow
//!
//! ```text
//! capture timestamp
//!     → dispatch targets → [probe workers] → collection → AggregatorActor
//!     → sealed batch → LineProtocolEncoder → MetricsSink
//!     → idle (sleep interval, or exit when running once)
//! ```
//!
//! A cycle always runs to completion; a shutdown signal is only observed
//! while the driver is idle between cycles.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::config::PokerConfig;
use crate::line_protocol::LineProtocolEncoder;
use crate::registry::Registry;
use crate::submitter::{InfluxSink, MetricsSink};

use super::aggregator::AggregatorHandle;
use super::messages::CycleReport;
use super::probe::ProbeExecutor;

/// Drives probe cycles over a fixed registry
pub struct CycleDriver {
    registry: Registry,

    executor: ProbeExecutor,

    encoder: LineProtocolEncoder,

    sink: Arc<dyn MetricsSink>,

    /// `None` runs a single cycle
    interval: Option<Duration>,

    /// Cap on concurrent probes, one worker per target if unset
    max_concurrency: Option<usize>,

    /// Log every payload before submission
    debug: bool,

    /// Number of cycles started by this driver
    cycle: u64,
}

impl CycleDriver {
    pub fn new(
        registry: Registry,
        executor: ProbeExecutor,
        encoder: LineProtocolEncoder,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            registry,
            executor,
            encoder,
            sink,
            interval: None,
            max_concurrency: None,
            debug: false,
            cycle: 0,
        }
    }

    /// Build a driver posting to the InfluxDB endpoint from the configuration
    pub fn from_config(config: &PokerConfig, registry: Registry) -> Result<Self> {
        config.validate()?;

        let executor = ProbeExecutor::new(config.probe.clone())?;
        let encoder = LineProtocolEncoder::new(config.measurement.clone(), config.encoder);
        let sink = InfluxSink::new(config.influxdb_endpoint.clone())?;

        Ok(Self::new(registry, executor, encoder, Arc::new(sink))
            .with_interval(config.interval)
            .with_max_concurrency(config.max_concurrency)
            .with_debug(config.debug))
    }

    pub fn with_interval(mut self, interval: Option<Duration>) -> Self {
        self.interval = interval.filter(|interval| !interval.is_zero());
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: Option<usize>) -> Self {
        self.max_concurrency = max_concurrency.filter(|max| *max > 0);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Number of cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    /// Run cycles until the process ends
    ///
    /// Returns after the first cycle when no interval is configured.
    pub async fn run(self) -> u64 {
        self.run_until(std::future::pending()).await
    }

    /// Run cycles until `shutdown` resolves while idle
    ///
    /// Returns the number of completed cycles.
    pub async fn run_until<F>(mut self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            self.run_cycle().await;

            let Some(interval) = self.interval else {
                return self.cycle;
            };

            debug!("sleeping {}s until next cycle", interval.as_secs_f64());

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping after {} cycles", self.cycle);
                    return self.cycle;
                }
            }
        }
    }

    /// Run one full cycle
    ///
    /// Probe failures are part of the report; aggregation and submission
    /// failures are logged and leave `submitted` unset.
    #[instrument(skip(self), fields(cycle = self.cycle + 1, targets = self.registry.len()))]
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle += 1;
        let timestamp = Utc::now().timestamp();

        let mut report = CycleReport {
            cycle: self.cycle,
            timestamp,
            ..CycleReport::default()
        };

        let expected = self.registry.len();
        let aggregator = AggregatorHandle::spawn(self.cycle, timestamp, expected);

        let (dispatch_tx, dispatch_rx) = mpsc::channel(expected.max(1));
        let dispatch_rx = Arc::new(Mutex::new(dispatch_rx));

        let workers = self
            .max_concurrency
            .map_or(expected, |max| max.min(expected));

        debug!("dispatching {expected} targets to {workers} workers");

        let handles = (0..workers)
            .map(|_| {
                let executor = self.executor.clone();
                tokio::spawn(executor.run_worker(dispatch_rx.clone(), aggregator.sender()))
            })
            .collect::<Vec<_>>();

        for target in self.registry.iter() {
            if dispatch_tx.send(target.clone()).await.is_err() {
                error!("dispatch channel closed, all probe workers are gone");
                break;
            }
        }
        drop(dispatch_tx);

        let sealed = aggregator.sealed().await;

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!("probe worker failed: {e}");
            }
        }

        let batch = match sealed {
            Ok(batch) => batch,
            Err(e) => {
                error!("{e}, skipping submission");
                return report;
            }
        };

        for outcome in batch.outcomes() {
            report.count(outcome.status);
        }

        debug!(
            "batch sealed: {} ok, {} error, {} unknown",
            report.ok, report.error, report.unknown
        );

        if batch.is_empty() {
            warn!("no targets configured, nothing to submit");
            return report;
        }

        let payload = self.encoder.encode(&batch);

        if self.debug {
            debug!("posting the following payload\n{payload}");
        }

        match self.sink.submit(&payload).await {
            Ok(()) => {
                info!("successfully posted {} pokes", batch.len());
                report.submitted = true;
            }
            Err(e) => error!("{e}"),
        }

        report
    }
}
