//! AggregatorActor - collects probe outcomes into one batch per cycle
//!
//! The actor owns the batch exclusively; probe workers only ever hold a
//! sender of the collection channel. Outcomes arrive in completion order,
//! which is arbitrary. The batch is sealed as soon as one outcome per
//! dispatched target has been recorded, and the sealed batch is handed back
//! through a oneshot channel.
//!
//! ```text
//! worker-1 ─┐
//! worker-2 ─┼─→ collection channel → AggregatorActor → (sealed) → CycleDriver
//! worker-N ─┘
//! ```

use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, trace, warn};

use crate::registry::TargetId;

use super::messages::ProbeOutcome;

/// Errors that prevent a batch from being sealed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// The collection channel closed before every outcome arrived
    Incomplete { received: usize, expected: usize },

    /// The aggregator task went away without reporting
    Stopped,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateError::Incomplete { received, expected } => write!(
                f,
                "batch incomplete: received {received} of {expected} outcomes"
            ),
            AggregateError::Stopped => write!(f, "aggregator stopped before sealing the batch"),
        }
    }
}

impl std::error::Error for AggregateError {}

/// Reasons an individual outcome is refused by a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// An outcome for this target was already recorded this cycle
    Duplicate(TargetId),

    /// The target was never dispatched in this cycle
    UnknownTarget(TargetId),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Duplicate(id) => write!(f, "duplicate outcome for target {id}"),
            RecordError::UnknownTarget(id) => write!(f, "outcome for unknown target {id}"),
        }
    }
}

impl std::error::Error for RecordError {}

/// Outcomes of one cycle while they are still arriving
#[derive(Debug)]
pub struct Batch {
    cycle: u64,
    timestamp: i64,

    /// One slot per dispatched target, indexed by target id
    slots: Vec<Option<ProbeOutcome>>,

    received: usize,
}

impl Batch {
    pub fn new(cycle: u64, timestamp: i64, expected: usize) -> Self {
        Self {
            cycle,
            timestamp,
            slots: vec![None; expected],
            received: 0,
        }
    }

    pub fn expected(&self) -> usize {
        self.slots.len()
    }

    pub fn received(&self) -> usize {
        self.received
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.slots.len()
    }

    /// Record one outcome, refusing duplicates and unknown targets
    pub fn record(&mut self, outcome: ProbeOutcome) -> Result<(), RecordError> {
        let id = outcome.target.id;
        let slot = self
            .slots
            .get_mut(id.0)
            .ok_or(RecordError::UnknownTarget(id))?;

        if slot.is_some() {
            return Err(RecordError::Duplicate(id));
        }

        *slot = Some(outcome);
        self.received += 1;
        Ok(())
    }

    /// Seal the batch, failing if any outcome is missing
    pub fn seal(self) -> Result<SealedBatch, AggregateError> {
        let received = self.received;
        let expected = self.slots.len();

        let outcomes = self
            .slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(AggregateError::Incomplete { received, expected })?;

        Ok(SealedBatch {
            cycle: self.cycle,
            timestamp: self.timestamp,
            outcomes,
        })
    }
}

/// Complete set of outcomes for one cycle, ordered by target id
#[derive(Debug, Clone)]
pub struct SealedBatch {
    pub cycle: u64,

    /// Unix seconds captured once at cycle start
    pub timestamp: i64,

    outcomes: Vec<ProbeOutcome>,
}

impl SealedBatch {
    pub fn outcomes(&self) -> &[ProbeOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Actor that owns the batch of the running cycle
pub struct AggregatorActor {
    batch: Batch,

    /// Collection channel fed by the probe workers
    outcome_rx: mpsc::Receiver<ProbeOutcome>,
}

impl AggregatorActor {
    pub fn new(batch: Batch, outcome_rx: mpsc::Receiver<ProbeOutcome>) -> Self {
        Self { batch, outcome_rx }
    }

    /// Collect outcomes until the batch is complete or the channel closes
    #[instrument(skip(self), fields(cycle = self.batch.cycle, expected = self.batch.expected()))]
    pub async fn run(mut self) -> Result<SealedBatch, AggregateError> {
        debug!("collecting outcomes");

        while !self.batch.is_complete() {
            let Some(outcome) = self.outcome_rx.recv().await else {
                warn!(
                    "collection channel closed after {} of {} outcomes",
                    self.batch.received(),
                    self.batch.expected()
                );
                break;
            };

            let id = outcome.target.id;
            match self.batch.record(outcome) {
                Ok(()) => trace!(
                    "recorded outcome for target {id} ({}/{})",
                    self.batch.received(),
                    self.batch.expected()
                ),
                Err(e) => warn!("rejected outcome: {e}"),
            }
        }

        self.batch.seal()
    }
}

/// Handle to a running aggregator
pub struct AggregatorHandle {
    outcome_tx: mpsc::Sender<ProbeOutcome>,
    sealed_rx: oneshot::Receiver<Result<SealedBatch, AggregateError>>,
}

impl AggregatorHandle {
    /// Spawn an aggregator expecting one outcome per dispatched target
    pub fn spawn(cycle: u64, timestamp: i64, expected: usize) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::channel(expected.max(1));
        let (sealed_tx, sealed_rx) = oneshot::channel();

        let actor = AggregatorActor::new(Batch::new(cycle, timestamp, expected), outcome_rx);

        tokio::spawn(async move {
            let _ = sealed_tx.send(actor.run().await);
        });

        Self {
            outcome_tx,
            sealed_rx,
        }
    }

    /// Sender for the collection channel, one clone per probe worker
    pub fn sender(&self) -> mpsc::Sender<ProbeOutcome> {
        self.outcome_tx.clone()
    }

    /// Wait until the batch is sealed
    ///
    /// The handle's own sender is dropped first so that the aggregator can
    /// notice when every worker has gone away.
    pub async fn sealed(self) -> Result<SealedBatch, AggregateError> {
        let AggregatorHandle {
            outcome_tx,
            sealed_rx,
        } = self;
        drop(outcome_tx);

        sealed_rx.await.unwrap_or(Err(AggregateError::Stopped))
    }
}
