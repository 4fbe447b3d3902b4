//! Actor-based probe pipeline
//!
//! Each cycle is a short-lived set of async tasks communicating via Tokio
//! channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!                  ┌─────────────────┐
//!                  │   CycleDriver   │
//!                  └────────┬────────┘
//!                           │ dispatch channel (targets)
//!              ┌────────────┼────────────┐
//!              │            │            │
//!      ┌───────▼──────┐     │     ┌──────▼───────┐
//!      │ ProbeWorker-1│     │     │ ProbeWorker-N│
//!      └───────┬──────┘     │     └──────┬───────┘
//!              │            │            │
//!              └────────────┼────────────┘
//!                           │ collection channel (outcomes)
//!                  ┌────────▼────────┐
//!                  │ AggregatorActor │
//!                  └────────┬────────┘
//!                           │ oneshot (sealed batch)
//!                  ┌────────▼────────┐
//!                  │ Encoder → Sink  │
//!                  └─────────────────┘
//! ```
//!
//! ## Actor Types
//!
//! - **ProbeExecutor**: GETs one target at a time and classifies the answer
//! - **AggregatorActor**: Owns the batch and seals it once complete
//! - **CycleDriver**: Orchestrates cycles and submits the encoded payload

pub mod aggregator;
pub mod cycle;
pub mod messages;
pub mod probe;
