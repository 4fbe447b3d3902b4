pub mod actors;
pub mod config;
pub mod line_protocol;
pub mod registry;
pub mod submitter;
pub mod util;

pub use actors::aggregator::SealedBatch;
pub use actors::cycle::CycleDriver;
pub use actors::messages::{CycleReport, ProbeOutcome, ProbeStatus};
pub use registry::{Registry, Target, TargetId};
