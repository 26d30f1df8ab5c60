//! Conversation tracing and cost accounting for SousChef.
//!
//! Every conversation produces exactly one `Trace`: an append-only record of
//! per-iteration events (raw model output, parsed outcome, measured cost and
//! duration) plus the termination reason. Traces are observability output;
//! the orchestration loop never consults them for control decisions. Finished
//! traces are handed to a `TraceSink`.

pub mod model;
pub mod pricing;
pub mod recorder;

pub use model::{Iteration, IterationOutcome, TerminationReason, Trace};
pub use pricing::{ModelPricing, PricingTable};
pub use recorder::{CollectingSink, JsonLinesSink, TraceRecorder, TraceSink};

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("trace sink write failed: {0}")]
    SinkWrite(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
