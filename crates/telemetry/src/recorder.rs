//! Trace accumulation and export.
//!
//! A [`TraceRecorder`] is created per conversation, fed one [`Iteration`]
//! per loop round-trip, and consumed by `finish` which stamps the
//! termination reason and produces the immutable [`Trace`]. Traces flow to
//! a [`TraceSink`] for export.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::model::{Iteration, TerminationReason, Trace};
use crate::TelemetryError;

/// Accumulates iterations for one conversation.
pub struct TraceRecorder {
    conversation_id: String,
    iterations: Vec<Iteration>,
    started_at: DateTime<Utc>,
}

impl TraceRecorder {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            iterations: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Append one completed iteration. Iterations must arrive in order.
    pub fn record_iteration(&mut self, iteration: Iteration) {
        debug_assert_eq!(iteration.index as usize, self.iterations.len());
        self.iterations.push(iteration);
    }

    /// Running total of measured spend so far.
    pub fn cost_so_far(&self) -> f64 {
        self.iterations.iter().map(|i| i.cost_usd).sum()
    }

    pub fn iteration_count(&self) -> usize {
        self.iterations.len()
    }

    /// Seal the recorder into a trace. Exactly one trace per conversation.
    pub fn finish(self, reason: TerminationReason) -> Trace {
        debug!(
            conversation_id = %self.conversation_id,
            iterations = self.iterations.len(),
            %reason,
            "conversation trace sealed"
        );
        Trace::new(self.conversation_id, self.iterations, reason, self.started_at)
    }
}

/// Destination for finished traces.
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn accept(&self, trace: &Trace) -> Result<(), TelemetryError>;
}

/// Appends one JSON object per line to a file.
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TraceSink for JsonLinesSink {
    async fn accept(&self, trace: &Trace) -> Result<(), TelemetryError> {
        let mut line = serde_json::to_string(trace)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| TelemetryError::SinkWrite(e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| TelemetryError::SinkWrite(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| TelemetryError::SinkWrite(e.to_string()))?;
        Ok(())
    }
}

/// In-memory sink for tests and inspection.
#[derive(Default)]
pub struct CollectingSink {
    traces: Mutex<Vec<Trace>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traces(&self) -> Vec<Trace> {
        self.traces.lock().unwrap().clone()
    }
}

#[async_trait]
impl TraceSink for CollectingSink {
    async fn accept(&self, trace: &Trace) -> Result<(), TelemetryError> {
        self.traces.lock().unwrap().push(trace.clone());
        Ok(())
    }
}
