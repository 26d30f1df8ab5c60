//! Data model for conversation traces and iterations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use souschef_core::tool::{ToolCall, ToolResult};
use uuid::Uuid;

// ── Termination ───────────────────────────────────────────────────────────

/// Why a conversation's loop terminated. Always exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The model emitted the final-message sentinel.
    FinalMessage,
    /// The iteration ceiling was reached.
    IterationLimit,
    /// The wall-clock ceiling was reached.
    TimeLimit,
    /// The spend ceiling was reached.
    CostLimit,
    /// Consecutive inconclusive parses exhausted the retry bound.
    ParseFailure,
    /// An unrecoverable fault (context overflow, model retries exhausted).
    FatalError,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FinalMessage => write!(f, "final_message"),
            Self::IterationLimit => write!(f, "iteration_limit"),
            Self::TimeLimit => write!(f, "time_limit"),
            Self::CostLimit => write!(f, "cost_limit"),
            Self::ParseFailure => write!(f, "parse_failure"),
            Self::FatalError => write!(f, "fatal_error"),
        }
    }
}

// ── Iteration ─────────────────────────────────────────────────────────────

/// The parsed outcome of one model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IterationOutcome {
    /// The model requested tools; results are recorded in call order.
    ToolCalls {
        calls: Vec<ToolCall>,
        results: Vec<ToolResult>,
    },
    /// The model emitted a terminal answer.
    FinalMessage { text: String },
    /// Neither a tool directive nor the sentinel was recognized.
    Inconclusive,
}

/// One round-trip of model call + parse + (tool execution | termination).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Iteration {
    /// 0-based, monotonically increasing index.
    pub index: u32,
    /// The raw model output, including any hidden reasoning. Retained here
    /// for observability only, never forwarded to the user channel.
    pub raw_model_output: String,
    /// What the parser made of the output.
    pub outcome: IterationOutcome,
    /// Measured cost of this iteration's model call in USD.
    pub cost_usd: f64,
    /// Measured duration of this iteration in milliseconds.
    pub duration_ms: u64,
}

impl Iteration {
    /// Number of tool calls issued in this iteration.
    pub fn tool_call_count(&self) -> usize {
        match &self.outcome {
            IterationOutcome::ToolCalls { calls, .. } => calls.len(),
            _ => 0,
        }
    }
}

// ── Trace ─────────────────────────────────────────────────────────────────

/// The complete, ordered record of a conversation's iterations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// Unique trace id.
    pub id: String,
    /// Conversation this trace belongs to.
    pub conversation_id: String,
    /// Ordered iterations.
    pub iterations: Vec<Iteration>,
    /// Total spend across all iterations in USD.
    pub total_cost_usd: f64,
    /// Total duration across all iterations in milliseconds.
    pub total_duration_ms: u64,
    /// Why the loop terminated.
    pub termination_reason: TerminationReason,
    /// When the trace started.
    pub started_at: DateTime<Utc>,
    /// When the trace ended.
    pub ended_at: DateTime<Utc>,
}

impl Trace {
    pub(crate) fn new(
        conversation_id: impl Into<String>,
        iterations: Vec<Iteration>,
        termination_reason: TerminationReason,
        started_at: DateTime<Utc>,
    ) -> Self {
        let total_cost_usd = iterations.iter().map(|i| i.cost_usd).sum();
        let total_duration_ms = iterations.iter().map(|i| i.duration_ms).sum();
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            iterations,
            total_cost_usd,
            total_duration_ms,
            termination_reason,
            started_at,
            ended_at: Utc::now(),
        }
    }

    /// Total number of tool calls recorded across all iterations.
    pub fn tool_call_count(&self) -> usize {
        self.iterations.iter().map(|i| i.tool_call_count()).sum()
    }

    /// The terminal answer recorded in the trace, if the loop reached one.
    pub fn final_message(&self) -> Option<&str> {
        self.iterations.iter().rev().find_map(|i| match &i.outcome {
            IterationOutcome::FinalMessage { text } => Some(text.as_str()),
            _ => None,
        })
    }
}
