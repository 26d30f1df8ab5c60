//! Model-output parsing.
//!
//! A raw model output resolves into exactly one of three outcomes: a set of
//! tool calls, a terminal answer, or inconclusive. The terminal form is
//! signaled by the literal sentinel `{{final_message: <text>}}`; everything
//! before the sentinel is internal reasoning that never reaches the user
//! channel. The sentinel always wins: tool directives appearing before it
//! are discarded.

use serde::Deserialize;
use serde_json::Value;
use souschef_core::ToolCall;
use tracing::{debug, warn};

/// Case-sensitive sentinel prefix. First occurrence wins.
const FINAL_MARKER: &str = "{{final_message:";

/// Opening fence of a text-embedded tool directive.
const TOOL_FENCE_OPEN: &str = "```tool";
const FENCE_CLOSE: &str = "```";

/// What one model output resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutcome {
    /// Tool invocations, in the order the model issued them.
    ToolCalls(Vec<ToolCall>),
    /// The terminal answer, preserved exactly as authored.
    FinalMessage(String),
    /// Neither a tool directive nor the sentinel was recognized.
    Inconclusive,
}

/// The two-channel parse result: `reasoning` is trace-only and must never
/// be forwarded to the user-facing output.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub reasoning: Option<String>,
    pub outcome: ParsedOutcome,
}

/// Shape of the JSON body inside a ```tool fence.
#[derive(Deserialize)]
struct ToolDirective {
    name: String,
    #[serde(default)]
    arguments: Value,
    id: Option<String>,
}

pub struct ResponseParser;

impl ResponseParser {
    /// Resolve one raw model output.
    ///
    /// `structured_calls` is the tool-call list the model API returned
    /// out-of-band, if any; it is used only when no sentinel is present.
    /// `iteration` seeds synthesized call ids (`call-<iteration>-<n>`) for
    /// text directives that carry none.
    pub fn parse(raw_output: &str, structured_calls: &[ToolCall], iteration: u32) -> Parsed {
        if let Some(marker_pos) = raw_output.find(FINAL_MARKER) {
            let reasoning = raw_output[..marker_pos].trim();
            let reasoning = (!reasoning.is_empty()).then(|| reasoning.to_string());

            let mut payload = &raw_output[marker_pos + FINAL_MARKER.len()..];
            payload = payload.strip_prefix(' ').unwrap_or(payload);
            // Models often omit the closing braces; strip them only when
            // the output actually ends with them.
            let payload = payload.strip_suffix("}}").unwrap_or(payload);

            if !structured_calls.is_empty() {
                debug!(
                    discarded = structured_calls.len(),
                    "final-message sentinel present, discarding tool calls"
                );
            }

            return Parsed {
                reasoning,
                outcome: ParsedOutcome::FinalMessage(payload.to_string()),
            };
        }

        if !structured_calls.is_empty() {
            return Parsed {
                reasoning: None,
                outcome: ParsedOutcome::ToolCalls(structured_calls.to_vec()),
            };
        }

        let embedded = Self::scan_tool_directives(raw_output, iteration);
        if !embedded.is_empty() {
            return Parsed {
                reasoning: None,
                outcome: ParsedOutcome::ToolCalls(embedded),
            };
        }

        Parsed {
            reasoning: None,
            outcome: ParsedOutcome::Inconclusive,
        }
    }

    /// Extract ```tool fenced directives. Malformed bodies are skipped.
    fn scan_tool_directives(text: &str, iteration: u32) -> Vec<ToolCall> {
        let mut calls = Vec::new();
        let mut rest = text;

        while let Some(open) = rest.find(TOOL_FENCE_OPEN) {
            let body_start = open + TOOL_FENCE_OPEN.len();
            let Some(close) = rest[body_start..].find(FENCE_CLOSE) else {
                break;
            };
            let body = rest[body_start..body_start + close].trim();
            rest = &rest[body_start + close + FENCE_CLOSE.len()..];

            match serde_json::from_str::<ToolDirective>(body) {
                Ok(directive) => {
                    let id = directive
                        .id
                        .unwrap_or_else(|| format!("call-{}-{}", iteration, calls.len()));
                    calls.push(ToolCall {
                        id,
                        name: directive.name,
                        arguments: directive.arguments,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "skipping malformed tool directive");
                }
            }
        }

        calls
    }
}
