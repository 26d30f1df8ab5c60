//! Bounded conversation history with token-budget compression.
//!
//! The context maintains the invariant `total_tokens == Σ token_count` over
//! its messages. When the running total crosses the compression threshold,
//! the older middle of the history is replaced by one synthesized
//! assistant-internal summary; the leading system message and the most
//! recent window survive, and a tool-result message is never separated from
//! the assistant turn that requested it.

use souschef_config::ContextConfig;
use souschef_core::{LoopError, Message, Role};
use tracing::{debug, info};

use crate::token;

pub struct ConversationContext {
    messages: Vec<Message>,
    max_tokens: usize,
    compression_threshold: f64,
    keep_recent: usize,
    total_tokens: usize,
}

impl ConversationContext {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            messages: Vec::new(),
            max_tokens: config.max_tokens,
            compression_threshold: config.compression_threshold,
            keep_recent: config.keep_recent,
            total_tokens: 0,
        }
    }

    /// Append a message. Messages are immutable once appended.
    pub fn append(&mut self, message: Message) {
        self.total_tokens += message.token_count;
        self.messages.push(message);
    }

    /// The messages a model request should carry, in order.
    pub fn snapshot_for_model(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    /// Compress when the running total crosses the threshold. Returns
    /// whether compression ran; `ContextOverflow` when even the retained
    /// set does not fit the budget.
    pub fn compress_if_needed(&mut self) -> Result<bool, LoopError> {
        let threshold = (self.max_tokens as f64 * self.compression_threshold) as usize;
        if self.total_tokens <= threshold {
            return Ok(false);
        }

        // Window of recent messages, widened so it never opens on a tool
        // result whose assistant turn would be dropped.
        let mut window_start = self.messages.len().saturating_sub(self.keep_recent);
        while window_start > 0 && self.messages[window_start].role == Role::Tool {
            window_start -= 1;
        }

        let lead_system = self
            .messages
            .first()
            .filter(|m| m.role == Role::System)
            .cloned();
        let dropped_start = usize::from(lead_system.is_some());

        if window_start <= dropped_start {
            // Nothing to drop; the recent window alone is over budget.
            return Err(LoopError::ContextOverflow {
                needed: self.total_tokens,
                budget: self.max_tokens,
            });
        }

        let dropped = &self.messages[dropped_start..window_start];
        let summary_text = summarize(dropped);
        let summary = Message::assistant_internal(
            &summary_text,
            token::estimate_message_tokens(&summary_text),
        );

        let mut compressed = Vec::with_capacity(2 + self.messages.len() - window_start);
        if let Some(system) = lead_system {
            compressed.push(system);
        }
        compressed.push(summary);
        compressed.extend_from_slice(&self.messages[window_start..]);

        let new_total: usize = compressed.iter().map(|m| m.token_count).sum();
        if new_total > self.max_tokens {
            return Err(LoopError::ContextOverflow {
                needed: new_total,
                budget: self.max_tokens,
            });
        }

        info!(
            dropped = dropped.len(),
            before_tokens = self.total_tokens,
            after_tokens = new_total,
            "compressed conversation context"
        );
        self.messages = compressed;
        self.total_tokens = new_total;
        debug!(messages = self.messages.len(), "context after compression");
        Ok(true)
    }
}

/// Deterministic digest of dropped history. No model call involved.
fn summarize(dropped: &[Message]) -> String {
    let user_turns = dropped.iter().filter(|m| m.role == Role::User).count();
    let tool_turns = dropped.iter().filter(|m| m.role == Role::Tool).count();

    let mut summary = format!(
        "[Earlier conversation compressed: {} messages, {} user turns, {} tool results.]",
        dropped.len(),
        user_turns,
        tool_turns
    );

    for msg in dropped.iter().filter(|m| m.role == Role::User) {
        let excerpt: String = msg.content.chars().take(80).collect();
        summary.push_str("\nUser asked: ");
        summary.push_str(&excerpt);
        if msg.content.chars().count() > 80 {
            summary.push('…');
        }
    }

    summary
}
