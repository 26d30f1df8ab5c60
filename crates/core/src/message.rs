//! Message domain types.
//!
//! Messages are the value objects that flow through the orchestration loop:
//! user input → assistant turns (visible or internal) → tool results.
//! A message is immutable once constructed, and its token count is supplied
//! by the caller at construction time; there is no way to build a `Message`
//! with an unknown token count, which is what lets `ConversationContext`
//! keep an exact running sum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instructions (sentinel format rules, corrective notes)
    System,
    /// The end user
    User,
    /// A user-visible assistant turn
    Assistant,
    /// Assistant-internal content (reasoning, compression summaries);
    /// sent back to the model, never forwarded to the user channel
    AssistantInternal,
    /// Tool execution result
    Tool,
}

/// A single message in a conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Token count, pre-computed by the caller with a consistent estimator
    pub token_count: usize,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn build(role: Role, content: impl Into<String>, token_count: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            token_count,
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>, token_count: usize) -> Self {
        Self::build(Role::User, content, token_count)
    }

    /// Create a new user-visible assistant message.
    pub fn assistant(content: impl Into<String>, token_count: usize) -> Self {
        Self::build(Role::Assistant, content, token_count)
    }

    /// Create an assistant-internal message (reasoning, summaries).
    pub fn assistant_internal(content: impl Into<String>, token_count: usize) -> Self {
        Self::build(Role::AssistantInternal, content, token_count)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>, token_count: usize) -> Self {
        Self::build(Role::System, content, token_count)
    }

    /// Create a tool result message.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        token_count: usize,
    ) -> Self {
        let mut msg = Self::build(Role::Tool, content, token_count);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }
}
