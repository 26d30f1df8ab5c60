//! Token estimation.
//!
//! Character-based heuristic: ~4 characters per token, accurate within
//! ~10% for BPE tokenizers on English text. Each message carries a flat
//! overhead for role names and wire-format delimiters.

/// Per-message overhead in tokens.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for message content including per-message overhead.
pub fn estimate_message_tokens(content: &str) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(content)
}
