//! # SousChef Core
//!
//! Domain types, traits, and error definitions for the SousChef meal-planning
//! assistant. This crate has **zero framework dependencies**: it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator of the orchestration loop is a trait here:
//! the model backend (`ModelProvider`) and the callable domain operations
//! (`ToolHandler`). Implementations live in their respective crates. This
//! enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, LoopError, ModelError, Result, ToolError, ToolErrorKind};
pub use message::{ConversationId, Message, Role};
pub use provider::{ModelProvider, ModelRequest, ModelResponse, ToolDefinition, Usage};
pub use tool::{ToolCall, ToolCategory, ToolHandler, ToolRegistry, ToolResult};
