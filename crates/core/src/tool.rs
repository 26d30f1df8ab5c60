//! Tool domain types and the registry.
//!
//! Tools are the schema-described domain operations the model may request:
//! recipe search, meal-plan edits, nutrition analysis. Each tool is a
//! `ToolHandler` registered once at startup under a unique name; the
//! registry is immutable afterwards and safe for lock-free concurrent reads
//! (wrap it in an `Arc` and share it across conversations).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ToolError, ToolErrorKind};
use crate::provider::ToolDefinition;

/// Categorizes tools by their functional domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    MealPlanning,
    RecipeSearch,
    Nutrition,
    UserPreferences,
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MealPlanning => write!(f, "meal_planning"),
            Self::RecipeSearch => write!(f, "recipe_search"),
            Self::Nutrition => write!(f, "nutrition"),
            Self::UserPreferences => write!(f, "user_preferences"),
        }
    }
}

/// A request to execute a tool, as issued by the model.
///
/// Arguments are raw and unvalidated; validation happens in the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID within its iteration
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The uniform result record for a tool execution.
///
/// Exactly one `ToolResult` exists per `ToolCall`, matched by `call_id`.
/// Failures are carried in-band (`success == false` plus an error kind) so
/// the loop can feed them back to the model instead of aborting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output payload (present on success)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// Failure classification (present on failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,

    /// Human-readable failure message (present on failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Whether the payload was truncated to protect the token budget
    #[serde(default)]
    pub truncated: bool,
}

impl ToolResult {
    /// A successful result.
    pub fn ok(call_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            payload: Some(payload),
            error_kind: None,
            error_message: None,
            truncated: false,
        }
    }

    /// A failed result with a classification and message.
    pub fn failed(
        call_id: impl Into<String>,
        kind: ToolErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            success: false,
            payload: None,
            error_kind: Some(kind),
            error_message: Some(message.into()),
            truncated: false,
        }
    }
}

/// The handler behind a registered tool.
///
/// Handlers return a payload value or a fault; the executor normalizes both
/// into a `ToolResult`. Handlers are shared across concurrent conversations,
/// so any internal caches must provide their own synchronization.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError>;
}

/// A single registry entry: schema, category, and handler.
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub category: ToolCategory,
    pub handler: Arc<dyn ToolHandler>,
}

/// Immutable-after-init catalog of tools.
///
/// Registration happens once at startup; duplicate names are rejected.
/// Registration order is preserved so the exported schema is stable.
pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a tool. Startup only; fails on duplicate name.
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        category: ToolCategory,
        handler: Arc<dyn ToolHandler>,
    ) -> std::result::Result<(), ToolError> {
        if self.by_name.contains_key(&definition.name) {
            return Err(ToolError::DuplicateTool(definition.name));
        }
        self.by_name
            .insert(definition.name.clone(), self.entries.len());
        self.entries.push(RegisteredTool {
            definition,
            category,
            handler,
        });
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> std::result::Result<&RegisteredTool, ToolError> {
        self.by_name
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Export the capability list handed to the model, in registration order.
    pub fn export_schema(&self, category: Option<ToolCategory>) -> Vec<ToolDefinition> {
        self.entries
            .iter()
            .filter(|e| category.is_none_or(|c| e.category == c))
            .map(|e| e.definition.clone())
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
