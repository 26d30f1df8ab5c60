//! Configuration loading, validation, and management for SousChef.
//!
//! Loads configuration from `~/.souschef/config.toml` with environment
//! variable overrides. All limits are deployment-scoped: the budgets and
//! context settings apply to every conversation, never per call.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.souschef/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Budget limits for the orchestration loop
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Conversation context settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Loop behavior settings
    #[serde(default, rename = "loop")]
    pub loop_config: LoopConfig,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("budget", &self.budget)
            .field("context", &self.context)
            .field("loop", &self.loop_config)
            .finish()
    }
}

/// Iteration, time, and spend ceilings for a single conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Maximum model-call iterations per conversation.
    /// Setting this to 1 collapses the loop to a single non-agentic pass.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Maximum wall-clock seconds per conversation
    #[serde(default = "default_max_time_seconds")]
    pub max_time_seconds: u64,

    /// Maximum tokens the model may generate per call
    #[serde(default = "default_max_tokens_per_call")]
    pub max_tokens_per_call: u32,

    /// Maximum spend in USD per conversation
    #[serde(default = "default_cost_limit_usd")]
    pub cost_limit_usd: f64,
}

fn default_max_iterations() -> u32 {
    20
}
fn default_max_time_seconds() -> u64 {
    60
}
fn default_max_tokens_per_call() -> u32 {
    4096
}
fn default_cost_limit_usd() -> f64 {
    0.50
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_time_seconds: default_max_time_seconds(),
            max_tokens_per_call: default_max_tokens_per_call(),
            cost_limit_usd: default_cost_limit_usd(),
        }
    }
}

/// Conversation history limits and compression policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Token budget for the assembled conversation
    #[serde(default = "default_context_max_tokens")]
    pub max_tokens: usize,

    /// Fraction of `max_tokens` at which compression triggers
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: f64,

    /// Number of most-recent messages kept verbatim through compression
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
}

fn default_context_max_tokens() -> usize {
    8000
}
fn default_compression_threshold() -> f64 {
    0.85
}
fn default_keep_recent() -> usize {
    6
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_context_max_tokens(),
            compression_threshold: default_compression_threshold(),
            keep_recent: default_keep_recent(),
        }
    }
}

/// Retry bounds and payload limits for the loop itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Per-model-call deadline in seconds (independent of the time budget)
    #[serde(default = "default_per_call_timeout_secs")]
    pub per_call_timeout_secs: u64,

    /// Consecutive model-call timeouts tolerated before a fatal abort
    #[serde(default = "default_model_retry_limit")]
    pub model_retry_limit: u32,

    /// Consecutive inconclusive parses tolerated before a fatal abort
    #[serde(default = "default_inconclusive_limit")]
    pub inconclusive_limit: u32,

    /// Tool payloads above this size are truncated before entering context
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

fn default_per_call_timeout_secs() -> u64 {
    30
}
fn default_model_retry_limit() -> u32 {
    2
}
fn default_inconclusive_limit() -> u32 {
    3
}
fn default_max_payload_bytes() -> usize {
    8 * 1024
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            per_call_timeout_secs: default_per_call_timeout_secs(),
            model_retry_limit: default_model_retry_limit(),
            inconclusive_limit: default_inconclusive_limit(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            budget: BudgetConfig::default(),
            context: ContextConfig::default(),
            loop_config: LoopConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.souschef/config.toml).
    ///
    /// Also checks environment variables:
    /// - `SOUSCHEF_API_KEY` (highest priority), then `OPENROUTER_API_KEY`,
    ///   then `OPENAI_API_KEY`
    /// - `SOUSCHEF_MODEL` overrides the model
    /// - `SOUSCHEF_BASE_URL` overrides the endpoint
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("SOUSCHEF_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("SOUSCHEF_MODEL") {
            config.model = model;
        }

        if let Ok(base_url) = std::env::var("SOUSCHEF_BASE_URL") {
            config.base_url = base_url;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".souschef")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.budget.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "budget.max_iterations must be at least 1".into(),
            ));
        }

        if self.budget.cost_limit_usd <= 0.0 {
            return Err(ConfigError::ValidationError(
                "budget.cost_limit_usd must be positive".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.context.compression_threshold) {
            return Err(ConfigError::ValidationError(
                "context.compression_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.context.keep_recent == 0 {
            return Err(ConfigError::ValidationError(
                "context.keep_recent must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
