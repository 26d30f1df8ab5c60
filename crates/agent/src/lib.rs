//! souschef-agent: the orchestration loop and its supporting machinery.
//!
//! The loop drives repeated model calls, parses each output into tool
//! invocations or a terminal answer, executes tools concurrently, keeps the
//! conversation history inside its token budget, and enforces iteration,
//! wall-clock, and spend ceilings. See [`OrchestrationLoop::run`].

pub mod budget;
pub mod context;
pub mod executor;
pub mod loop_runner;
pub mod parser;
pub mod token;

pub use budget::{BudgetExceeded, BudgetTracker};
pub use context::ConversationContext;
pub use executor::ToolExecutor;
pub use loop_runner::{ConversationOutcome, OrchestrationLoop};
pub use parser::{Parsed, ParsedOutcome, ResponseParser};
