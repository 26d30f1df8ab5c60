//! The orchestration loop.
//!
//! Drives repeated model calls until the model emits a terminal answer or a
//! budget runs out. Every run produces exactly one user-visible final
//! message and exactly one trace; partial failures (tool faults,
//! inconclusive parses, per-call timeouts) are absorbed inside the loop and
//! surface to the model, never to the caller.
//!
//! Only the loop mutates the conversation context; tool results come back
//! as values and are appended here in call order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use souschef_config::AppConfig;
use souschef_core::{ConversationId, Message, ModelProvider, ModelRequest, ToolRegistry, ToolResult};
use souschef_telemetry::{
    Iteration, IterationOutcome, PricingTable, TerminationReason, Trace, TraceRecorder, TraceSink,
};
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::budget::BudgetTracker;
use crate::context::ConversationContext;
use crate::executor::ToolExecutor;
use crate::parser::{ParsedOutcome, ResponseParser};
use crate::token;

/// Formatting contract prepended to the first user message of every
/// conversation, exactly once.
const SENTINEL_INSTRUCTIONS: &str = "\
When you need information, call a tool by emitting a fenced block:
```tool
{\"name\": \"<tool name>\", \"arguments\": {...}}
```
When you are ready to answer, wrap the reply the user should see as
{{final_message: <your answer>}}. Anything you write before that marker is
private reasoning and is never shown to the user.";

/// Appended after an output that was neither a tool call nor a final answer.
const CORRECTIVE_NOTE: &str = "\
Your previous reply was neither a tool call nor a final answer. Either call \
a tool, or reply with {{final_message: <your answer>}}.";

/// Final message synthesized when a budget runs out mid-conversation.
const BUDGET_FALLBACK: &str = "\
I ran out of budget before finishing. Here is a partial result based on what \
I gathered so far; please narrow the request and try again.";

/// Final message for unrecoverable faults. Deliberately carries no partial
/// content.
const FATAL_APOLOGY: &str = "\
Something went wrong on my side and I couldn't complete this request. \
Please try again.";

/// What one run hands back: the user-visible reply and its trace.
#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    pub final_message: String,
    pub trace: Trace,
}

pub struct OrchestrationLoop {
    provider: Arc<dyn ModelProvider>,
    registry: Arc<ToolRegistry>,
    config: AppConfig,
    pricing: Arc<PricingTable>,
    sink: Option<Arc<dyn TraceSink>>,
    cancel: Arc<Notify>,
}

impl OrchestrationLoop {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        registry: Arc<ToolRegistry>,
        config: AppConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            config,
            pricing: Arc::new(PricingTable::with_defaults()),
            sink: None,
            cancel: Arc::new(Notify::new()),
        }
    }

    /// Replace the pricing table used for cost measurement.
    pub fn with_pricing(mut self, pricing: Arc<PricingTable>) -> Self {
        self.pricing = pricing;
        self
    }

    /// Attach a sink that receives the finished trace of every run.
    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Handle for external cancellation, honored at iteration boundaries.
    pub fn cancellation_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.cancel)
    }

    /// Run one conversation to completion.
    ///
    /// Infallible by contract: every path, including fatal ones, resolves
    /// to a final message and a sealed trace.
    pub async fn run(&self, user_message: &str) -> ConversationOutcome {
        let conversation_id = ConversationId::new();
        info!(conversation_id = %conversation_id, "starting conversation");

        let mut context = ConversationContext::new(&self.config.context);
        let mut budget = BudgetTracker::new(self.config.budget.clone());
        let mut recorder = TraceRecorder::new(conversation_id.0.clone());
        let executor =
            ToolExecutor::new(Arc::clone(&self.registry), self.config.loop_config.max_payload_bytes);

        let opening = format!("{SENTINEL_INSTRUCTIONS}\n\n{user_message}");
        context.append(Message::user(&opening, token::estimate_message_tokens(&opening)));

        let tool_schema = self.registry.export_schema(None);
        let mut consecutive_timeouts: u32 = 0;
        let mut consecutive_inconclusive: u32 = 0;

        loop {
            if self.cancel.notified().now_or_never().is_some() {
                info!(conversation_id = %conversation_id, "cancelled at iteration boundary");
                return self
                    .terminate(recorder, TerminationReason::FatalError, FATAL_APOLOGY.into())
                    .await;
            }

            if let Err(exceeded) = budget.check() {
                info!(
                    conversation_id = %conversation_id,
                    iterations = budget.iterations(),
                    spent_usd = budget.spent_usd(),
                    reason = %exceeded,
                    "budget exhausted"
                );
                return self
                    .terminate(recorder, exceeded.into(), BUDGET_FALLBACK.into())
                    .await;
            }

            if let Err(e) = context.compress_if_needed() {
                warn!(conversation_id = %conversation_id, error = %e, "context overflow");
                return self
                    .terminate(recorder, TerminationReason::FatalError, FATAL_APOLOGY.into())
                    .await;
            }

            let iteration_index = recorder.iteration_count() as u32;
            let request = ModelRequest {
                model: self.config.model.clone(),
                messages: context.snapshot_for_model(),
                temperature: self.config.temperature,
                max_tokens: Some(self.config.budget.max_tokens_per_call),
                tools: tool_schema.clone(),
            };

            debug!(
                conversation_id = %conversation_id,
                iteration = iteration_index,
                messages = context.len(),
                "calling model"
            );

            let per_call = Duration::from_secs(self.config.loop_config.per_call_timeout_secs);
            let started = Instant::now();
            let response = match timeout(per_call, self.provider.complete(request)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    warn!(conversation_id = %conversation_id, error = %e, "model call failed");
                    return self
                        .terminate(recorder, TerminationReason::FatalError, FATAL_APOLOGY.into())
                        .await;
                }
                Err(_) => {
                    // A timed-out call consumes its iteration and appends
                    // nothing to the context.
                    consecutive_timeouts += 1;
                    warn!(
                        conversation_id = %conversation_id,
                        attempt = consecutive_timeouts,
                        "model call timed out"
                    );
                    recorder.record_iteration(Iteration {
                        index: iteration_index,
                        raw_model_output: String::new(),
                        outcome: IterationOutcome::Inconclusive,
                        cost_usd: 0.0,
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                    budget.record(0.0);
                    if consecutive_timeouts > self.config.loop_config.model_retry_limit {
                        return self
                            .terminate(recorder, TerminationReason::FatalError, FATAL_APOLOGY.into())
                            .await;
                    }
                    continue;
                }
            };
            consecutive_timeouts = 0;

            let duration_ms = started.elapsed().as_millis() as u64;
            let cost_usd = response
                .usage
                .as_ref()
                .map(|u| self.pricing.compute_cost(&response.model, u))
                .unwrap_or(0.0);

            let parsed = ResponseParser::parse(&response.text, &response.tool_calls, iteration_index);
            if let Some(reasoning) = &parsed.reasoning {
                debug!(
                    conversation_id = %conversation_id,
                    chars = reasoning.len(),
                    "model reasoning withheld from user channel"
                );
            }

            match parsed.outcome {
                ParsedOutcome::FinalMessage(text) => {
                    context.append(Message::assistant(&text, token::estimate_message_tokens(&text)));
                    recorder.record_iteration(Iteration {
                        index: iteration_index,
                        raw_model_output: response.text,
                        outcome: IterationOutcome::FinalMessage { text: text.clone() },
                        cost_usd,
                        duration_ms,
                    });
                    budget.record(cost_usd);
                    return self
                        .terminate(recorder, TerminationReason::FinalMessage, text)
                        .await;
                }
                ParsedOutcome::ToolCalls(calls) => {
                    consecutive_inconclusive = 0;
                    debug!(
                        conversation_id = %conversation_id,
                        count = calls.len(),
                        "executing tool calls"
                    );

                    context.append(Message::assistant(
                        &response.text,
                        token::estimate_message_tokens(&response.text),
                    ));

                    let results = executor.execute_all(&calls).await;
                    for result in &results {
                        let content = render_tool_result(result);
                        context.append(Message::tool_result(
                            &result.call_id,
                            &content,
                            token::estimate_message_tokens(&content),
                        ));
                    }

                    recorder.record_iteration(Iteration {
                        index: iteration_index,
                        raw_model_output: response.text,
                        outcome: IterationOutcome::ToolCalls { calls, results },
                        cost_usd,
                        duration_ms,
                    });
                    budget.record(cost_usd);
                }
                ParsedOutcome::Inconclusive => {
                    consecutive_inconclusive += 1;
                    debug!(
                        conversation_id = %conversation_id,
                        streak = consecutive_inconclusive,
                        "inconclusive model output"
                    );

                    recorder.record_iteration(Iteration {
                        index: iteration_index,
                        raw_model_output: response.text,
                        outcome: IterationOutcome::Inconclusive,
                        cost_usd,
                        duration_ms,
                    });
                    budget.record(cost_usd);

                    if consecutive_inconclusive >= self.config.loop_config.inconclusive_limit {
                        return self
                            .terminate(recorder, TerminationReason::ParseFailure, FATAL_APOLOGY.into())
                            .await;
                    }
                    context.append(Message::system(
                        CORRECTIVE_NOTE,
                        token::estimate_message_tokens(CORRECTIVE_NOTE),
                    ));
                }
            }
        }
    }

    async fn terminate(
        &self,
        recorder: TraceRecorder,
        reason: TerminationReason,
        final_message: String,
    ) -> ConversationOutcome {
        let trace = recorder.finish(reason);
        info!(
            conversation_id = %trace.conversation_id,
            iterations = trace.iterations.len(),
            total_cost_usd = trace.total_cost_usd,
            %reason,
            "conversation terminated"
        );

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.accept(&trace).await {
                warn!(error = %e, "failed to export trace");
            }
        }

        ConversationOutcome {
            final_message,
            trace,
        }
    }
}

/// How a tool result reads from inside the conversation.
fn render_tool_result(result: &ToolResult) -> String {
    if result.success {
        let payload = result
            .payload
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "null".into());
        if result.truncated {
            format!("{payload}\n[payload truncated]")
        } else {
            payload
        }
    } else {
        format!(
            "error ({}): {}",
            result
                .error_kind
                .map(|k| k.to_string())
                .unwrap_or_else(|| "unknown".into()),
            result.error_message.as_deref().unwrap_or("no details")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use souschef_core::{
        ModelError, ModelResponse, ToolCall, ToolCategory, ToolDefinition, ToolError,
        ToolErrorKind, ToolHandler, Usage,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Plays back a fixed script of responses, one per call.
    struct ScriptedProvider {
        script: Mutex<Vec<ModelResponse>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(mut script: Vec<ModelResponse>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop()
                .ok_or(ModelError::MalformedResponse("script exhausted".into()))
        }
    }

    /// Repeats the same response forever.
    struct RepeatingProvider {
        response: ModelResponse,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelProvider for RepeatingProvider {
        fn name(&self) -> &str {
            "repeating"
        }

        async fn complete(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    /// Never completes within any per-call timeout.
    struct HangingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelProvider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn complete(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("provider never completes")
        }
    }

    struct RecipeSearchHandler;

    #[async_trait]
    impl ToolHandler for RecipeSearchHandler {
        async fn call(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            Ok(json!({"count": 3, "recipes": ["a", "b", "c"]}))
        }
    }

    fn text_response(text: &str) -> ModelResponse {
        ModelResponse {
            text: text.into(),
            tool_calls: vec![],
            usage: Some(Usage {
                prompt_tokens: 100,
                completion_tokens: 20,
                total_tokens: 120,
            }),
            model: "anthropic/claude-sonnet-4".into(),
        }
    }

    fn tool_response(id: &str, name: &str, arguments: serde_json::Value) -> ModelResponse {
        ModelResponse {
            tool_calls: vec![ToolCall {
                id: id.into(),
                name: name.into(),
                arguments,
            }],
            ..text_response("I'll look that up.")
        }
    }

    fn registry_with_search() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolDefinition {
                    name: "search_recipes".into(),
                    description: "Search the recipe catalog".into(),
                    parameters: json!({
                        "type": "object",
                        "properties": {"query": {"type": "string"}},
                        "required": ["query"]
                    }),
                },
                ToolCategory::RecipeSearch,
                Arc::new(RecipeSearchHandler),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.budget.max_iterations = 20;
        config.loop_config.inconclusive_limit = 3;
        config.loop_config.model_retry_limit = 2;
        config.loop_config.per_call_timeout_secs = 5;
        config
    }

    fn orchestrator(provider: Arc<dyn ModelProvider>) -> OrchestrationLoop {
        OrchestrationLoop::new(provider, registry_with_search(), test_config())
    }

    #[tokio::test]
    async fn immediate_final_message() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response(
            "{{final_message: Hi there!}}",
        )]));
        let outcome = orchestrator(provider.clone()).run("Hello").await;

        assert_eq!(outcome.final_message, "Hi there!");
        assert_eq!(outcome.trace.iterations.len(), 1);
        assert_eq!(outcome.trace.tool_call_count(), 0);
        assert_eq!(
            outcome.trace.termination_reason,
            TerminationReason::FinalMessage
        );
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_call_then_final_message() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response("c1", "search_recipes", json!({"query": "chicken"})),
            text_response("{{final_message: Found 3 chicken recipes.}}"),
        ]));
        let outcome = orchestrator(provider.clone())
            .run("What chicken recipes do you have?")
            .await;

        assert_eq!(outcome.final_message, "Found 3 chicken recipes.");
        assert_eq!(outcome.trace.iterations.len(), 2);
        assert_eq!(outcome.trace.tool_call_count(), 1);
        let IterationOutcome::ToolCalls { results, .. } = &outcome.trace.iterations[0].outcome
        else {
            panic!("first iteration should carry tool calls");
        };
        assert!(results[0].success);
        assert_eq!(
            outcome.trace.termination_reason,
            TerminationReason::FinalMessage
        );
    }

    #[tokio::test]
    async fn iteration_limit_stops_exactly_at_max() {
        let provider = Arc::new(RepeatingProvider {
            response: tool_response("c1", "search_recipes", json!({"query": "anything"})),
            calls: AtomicUsize::new(0),
        });
        let outcome = orchestrator(provider.clone()).run("Loop forever").await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 20);
        assert_eq!(outcome.trace.iterations.len(), 20);
        assert_eq!(
            outcome.trace.termination_reason,
            TerminationReason::IterationLimit
        );
        assert_eq!(outcome.final_message, BUDGET_FALLBACK);
    }

    #[tokio::test]
    async fn missing_required_argument_continues_loop() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response("c1", "search_recipes", json!({})),
            text_response("{{final_message: Sorry, I couldn't search.}}"),
        ]));
        let outcome = orchestrator(provider.clone()).run("Search please").await;

        let IterationOutcome::ToolCalls { results, .. } = &outcome.trace.iterations[0].outcome
        else {
            panic!("first iteration should carry tool calls");
        };
        assert!(!results[0].success);
        assert_eq!(results[0].error_kind, Some(ToolErrorKind::ValidationError));
        // The loop recovered and completed normally.
        assert_eq!(outcome.trace.iterations.len(), 2);
        assert_eq!(
            outcome.trace.termination_reason,
            TerminationReason::FinalMessage
        );
    }

    #[tokio::test]
    async fn cost_limit_blocks_next_model_call() {
        let mut config = test_config();
        // Each scripted call costs (100 * 3 + 20 * 15) / 1M = $0.0006.
        config.budget.cost_limit_usd = 0.001;
        let provider = Arc::new(RepeatingProvider {
            response: tool_response("c1", "search_recipes", json!({"query": "x"})),
            calls: AtomicUsize::new(0),
        });
        let orchestrator =
            OrchestrationLoop::new(provider.clone(), registry_with_search(), config);
        let outcome = orchestrator.run("Spend money").await;

        assert_eq!(
            outcome.trace.termination_reason,
            TerminationReason::CostLimit
        );
        // Two iterations cross the $0.001 limit; no third call happens.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.final_message, BUDGET_FALLBACK);
    }

    #[tokio::test]
    async fn time_limit_blocks_first_model_call() {
        let mut config = test_config();
        config.budget.max_time_seconds = 0;
        let provider = Arc::new(ScriptedProvider::new(vec![text_response(
            "{{final_message: never reached}}",
        )]));
        let orchestrator =
            OrchestrationLoop::new(provider.clone(), registry_with_search(), config);
        let outcome = orchestrator.run("Hello").await;

        assert_eq!(provider.call_count(), 0);
        assert_eq!(
            outcome.trace.termination_reason,
            TerminationReason::TimeLimit
        );
        assert_eq!(outcome.final_message, BUDGET_FALLBACK);
    }

    #[tokio::test]
    async fn consecutive_inconclusive_exhausts_to_parse_failure() {
        let provider = Arc::new(RepeatingProvider {
            response: text_response("just rambling with no directive at all"),
            calls: AtomicUsize::new(0),
        });
        let outcome = orchestrator(provider.clone()).run("Hello").await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            outcome.trace.termination_reason,
            TerminationReason::ParseFailure
        );
        assert_eq!(outcome.final_message, FATAL_APOLOGY);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_retry_then_abort_fatally() {
        let provider = Arc::new(HangingProvider {
            calls: AtomicUsize::new(0),
        });
        let outcome = orchestrator(provider.clone()).run("Hello").await;

        // Initial attempt + model_retry_limit retries.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            outcome.trace.termination_reason,
            TerminationReason::FatalError
        );
        assert_eq!(outcome.final_message, FATAL_APOLOGY);
        // Timed-out calls still consume iterations.
        assert_eq!(outcome.trace.iterations.len(), 3);
    }

    #[tokio::test]
    async fn single_iteration_replay_is_idempotent() {
        for _ in 0..2 {
            let provider = Arc::new(ScriptedProvider::new(vec![text_response(
                "{{final_message: Hi there!}}",
            )]));
            let outcome = orchestrator(provider).run("Hello").await;
            assert_eq!(outcome.trace.iterations.len(), 1);
            assert_eq!(outcome.trace.tool_call_count(), 0);
            assert_eq!(outcome.final_message, "Hi there!");
        }
    }

    #[tokio::test]
    async fn max_iterations_one_is_a_single_pass() {
        let mut config = test_config();
        config.budget.max_iterations = 1;
        let provider = Arc::new(RepeatingProvider {
            response: tool_response("c1", "search_recipes", json!({"query": "x"})),
            calls: AtomicUsize::new(0),
        });
        let orchestrator =
            OrchestrationLoop::new(provider.clone(), registry_with_search(), config);
        let outcome = orchestrator.run("One shot").await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            outcome.trace.termination_reason,
            TerminationReason::IterationLimit
        );
    }

    #[tokio::test]
    async fn cancellation_honored_before_first_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response(
            "{{final_message: never reached}}",
        )]));
        let orchestrator = orchestrator(provider.clone());
        orchestrator.cancellation_handle().notify_one();
        let outcome = orchestrator.run("Hello").await;

        assert_eq!(provider.call_count(), 0);
        assert_eq!(outcome.trace.iterations.len(), 0);
        assert_eq!(
            outcome.trace.termination_reason,
            TerminationReason::FatalError
        );
    }

    #[tokio::test]
    async fn trace_reaches_the_sink() {
        let sink = Arc::new(souschef_telemetry::CollectingSink::new());
        let provider = Arc::new(ScriptedProvider::new(vec![text_response(
            "{{final_message: Hi!}}",
        )]));
        let orchestrator = OrchestrationLoop::new(provider, registry_with_search(), test_config())
            .with_trace_sink(sink.clone());
        let outcome = orchestrator.run("Hello").await;

        let stored = sink.traces();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].conversation_id, outcome.trace.conversation_id);
    }

    #[tokio::test]
    async fn reasoning_never_reaches_final_message() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response(
            "First I will consider the options carefully.\n{{final_message: Pasta it is.}}",
        )]));
        let outcome = orchestrator(provider).run("Dinner?").await;

        assert_eq!(outcome.final_message, "Pasta it is.");
        assert!(!outcome.final_message.contains("consider the options"));
        // The raw output, reasoning included, is retained in the trace.
        assert!(outcome.trace.iterations[0]
            .raw_model_output
            .contains("consider the options"));
    }
}
