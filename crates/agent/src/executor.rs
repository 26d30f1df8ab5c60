//! Tool dispatch with in-band failure normalization.
//!
//! The executor never surfaces an error to the loop: unknown tools,
//! argument validation failures, and handler faults all come back as
//! failed [`ToolResult`]s so the model can observe and recover from them.

use futures::future::join_all;
use serde_json::Value;
use souschef_core::{ToolCall, ToolErrorKind, ToolRegistry, ToolResult};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    max_payload_bytes: usize,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, max_payload_bytes: usize) -> Self {
        Self {
            registry,
            max_payload_bytes,
        }
    }

    /// Execute one call. Always returns a result, never an error.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let entry = match self.registry.get(&call.name) {
            Ok(entry) => entry,
            Err(_) => {
                warn!(tool = %call.name, "unknown tool requested");
                return ToolResult::failed(
                    &call.id,
                    ToolErrorKind::UnknownTool,
                    format!("no tool named '{}' is registered", call.name),
                );
            }
        };

        if let Err(message) = validate_arguments(&entry.definition.parameters, &call.arguments) {
            debug!(tool = %call.name, %message, "argument validation failed");
            return ToolResult::failed(&call.id, ToolErrorKind::ValidationError, message);
        }

        // Run the handler in its own task so a panic unwinds into a
        // JoinError instead of tearing down the conversation.
        let handler = Arc::clone(&entry.handler);
        let arguments = call.arguments.clone();
        match tokio::spawn(async move { handler.call(arguments).await }).await {
            Ok(Ok(payload)) => self.truncate(ToolResult::ok(&call.id, payload)),
            Ok(Err(e)) => {
                warn!(tool = %call.name, error = %e, "tool handler failed");
                ToolResult::failed(&call.id, ToolErrorKind::ExecutionError, e.to_string())
            }
            Err(join_error) => {
                warn!(tool = %call.name, error = %join_error, "tool handler aborted");
                let message = if join_error.is_panic() {
                    format!("tool '{}' panicked during execution", call.name)
                } else {
                    format!("tool '{}' was cancelled during execution", call.name)
                };
                ToolResult::failed(&call.id, ToolErrorKind::ExecutionError, message)
            }
        }
    }

    /// Fan out all calls concurrently; results come back in call order
    /// regardless of completion order.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        join_all(calls.iter().map(|call| self.execute(call))).await
    }

    /// Clip oversized payloads at a char boundary and flag the result.
    fn truncate(&self, mut result: ToolResult) -> ToolResult {
        let Some(payload) = &result.payload else {
            return result;
        };
        let serialized = payload.to_string();
        if serialized.len() <= self.max_payload_bytes {
            return result;
        }

        let mut cut = self.max_payload_bytes;
        while !serialized.is_char_boundary(cut) {
            cut -= 1;
        }
        debug!(
            original_bytes = serialized.len(),
            kept_bytes = cut,
            "truncating tool payload"
        );
        result.payload = Some(Value::String(serialized[..cut].to_string()));
        result.truncated = true;
        result
    }
}

/// Check `arguments` against an object schema: required fields must be
/// present, provided fields must match their declared JSON type, and enum
/// constraints must hold. Properties the schema does not declare pass
/// through untouched.
fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), String> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    let empty = serde_json::Map::new();
    let args = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(format!(
                "arguments must be a JSON object, got {}",
                type_name(other)
            ));
        }
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !args.contains_key(field) {
                return Err(format!("missing required field '{field}'"));
            }
        }
    }

    for (name, value) in args {
        let Some(prop) = properties.get(name) else {
            continue;
        };

        if let Some(expected) = prop.get("type").and_then(Value::as_str) {
            if !type_matches(expected, value) {
                return Err(format!(
                    "field '{name}' must be {expected}, got {}",
                    type_name(value)
                ));
            }
        }

        if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(format!("field '{name}' must be one of {allowed:?}"));
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use souschef_core::{ToolCategory, ToolDefinition, ToolError, ToolHandler};
    use std::time::Duration;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
            Ok(json!({"echo": arguments}))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl ToolHandler for FailingHandler {
        async fn call(&self, _arguments: Value) -> Result<Value, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "broken".into(),
                reason: "backend unavailable".into(),
            })
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl ToolHandler for PanickingHandler {
        async fn call(&self, _arguments: Value) -> Result<Value, ToolError> {
            panic!("handler blew up");
        }
    }

    /// Sleeps for the given millis then echoes its index, so the test can
    /// force out-of-order completion.
    struct SlowHandler {
        delay_ms: u64,
        index: usize,
    }

    #[async_trait]
    impl ToolHandler for SlowHandler {
        async fn call(&self, _arguments: Value) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            Ok(json!({"index": self.index}))
        }
    }

    struct BigPayloadHandler;

    #[async_trait]
    impl ToolHandler for BigPayloadHandler {
        async fn call(&self, _arguments: Value) -> Result<Value, ToolError> {
            Ok(json!({"blob": "x".repeat(20_000)}))
        }
    }

    fn definition(name: &str, parameters: Value) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: format!("test tool {name}"),
            parameters,
        }
    }

    fn echo_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "limit": {"type": "integer"},
                "meal_type": {"type": "string", "enum": ["breakfast", "lunch", "dinner"]}
            },
            "required": ["query"]
        })
    }

    fn executor_with(entries: Vec<(ToolDefinition, Arc<dyn ToolHandler>)>) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        for (def, handler) in entries {
            registry
                .register(def, ToolCategory::RecipeSearch, handler)
                .unwrap();
        }
        ToolExecutor::new(Arc::new(registry), 8192)
    }

    fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    #[tokio::test]
    async fn successful_execution() {
        let executor = executor_with(vec![(
            definition("echo", echo_schema()),
            Arc::new(EchoHandler),
        )]);
        let result = executor
            .execute(&call("c1", "echo", json!({"query": "pasta"})))
            .await;

        assert!(result.success);
        assert_eq!(result.call_id, "c1");
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn unknown_tool_is_in_band_failure() {
        let executor = executor_with(vec![]);
        let result = executor.execute(&call("c1", "nope", json!({}))).await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ToolErrorKind::UnknownTool));
    }

    #[tokio::test]
    async fn missing_required_field_fails_validation() {
        let executor = executor_with(vec![(
            definition("echo", echo_schema()),
            Arc::new(EchoHandler),
        )]);
        let result = executor.execute(&call("c1", "echo", json!({}))).await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ToolErrorKind::ValidationError));
        assert!(result.error_message.unwrap().contains("query"));
    }

    #[tokio::test]
    async fn wrong_type_fails_validation() {
        let executor = executor_with(vec![(
            definition("echo", echo_schema()),
            Arc::new(EchoHandler),
        )]);
        let result = executor
            .execute(&call("c1", "echo", json!({"query": "ok", "limit": "five"})))
            .await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ToolErrorKind::ValidationError));
    }

    #[tokio::test]
    async fn enum_violation_fails_validation() {
        let executor = executor_with(vec![(
            definition("echo", echo_schema()),
            Arc::new(EchoHandler),
        )]);
        let result = executor
            .execute(&call(
                "c1",
                "echo",
                json!({"query": "ok", "meal_type": "brunch"}),
            ))
            .await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ToolErrorKind::ValidationError));
    }

    #[tokio::test]
    async fn handler_fault_is_in_band_failure() {
        let executor = executor_with(vec![(
            definition("broken", json!({"type": "object", "properties": {}})),
            Arc::new(FailingHandler),
        )]);
        let result = executor.execute(&call("c1", "broken", json!({}))).await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ToolErrorKind::ExecutionError));
        assert!(result.error_message.unwrap().contains("backend unavailable"));
    }

    #[tokio::test]
    async fn handler_panic_is_in_band_failure() {
        let executor = executor_with(vec![(
            definition("explosive", json!({"type": "object", "properties": {}})),
            Arc::new(PanickingHandler),
        )]);
        let result = executor.execute(&call("c1", "explosive", json!({}))).await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ToolErrorKind::ExecutionError));
        assert!(result.error_message.unwrap().contains("panicked"));
    }

    #[tokio::test]
    async fn oversized_payload_is_truncated() {
        let executor = executor_with(vec![(
            definition("big", json!({"type": "object", "properties": {}})),
            Arc::new(BigPayloadHandler),
        )]);
        let result = executor.execute(&call("c1", "big", json!({}))).await;

        assert!(result.success);
        assert!(result.truncated);
        let payload = result.payload.unwrap();
        assert!(payload.as_str().unwrap().len() <= 8192);
    }

    #[tokio::test]
    async fn results_preserve_call_order_under_out_of_order_completion() {
        let mut registry = ToolRegistry::new();
        for (i, delay) in [80u64, 10, 40].iter().enumerate() {
            registry
                .register(
                    definition(&format!("slow_{i}"), json!({"type": "object", "properties": {}})),
                    ToolCategory::RecipeSearch,
                    Arc::new(SlowHandler {
                        delay_ms: *delay,
                        index: i,
                    }),
                )
                .unwrap();
        }
        let executor = ToolExecutor::new(Arc::new(registry), 8192);

        let calls: Vec<ToolCall> = (0..3)
            .map(|i| call(&format!("c{i}"), &format!("slow_{i}"), json!({})))
            .collect();
        let results = executor.execute_all(&calls).await;

        assert_eq!(results.len(), 3);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.call_id, format!("c{i}"));
            assert_eq!(result.payload.as_ref().unwrap()["index"], i);
        }
    }
}
