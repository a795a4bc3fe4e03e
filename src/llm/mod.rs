//! Model gateway: language-model calls for the orchestrator

mod claude;
mod error;

pub use claude::ClaudeProvider;
pub use error::LlmError;

use crate::core::{ToolDescriptor, ToolInvocationRequest, ToolInvocationResult, Turn};
use async_trait::async_trait;
use serde_json::Value;

/// A tool call that just happened, folded into the next generation
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
    pub request: &'a ToolInvocationRequest,
    pub result: &'a ToolInvocationResult,
}

/// Trait for language-model providers
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Produce assistant text for a transcript, grounded on an optional
    /// tool outcome. Single shot; no retry.
    async fn generate(
        &self,
        transcript: &[Turn],
        tool_context: Option<ToolContext<'_>>,
    ) -> Result<String, LlmError>;

    /// Produce assistant text while offering the tool catalog through the
    /// provider's native tool calling.
    async fn generate_with_catalog(
        &self,
        transcript: &[Turn],
        catalog: &[ToolDescriptor],
    ) -> Result<String, LlmError>;

    /// Templated reply that needs no provider call
    fn generate_canned_reply(
        &self,
        request: &ToolInvocationRequest,
        result: &ToolInvocationResult,
    ) -> String {
        canned_reply(request, result)
    }
}

/// Deterministic sentence describing a tool outcome
pub fn canned_reply(request: &ToolInvocationRequest, result: &ToolInvocationResult) -> String {
    if result.is_error {
        return format!(
            "Error calling tool {}: {}",
            request.tool_name, result.content
        );
    }

    match result.content.get("response").and_then(Value::as_str) {
        Some("pong") => "🏓 Pong! The MCP server responded successfully to your ping.".to_string(),
        Some(response) => response.to_string(),
        None => format!("Tool {} returned: {}", request.tool_name, result.content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ping() -> ToolInvocationRequest {
        ToolInvocationRequest::new("ping_pong", json!({"message": "ping"}))
    }

    #[test]
    fn test_pong_reply() {
        let result = ToolInvocationResult::success(json!({"response": "pong"}));
        assert_eq!(
            canned_reply(&ping(), &result),
            "🏓 Pong! The MCP server responded successfully to your ping."
        );
    }

    #[test]
    fn test_other_response_is_echoed() {
        let result = ToolInvocationResult::success(json!({"response": "pong pong"}));
        assert_eq!(canned_reply(&ping(), &result), "pong pong");
    }

    #[test]
    fn test_untyped_result_is_summarized() {
        let result = ToolInvocationResult::success(json!("plain"));
        assert_eq!(
            canned_reply(&ping(), &result),
            "Tool ping_pong returned: \"plain\""
        );
    }

    #[test]
    fn test_error_result() {
        let result = ToolInvocationResult::failure("down");
        assert_eq!(
            canned_reply(&ping(), &result),
            "Error calling tool ping_pong: {\"error\":\"down\"}"
        );
    }
}
