//! Tool-use detection
//!
//! Decides, without any model call, whether an utterance warrants a tool
//! call. The orchestrator only sees the [`ToolDetector`] trait, so a
//! model-assisted classifier can replace the rule table.

use crate::config::TriggerConfig;
use crate::core::ToolInvocationRequest;
use serde_json::Value;

/// Pure, synchronous tool-use decision
pub trait ToolDetector: Send + Sync {
    fn detect(&self, utterance: &str) -> Option<ToolInvocationRequest>;
}

/// A normalized phrase mapped to a fixed tool request
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRule {
    phrase: String,
    request: ToolInvocationRequest,
}

impl TriggerRule {
    pub fn new(phrase: &str, tool: &str, arguments: Value) -> Self {
        let arguments = if arguments.is_null() {
            Value::Object(Default::default())
        } else {
            arguments
        };
        Self {
            phrase: normalize(phrase),
            request: ToolInvocationRequest::new(tool, arguments),
        }
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }
}

impl From<&TriggerConfig> for TriggerRule {
    fn from(config: &TriggerConfig) -> Self {
        Self::new(&config.phrase, &config.tool, config.arguments.clone())
    }
}

/// Exact-match trigger table
#[derive(Debug, Clone, Default)]
pub struct TriggerDetector {
    rules: Vec<TriggerRule>,
}

impl TriggerDetector {
    pub fn new(rules: Vec<TriggerRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(triggers: &[TriggerConfig]) -> Self {
        Self::new(triggers.iter().map(TriggerRule::from).collect())
    }

    /// `"ping"` → `ping_pong {"message": "ping"}`
    pub fn ping_pong() -> Self {
        Self::new(vec![TriggerRule::new(
            "ping",
            "ping_pong",
            serde_json::json!({ "message": "ping" }),
        )])
    }

    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }
}

impl ToolDetector for TriggerDetector {
    fn detect(&self, utterance: &str) -> Option<ToolInvocationRequest> {
        let normalized = normalize(utterance);
        self.rules
            .iter()
            .find(|rule| rule.phrase == normalized)
            .map(|rule| rule.request.clone())
    }
}

/// Trim and case-fold
fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
