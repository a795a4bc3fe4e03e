//! Domain error types
//!
//! Tool execution failures are not errors here: they travel as a
//! `ToolInvocationResult` with `is_error` set and become model context.

use crate::llm::LlmError;
use thiserror::Error;

/// Errors that abort one chat exchange
#[derive(Debug, Error)]
pub enum ChatError {
    /// Malformed inbound payload; user-correctable, never retried
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Tool server connection is absent
    #[error("Tool server unavailable: {0}")]
    Unavailable(String),

    /// The model provider call failed
    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),
}

impl ChatError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Short machine-readable kind for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unavailable(_) => "unavailable",
            Self::Generation(_) => "generation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_wraps_llm_error() {
        let err: ChatError = LlmError::RateLimited("slow down".to_string()).into();
        assert_eq!(err.kind(), "generation");
        assert_eq!(err.to_string(), "Generation failed: Anthropic rate limit reached: slow down");
        assert!(!err.is_validation());
    }

    #[test]
    fn test_validation_display() {
        let err = ChatError::Validation("message must not be empty".to_string());
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Invalid request: message must not be empty"
        );
    }
}
