//! Typed errors for Anthropic Messages API calls
//!
//! The gateway is single-shot; these variants let a caller decide whether a
//! retry makes sense without string matching.

use serde::Deserialize;
use thiserror::Error;

/// HTTP status Anthropic uses when the API is temporarily overloaded
const OVERLOADED: u16 = 529;

/// Model provider failures
#[derive(Debug, Error)]
pub enum LlmError {
    /// The API key was rejected (HTTP 401/403)
    #[error("Anthropic rejected the API key: {0}")]
    Unauthorized(String),

    #[error("Anthropic rate limit reached: {0}")]
    RateLimited(String),

    /// The request itself is invalid (HTTP 400, e.g. empty message content)
    #[error("Anthropic rejected the request: {0}")]
    BadRequest(String),

    #[error("Anthropic API is overloaded: {0}")]
    Overloaded(String),

    /// Any other 5xx
    #[error("Anthropic API error (HTTP {status}): {message}")]
    ServiceError { status: u16, message: String },

    #[error("Could not reach the Anthropic API: {0}")]
    Network(String),

    /// Unexpected status or an undecodable response body
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// `{"type": "error", "error": {"type": ..., "message": ...}}`
#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

impl LlmError {
    /// Whether a later identical call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Overloaded(_) | Self::ServiceError { .. } | Self::Network(_)
        )
    }

    /// Classify a non-success response from the Messages endpoint.
    ///
    /// Anthropic's JSON error envelope is unwrapped to `type: message`;
    /// any other body is kept as-is.
    pub fn from_http_status(status: reqwest::StatusCode, body: String) -> Self {
        let message = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => format!("{}: {}", parsed.error.kind, parsed.error.message),
            Err(_) => body,
        };

        match status.as_u16() {
            401 | 403 => Self::Unauthorized(message),
            429 => Self::RateLimited(message),
            400 => Self::BadRequest(message),
            OVERLOADED => Self::Overloaded(message),
            code @ 500..=599 => Self::ServiceError {
                status: code,
                message,
            },
            _ => Self::Other(anyhow::anyhow!("Unexpected HTTP {}: {}", status, message)),
        }
    }

    /// Classify a transport-level reqwest failure
    pub fn from_network_error(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::from_http_status(status, e.to_string());
        }
        if e.is_timeout() {
            Self::Network(format!("request timed out ({})", e))
        } else if e.is_connect() || e.is_request() {
            Self::Network(e.to_string())
        } else {
            Self::Other(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_classification() {
        let cases = [
            (401, "unauthorized"),
            (403, "unauthorized"),
            (429, "rate_limited"),
            (400, "bad_request"),
            (529, "overloaded"),
            (503, "service"),
            (404, "other"),
        ];
        for (code, expected) in cases {
            let status = StatusCode::from_u16(code).unwrap();
            let kind = match LlmError::from_http_status(status, String::new()) {
                LlmError::Unauthorized(_) => "unauthorized",
                LlmError::RateLimited(_) => "rate_limited",
                LlmError::BadRequest(_) => "bad_request",
                LlmError::Overloaded(_) => "overloaded",
                LlmError::ServiceError { status, .. } => {
                    assert_eq!(status, code);
                    "service"
                }
                LlmError::Network(_) | LlmError::Other(_) => "other",
            };
            assert_eq!(kind, expected, "HTTP {code}");
        }
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(LlmError::Overloaded(String::new()).is_retryable());
        assert!(LlmError::RateLimited(String::new()).is_retryable());
        assert!(!LlmError::Unauthorized(String::new()).is_retryable());
        assert!(!LlmError::BadRequest(String::new()).is_retryable());
    }

    #[test]
    fn test_anthropic_error_envelope_is_unwrapped() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let err = LlmError::from_http_status(StatusCode::from_u16(529).unwrap(), body.to_string());
        assert_eq!(
            err.to_string(),
            "Anthropic API is overloaded: overloaded_error: Overloaded"
        );

        let err = LlmError::from_http_status(StatusCode::BAD_GATEWAY, "upstream down".to_string());
        assert_eq!(
            err.to_string(),
            "Anthropic API error (HTTP 502): upstream down"
        );
    }
}
