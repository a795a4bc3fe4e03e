//! MCP protocol types and result normalization.

use crate::core::{ToolDescriptor, ToolInvocationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of the tool server connection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Not connected
    #[default]
    Disconnected,
    /// Currently attempting to connect
    Connecting,
    /// Successfully connected
    Connected,
    /// Connection failed with error message
    Failed(String),
}

impl ConnectionStatus {
    /// Check if connected
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Get display string
    pub fn display(&self) -> &str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::Failed(_) => "Failed",
        }
    }
}

/// Tool definition as returned by `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema for input parameters
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Value,
}

impl McpToolDef {
    pub fn into_descriptor(self, supports_canned_reply: bool) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name,
            description: self.description,
            input_schema: self.input_schema,
            supports_canned_reply,
        }
    }
}

/// Server capabilities returned during initialization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub tools: Option<ToolsCapability>,
}

/// Tools capability details
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsCapability {
    /// Whether tool list can change
    #[serde(default, rename = "listChanged")]
    pub list_changed: bool,
}

/// Turn a raw `tools/call` result into the uniform result shape.
///
/// Tool servers answer with heterogeneous payloads. The first `text` item is
/// decoded as JSON when possible and kept as a plain string otherwise. A
/// content list without text items is passed through as-is, and a result
/// without a content list becomes the payload itself.
pub fn normalize_tool_result(result: Value) -> ToolInvocationResult {
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let content = match result.get("content").and_then(Value::as_array) {
        Some(items) => {
            let text = items.iter().find_map(|item| {
                (item.get("type").and_then(Value::as_str) == Some("text"))
                    .then(|| item.get("text").and_then(Value::as_str))
                    .flatten()
            });
            match text {
                Some(text) => serde_json::from_str(text)
                    .unwrap_or_else(|_| Value::String(text.to_string())),
                None => Value::Array(items.clone()),
            }
        }
        None => result,
    };

    ToolInvocationResult { content, is_error }
}
