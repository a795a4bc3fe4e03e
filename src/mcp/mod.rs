//! MCP (Model Context Protocol) tool gateway.
//!
//! Connects to the sidecar tool server and exposes its tools to the
//! orchestrator through the [`ToolGateway`] trait.

pub mod client;
pub mod transport;
pub mod types;

pub use client::McpGateway;
pub use transport::StdioTransport;
pub use types::{normalize_tool_result, ConnectionStatus, McpToolDef, ServerCapabilities};

use crate::core::{ChatError, ToolDescriptor, ToolInvocationRequest, ToolInvocationResult};
use async_trait::async_trait;

/// Access to the external tool server
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Tools currently offered by the server
    ///
    /// Fails with [`ChatError::Unavailable`] when not connected.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ChatError>;

    /// Run a tool.
    ///
    /// A failed execution is `Ok` with `is_error` set; `Err` means the
    /// gateway has no connection.
    async fn invoke(
        &self,
        request: &ToolInvocationRequest,
    ) -> Result<ToolInvocationResult, ChatError>;

    /// Cached descriptor for a tool name
    async fn descriptor(&self, name: &str) -> Option<ToolDescriptor>;

    async fn is_connected(&self) -> bool;
}
