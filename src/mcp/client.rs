//! Tool gateway backed by a single MCP server over stdio (async).

use super::transport::StdioTransport;
use super::types::{normalize_tool_result, ConnectionStatus, McpToolDef, ServerCapabilities};
use super::ToolGateway;
use crate::config::McpConfig;
use crate::core::{ChatError, ToolDescriptor, ToolInvocationRequest, ToolInvocationResult};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Default)]
struct ConnectionState {
    status: ConnectionStatus,
    transport: Option<Arc<StdioTransport>>,
    tools: Vec<ToolDescriptor>,
    capabilities: ServerCapabilities,
}

impl ConnectionState {
    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            tracing::debug!("MCP status: {} -> {}", self.status.display(), status.display());
        }
        self.status = status;
    }
}

/// Connection to the sidecar tool server
pub struct McpGateway {
    config: McpConfig,
    state: RwLock<ConnectionState>,
}

impl McpGateway {
    pub fn new(config: McpConfig) -> Self {
        Self {
            config,
            state: RwLock::new(ConnectionState::default()),
        }
    }

    /// Current connection status
    pub async fn status(&self) -> ConnectionStatus {
        self.state.read().await.status.clone()
    }

    /// Spawn the server, run the MCP handshake and discover tools.
    ///
    /// A no-op when already connected.
    pub async fn connect(&self) -> Result<(), ChatError> {
        if self.state.read().await.status.is_connected() {
            return Ok(());
        }
        self.state.write().await.set_status(ConnectionStatus::Connecting);

        match self.establish().await {
            Ok((transport, capabilities, tools)) => {
                let mut state = self.state.write().await;
                tracing::info!(
                    "Connected to MCP server ({} tools: {})",
                    tools.len(),
                    tools
                        .iter()
                        .map(|t| t.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                state.transport = Some(transport);
                state.capabilities = capabilities;
                state.tools = tools;
                state.set_status(ConnectionStatus::Connected);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to connect to MCP server: {:#}", e);
                self.state
                    .write()
                    .await
                    .set_status(ConnectionStatus::Failed(e.to_string()));
                Err(ChatError::Unavailable(format!(
                    "Failed to connect to MCP server: {}",
                    e
                )))
            }
        }
    }

    async fn establish(
        &self,
    ) -> Result<(Arc<StdioTransport>, ServerCapabilities, Vec<ToolDescriptor>)> {
        let args = self.config.command_args();
        tracing::debug!("Spawning MCP server: {} {:?}", self.config.command, args);

        let transport = Arc::new(
            StdioTransport::spawn(
                &self.config.command,
                &args,
                &self.config.env,
                self.config.working_dir.as_deref(),
            )
            .await?,
        );

        let init = transport
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "clientInfo": {
                        "name": "mcp-chat",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                })),
            )
            .await?;
        transport.notify("notifications/initialized", None).await?;

        let capabilities: ServerCapabilities = init
            .get("capabilities")
            .cloned()
            .and_then(|c| serde_json::from_value(c).ok())
            .unwrap_or_default();

        let tools = if capabilities.tools.is_some() {
            self.fetch_tools(&transport).await?
        } else {
            tracing::warn!("MCP server does not advertise tools");
            Vec::new()
        };

        Ok((transport, capabilities, tools))
    }

    async fn fetch_tools(&self, transport: &StdioTransport) -> Result<Vec<ToolDescriptor>> {
        let result = transport.request("tools/list", None).await?;
        let defs: Vec<McpToolDef> = result
            .get("tools")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        Ok(defs
            .into_iter()
            .map(|def| {
                let canned = self.config.canned_reply_tools.contains(&def.name);
                def.into_descriptor(canned)
            })
            .collect())
    }

    /// Kill the server process. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        let mut state = self.state.write().await;
        if let Some(transport) = state.transport.take() {
            if let Err(e) = transport.kill().await {
                tracing::warn!("{:#}", e);
            }
            tracing::info!("Disconnected from MCP server");
        }
        state.set_status(ConnectionStatus::Disconnected);
        state.tools.clear();
    }

    async fn transport(&self) -> Result<Arc<StdioTransport>, ChatError> {
        let state = self.state.read().await;
        match (&state.status, &state.transport) {
            (ConnectionStatus::Connected, Some(transport)) => Ok(transport.clone()),
            _ => Err(ChatError::Unavailable(
                "MCP client not connected".to_string(),
            )),
        }
    }

    async fn call(
        &self,
        transport: &StdioTransport,
        request: &ToolInvocationRequest,
    ) -> Result<Value> {
        transport
            .request(
                "tools/call",
                Some(json!({
                    "name": request.tool_name,
                    "arguments": request.arguments
                })),
            )
            .await
    }
}

#[async_trait]
impl ToolGateway for McpGateway {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ChatError> {
        let transport = self.transport().await?;
        if self.state.read().await.capabilities.tools.is_none() {
            return Ok(Vec::new());
        }

        let timeout = Duration::from_secs(self.config.tool_timeout_secs);
        let tools = match tokio::time::timeout(timeout, self.fetch_tools(&transport)).await {
            Ok(Ok(tools)) => tools,
            Ok(Err(e)) => {
                tracing::error!("Failed to list MCP tools: {:#}", e);
                return Err(ChatError::Unavailable(format!(
                    "Failed to list tools: {}",
                    e
                )));
            }
            Err(_) => {
                return Err(ChatError::Unavailable(format!(
                    "Listing tools timed out after {}s",
                    self.config.tool_timeout_secs
                )));
            }
        };
        self.state.write().await.tools = tools.clone();
        Ok(tools)
    }

    async fn invoke(
        &self,
        request: &ToolInvocationRequest,
    ) -> Result<ToolInvocationResult, ChatError> {
        let transport = self.transport().await?;
        tracing::info!(
            tool = %request.tool_name,
            arguments = %request.arguments,
            "Calling MCP tool"
        );

        let timeout = Duration::from_secs(self.config.tool_timeout_secs);
        let result = match tokio::time::timeout(timeout, self.call(&transport, request)).await {
            Ok(Ok(raw)) => normalize_tool_result(raw),
            Ok(Err(e)) => {
                tracing::error!("Failed to call MCP tool {}: {:#}", request.tool_name, e);
                ToolInvocationResult::failure(e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    "MCP tool {} timed out after {}s",
                    request.tool_name,
                    self.config.tool_timeout_secs
                );
                ToolInvocationResult::failure(format!(
                    "Tool call timed out after {}s",
                    self.config.tool_timeout_secs
                ))
            }
        };

        tracing::info!(
            tool = %request.tool_name,
            is_error = result.is_error,
            "MCP tool response: {}",
            result.content
        );
        Ok(result)
    }

    async fn descriptor(&self, name: &str) -> Option<ToolDescriptor> {
        self.state
            .read()
            .await
            .tools
            .iter()
            .find(|t| t.name == name)
            .cloned()
    }

    async fn is_connected(&self) -> bool {
        let transport = match self.transport().await {
            Ok(transport) => transport,
            Err(_) => return false,
        };
        if transport.is_alive().await {
            return true;
        }
        let mut state = self.state.write().await;
        if state.status.is_connected() {
            tracing::warn!("MCP server process exited");
            state.set_status(ConnectionStatus::Failed("tool server exited".to_string()));
        }
        false
    }
}
