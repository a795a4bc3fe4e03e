//! Scripted gateway doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use mcp_chat::agent::{Delivery, Orchestrator, TriggerDetector};
use mcp_chat::config::DirectReplyPolicy;
use mcp_chat::core::{
    AssistantReply, ChatError, ConversationStore, Role, ToolDescriptor, ToolInvocationRequest,
    ToolInvocationResult, Turn,
};
use mcp_chat::llm::{LlmError, ModelGateway, ToolContext};
use mcp_chat::mcp::ToolGateway;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn descriptor(name: &str, canned: bool) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: format!("{name} tool"),
        input_schema: json!({"type": "object", "properties": {}}),
        supports_canned_reply: canned,
    }
}

/// Tool gateway with fixed descriptors and per-tool results
pub struct ScriptedTools {
    connected: AtomicBool,
    tools: Vec<ToolDescriptor>,
    results: Mutex<HashMap<String, ToolInvocationResult>>,
    pub invocations: Mutex<Vec<ToolInvocationRequest>>,
    pub list_calls: AtomicUsize,
}

impl ScriptedTools {
    /// `ping_pong` (canned) answering `{"response": "pong"}`
    pub fn ping_pong() -> Self {
        Self::new(vec![descriptor("ping_pong", true)]).with_result(
            "ping_pong",
            ToolInvocationResult::success(json!({"response": "pong"})),
        )
    }

    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            connected: AtomicBool::new(true),
            tools,
            results: Mutex::new(HashMap::new()),
            invocations: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_result(self, tool: &str, result: ToolInvocationResult) -> Self {
        self.results
            .lock()
            .unwrap()
            .insert(tool.to_string(), result);
        self
    }

    pub fn disconnected(self) -> Self {
        self.connected.store(false, Ordering::SeqCst);
        self
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), ChatError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ChatError::Unavailable("MCP client not connected".to_string()))
        }
    }
}

#[async_trait]
impl ToolGateway for ScriptedTools {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ChatError> {
        self.check()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tools.clone())
    }

    async fn invoke(
        &self,
        request: &ToolInvocationRequest,
    ) -> Result<ToolInvocationResult, ChatError> {
        self.check()?;
        self.invocations.lock().unwrap().push(request.clone());
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(&request.tool_name)
            .cloned()
            .unwrap_or_else(|| ToolInvocationResult::failure("unknown tool")))
    }

    async fn descriptor(&self, name: &str) -> Option<ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name).cloned()
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// One recorded model call
#[derive(Debug, Clone)]
pub enum ModelCall {
    Generate {
        transcript: Vec<Turn>,
        tool: Option<(ToolInvocationRequest, ToolInvocationResult)>,
    },
    Catalog {
        transcript: Vec<Turn>,
        tools: Vec<String>,
    },
}

/// Model gateway that answers `echo: <last user message>`
#[derive(Default)]
pub struct ScriptedModel {
    fail: AtomicBool,
    delay: Option<Duration>,
    /// Catalog calls answer with no text, as a tool_use-only reply does
    blank_catalog_reply: bool,
    pub calls: Mutex<Vec<ModelCall>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let model = Self::default();
        model.fail.store(true, Ordering::SeqCst);
        model
    }

    pub fn with_blank_catalog_reply(mut self) -> Self {
        self.blank_catalog_reply = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().unwrap().clone()
    }

    async fn reply(&self, transcript: &[Turn]) -> Result<String, LlmError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(LlmError::ServiceError {
                status: 500,
                message: "provider down".to_string(),
            });
        }
        let last_user = transcript
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.clone())
            .unwrap_or_default();
        Ok(format!("echo: {last_user}"))
    }
}

#[async_trait]
impl ModelGateway for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        transcript: &[Turn],
        tool_context: Option<ToolContext<'_>>,
    ) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(ModelCall::Generate {
            transcript: transcript.to_vec(),
            tool: tool_context.map(|c| (c.request.clone(), c.result.clone())),
        });
        self.reply(transcript).await
    }

    async fn generate_with_catalog(
        &self,
        transcript: &[Turn],
        catalog: &[ToolDescriptor],
    ) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(ModelCall::Catalog {
            transcript: transcript.to_vec(),
            tools: catalog.iter().map(|t| t.name.clone()).collect(),
        });
        let reply = self.reply(transcript).await?;
        Ok(if self.blank_catalog_reply {
            String::new()
        } else {
            reply
        })
    }
}

/// Delivery that records events as `kind:detail` strings
#[derive(Default)]
pub struct RecordingDelivery {
    pub events: Mutex<Vec<String>>,
}

impl RecordingDelivery {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Delivery for RecordingDelivery {
    fn user_stored(&self, _conversation_id: &str, turn: &Turn) {
        self.events
            .lock()
            .unwrap()
            .push(format!("user:{}", turn.content));
    }

    fn tool_call(&self, _conversation_id: &str, request: &ToolInvocationRequest) {
        self.events
            .lock()
            .unwrap()
            .push(format!("tool:{}", request.tool_name));
    }

    fn assistant(&self, reply: &AssistantReply) {
        self.events
            .lock()
            .unwrap()
            .push(format!("assistant:{}", reply.turn.content));
    }
}

pub fn orchestrator(
    tools: Arc<ScriptedTools>,
    model: Arc<ScriptedModel>,
    policy: DirectReplyPolicy,
) -> Orchestrator {
    Orchestrator::new(
        Arc::new(ConversationStore::new()),
        tools,
        model,
        Arc::new(TriggerDetector::ping_pong()),
    )
    .with_direct_reply(policy)
}

/// Serve the API on an ephemeral port and return its base URL
pub async fn spawn_server(orchestrator: Orchestrator, cors_origin: &str) -> String {
    let app = mcp_chat::transport::router(Arc::new(orchestrator), cors_origin).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mcp_chat::transport::serve(
        listener,
        app,
        std::future::pending(),
    ));
    format!("http://{addr}")
}
