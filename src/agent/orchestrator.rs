//! Conversation/tool orchestration
//!
//! Drives one inbound utterance through the exchange:
//!
//! ```text
//! Received -> Stored(user) -> Detecting -> ToolPath | DirectPath
//!          -> Stored(assistant) -> Delivered
//! ```
//!
//! Both transports call [`Orchestrator::handle`]; they differ only in the
//! [`Delivery`] they pass. A gateway error aborts the exchange where it
//! happens: the user turn stays stored and no assistant turn is written.

use super::detector::ToolDetector;
use crate::config::DirectReplyPolicy;
use crate::core::{
    AssistantReply, ChatError, ConversationStore, ToolCallSummary, ToolInvocationRequest, Turn,
    TurnMetadata,
};
use crate::llm::{ModelGateway, ToolContext};
use crate::mcp::ToolGateway;
use std::sync::Arc;

/// Receives the events of one exchange as they happen
///
/// All methods default to doing nothing.
pub trait Delivery: Send + Sync {
    /// The user turn was appended
    fn user_stored(&self, _conversation_id: &str, _turn: &Turn) {}

    /// A tool is about to run
    fn tool_call(&self, _conversation_id: &str, _request: &ToolInvocationRequest) {}

    /// The assistant turn was appended
    fn assistant(&self, _reply: &AssistantReply) {}
}

/// Delivery for request/response callers that only need the return value
pub struct NoDelivery;

impl Delivery for NoDelivery {}

/// Coordinates detector, gateways and store
pub struct Orchestrator {
    store: Arc<ConversationStore>,
    tools: Arc<dyn ToolGateway>,
    model: Arc<dyn ModelGateway>,
    detector: Arc<dyn ToolDetector>,
    direct_reply: DirectReplyPolicy,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ConversationStore>,
        tools: Arc<dyn ToolGateway>,
        model: Arc<dyn ModelGateway>,
        detector: Arc<dyn ToolDetector>,
    ) -> Self {
        Self {
            store,
            tools,
            model,
            detector,
            direct_reply: DirectReplyPolicy::default(),
        }
    }

    pub fn with_direct_reply(mut self, policy: DirectReplyPolicy) -> Self {
        self.direct_reply = policy;
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn tools(&self) -> &Arc<dyn ToolGateway> {
        &self.tools
    }

    /// Run one exchange and return the stored assistant turn
    #[tracing::instrument(skip_all, fields(conversation_id = tracing::field::Empty))]
    pub async fn handle(
        &self,
        message: &str,
        conversation_id: Option<&str>,
        delivery: &dyn Delivery,
    ) -> Result<AssistantReply, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::Validation(
                "message must not be empty".to_string(),
            ));
        }

        let conversation_id = self.store.resolve(conversation_id);
        tracing::Span::current().record("conversation_id", conversation_id.as_str());
        let _exchange = self.store.begin_exchange(&conversation_id).await;

        let user_turn = Turn::user(message);
        self.store.append(&conversation_id, user_turn.clone()).await;
        delivery.user_stored(&conversation_id, &user_turn);

        let detected = self.detector.detect(message);
        tracing::debug!(tool = ?detected.as_ref().map(|r| &r.tool_name), "Detection done");

        let (text, metadata) = match detected {
            Some(request) => {
                delivery.tool_call(&conversation_id, &request);
                self.tool_path(&conversation_id, &request).await?
            }
            None => (self.direct_path(&conversation_id).await?, None),
        };

        let mut turn = Turn::assistant(text);
        if let Some(metadata) = metadata {
            turn = turn.with_metadata(metadata);
        }
        let len = self.store.append(&conversation_id, turn.clone()).await;
        tracing::debug!(turns = len, "Assistant turn stored");

        let reply = AssistantReply {
            conversation_id,
            turn,
        };
        delivery.assistant(&reply);
        Ok(reply)
    }

    async fn tool_path(
        &self,
        conversation_id: &str,
        request: &ToolInvocationRequest,
    ) -> Result<(String, Option<TurnMetadata>), ChatError> {
        let result = self.tools.invoke(request).await?;
        let metadata = TurnMetadata {
            tool_call: Some(ToolCallSummary::new(request, &result)),
        };

        let canned = self
            .tools
            .descriptor(&request.tool_name)
            .await
            .is_some_and(|d| d.supports_canned_reply);

        let text = if canned && !result.is_error {
            tracing::debug!(tool = %request.tool_name, "Using canned reply");
            self.model.generate_canned_reply(request, &result)
        } else {
            let transcript = self.store.history(conversation_id).await;
            tracing::debug!(provider = self.model.name(), "Generating tool reply");
            let context = ToolContext {
                request,
                result: &result,
            };
            self.model.generate(&transcript, Some(context)).await?
        };

        Ok((text, Some(metadata)))
    }

    async fn direct_path(&self, conversation_id: &str) -> Result<String, ChatError> {
        let transcript = self.store.history(conversation_id).await;

        if self.direct_reply == DirectReplyPolicy::Catalog {
            match self.tools.list_tools().await {
                Ok(catalog) if !catalog.is_empty() => {
                    tracing::debug!(
                        provider = self.model.name(),
                        tools = catalog.len(),
                        "Generating with tool catalog"
                    );
                    let text = self
                        .model
                        .generate_with_catalog(&transcript, &catalog)
                        .await?;
                    if !text.trim().is_empty() {
                        return Ok(text);
                    }
                    // A reply made only of tool requests has no text to store.
                    tracing::debug!("Catalog reply had no text, generating without tools");
                }
                Ok(_) => tracing::debug!("Empty tool catalog, generating without tools"),
                Err(e) => {
                    tracing::warn!("Tool catalog unavailable, generating without tools: {}", e)
                }
            }
        }

        tracing::debug!(provider = self.model.name(), "Generating reply");
        Ok(self.model.generate(&transcript, None).await?)
    }
}
