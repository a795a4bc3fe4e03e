//! WebSocket duplex session
//!
//! Inbound frames: `{"type": "chat:message", "data": {message, conversationId?}}`.
//! Outbound frames: `message` (user echo, then the assistant turn),
//! `tool_call` before a tool runs, and `error` when an exchange fails.

use super::http::{AppState, ChatRequest};
use crate::agent::{Delivery, Orchestrator};
use crate::core::{AssistantReply, ConversationId, ToolInvocationRequest, Turn};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Events a client sends
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "chat:message")]
    ChatMessage(ChatRequest),
}

/// Events sent to the client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Message(MessageEvent),
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_name: String,
        arguments: Value,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    #[serde(flatten)]
    pub turn: Turn,
    pub conversation_id: ConversationId,
}

/// Forwards exchange events to a session's outbound queue
pub struct ChannelDelivery {
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ChannelDelivery {
    pub fn new(tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: ServerEvent) {
        // The receiver only goes away once the socket is closed.
        if self.tx.send(event).is_err() {
            tracing::debug!("Client gone, dropping event");
        }
    }
}

impl Delivery for ChannelDelivery {
    fn user_stored(&self, conversation_id: &str, turn: &Turn) {
        self.send(ServerEvent::Message(MessageEvent {
            turn: turn.clone(),
            conversation_id: conversation_id.to_string(),
        }));
    }

    fn tool_call(&self, _conversation_id: &str, request: &ToolInvocationRequest) {
        self.send(ServerEvent::ToolCall {
            tool_name: request.tool_name.clone(),
            arguments: request.arguments.clone(),
        });
    }

    fn assistant(&self, reply: &AssistantReply) {
        self.send(ServerEvent::Message(MessageEvent {
            turn: reply.turn.clone(),
            conversation_id: reply.conversation_id.clone(),
        }));
    }
}

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let orchestrator = state.orchestrator.clone();
    ws.on_upgrade(move |socket| run_session(socket, orchestrator))
}

async fn run_session(socket: WebSocket, orchestrator: Arc<Orchestrator>) {
    let session_id = uuid::Uuid::new_v4();
    tracing::info!(%session_id, "Client connected");

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to encode event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let delivery = ChannelDelivery::new(tx);
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => process_frame(&orchestrator, &text, &delivery).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(%session_id, "WebSocket read error: {}", e);
                break;
            }
        }
    }

    drop(delivery);
    let _ = writer.await;
    tracing::info!(%session_id, "Client disconnected");
}

/// Handle one inbound text frame, reporting any failure as an error event
pub async fn process_frame(orchestrator: &Orchestrator, text: &str, delivery: &ChannelDelivery) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Invalid WebSocket frame: {}", e);
            delivery.send(ServerEvent::Error {
                message: format!("Invalid message: {}", e),
            });
            return;
        }
    };

    let ClientEvent::ChatMessage(req) = event;
    if let Err(e) = orchestrator
        .handle(&req.message, req.conversation_id.as_deref(), delivery)
        .await
    {
        tracing::error!(kind = e.kind(), "WebSocket message error: {}", e);
        delivery.send(ServerEvent::Error {
            message: e.to_string(),
        });
    }
}
