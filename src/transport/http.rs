//! HTTP server for the chat API

use super::ws;
use crate::agent::{NoDelivery, Orchestrator};
use crate::core::{new_conversation_id, ChatError, ConversationId, Turn};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state
pub(crate) struct AppState {
    pub(crate) orchestrator: Arc<Orchestrator>,
}

/// Inbound chat message, shared by the HTTP and WebSocket transports
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    message: Turn,
    conversation_id: ConversationId,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    messages: Vec<Turn>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    mcp_connected: bool,
}

/// Error response: 400 for validation failures, 500 for everything else
struct ApiError(ChatError);

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(ChatError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            ChatError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid request", "details": details })),
            )
                .into_response(),
            err => {
                tracing::error!(kind = err.kind(), "Chat endpoint error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error", "message": err.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

/// Build the API router
pub fn router(orchestrator: Arc<Orchestrator>, cors_origin: &str) -> Result<Router> {
    let state = Arc::new(AppState { orchestrator });

    let origin = if cors_origin.trim() == "*" {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origin: HeaderValue = cors_origin
            .parse()
            .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
        CorsLayer::new().allow_origin(origin)
    };
    let cors = origin
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .route("/api/health", get(health_check))
        .route("/api/chat", post(handle_chat))
        .route("/api/chat/history/:conversation_id", get(get_history))
        .route("/api/chat/welcome-message", post(welcome_message))
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Serve `app` on `listener` until `shutdown` resolves
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        mcp_connected: state.orchestrator.tools().is_connected().await,
    })
}

async fn handle_chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload?;
    let reply = state
        .orchestrator
        .handle(&req.message, req.conversation_id.as_deref(), &NoDelivery)
        .await?;

    Ok(Json(ChatResponse {
        message: reply.turn,
        conversation_id: reply.conversation_id,
    }))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        messages: state.orchestrator.store().history(&conversation_id).await,
    })
}

async fn welcome_message(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ChatResponse>, ApiError> {
    let tools = state.orchestrator.tools().list_tools().await?;
    let names = tools
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    Ok(Json(ChatResponse {
        message: Turn::assistant(format!(
            "Hello! I'm your AI assistant. You can use the following tools: [{}]",
            names
        )),
        conversation_id: new_conversation_id(),
    }))
}
