//! Claude (Anthropic) model gateway
//!
//! SECURITY: the API key is only sent to the configured Messages endpoint,
//! which defaults to the official Anthropic API.

use super::{LlmError, ModelGateway, ToolContext};
use crate::config::LlmConfig;
use crate::core::{Role, ToolDescriptor, Turn};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

const BASE_SYSTEM_PROMPT: &str = "You are a helpful AI assistant integrated with an MCP (Model Context Protocol) server.
You can help users interact with MCP tools and provide informative responses.";

pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: usize,
}

impl ClaudeProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let defaults = LlmConfig::default();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            api_url: defaults.api_url,
            model: defaults.model,
            max_tokens: defaults.max_tokens,
        }
    }

    pub fn from_config(config: &LlmConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("ANTHROPIC_API_KEY environment variable not set")?;
        Ok(Self::new(api_key)
            .with_model(&config.model)
            .with_max_tokens(config.max_tokens)
            .with_api_url(&config.api_url))
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }

    fn build_request(
        &self,
        transcript: &[Turn],
        tool_context: Option<ToolContext<'_>>,
        catalog: Option<&[ToolDescriptor]>,
    ) -> ClaudeRequest {
        let (transcript_system, mut messages) = convert_transcript(transcript);

        if let Some(ctx) = tool_context {
            if let Some(last) = messages.last_mut().filter(|m| m.role == "user") {
                last.content.push_str(&tool_outcome_note(ctx));
            }
        }

        // The catalog path keeps the plain preamble; tool guidance is only
        // added after a tool actually ran.
        let mut system = match catalog {
            Some(_) => BASE_SYSTEM_PROMPT.to_string(),
            None => system_prompt(tool_context),
        };
        if let Some(extra) = transcript_system {
            system.push_str("\n\n");
            system.push_str(&extra);
        }

        let tools = catalog.filter(|c| !c.is_empty()).map(|c| {
            c.iter()
                .map(|t| ClaudeTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: if t.input_schema.is_null() {
                        serde_json::json!({ "type": "object", "properties": {} })
                    } else {
                        t.input_schema.clone()
                    },
                })
                .collect()
        });

        ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(system),
            messages,
            tools,
        }
    }

    async fn send_request(&self, request: ClaudeRequest) -> Result<String, LlmError> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "Sending Anthropic request"
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(LlmError::from_network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Anthropic API error ({}): {}", status, error_text);
            return Err(LlmError::from_http_status(status, error_text));
        }

        let response = response
            .json::<ClaudeResponse>()
            .await
            .context("Failed to parse Anthropic API response")?;

        Ok(extract_text(response))
    }
}

#[async_trait]
impl ModelGateway for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
    }

    async fn generate(
        &self,
        transcript: &[Turn],
        tool_context: Option<ToolContext<'_>>,
    ) -> Result<String, LlmError> {
        let request = self.build_request(transcript, tool_context, None);
        self.send_request(request).await
    }

    async fn generate_with_catalog(
        &self,
        transcript: &[Turn],
        catalog: &[ToolDescriptor],
    ) -> Result<String, LlmError> {
        let request = self.build_request(transcript, None, Some(catalog));
        self.send_request(request).await
    }
}

/// Split system turns out of the transcript, drop empty turns and merge
/// consecutive turns of the same role, which the Messages API rejects.
fn convert_transcript(transcript: &[Turn]) -> (Option<String>, Vec<ClaudeMessage>) {
    let mut system_parts = Vec::new();
    let mut messages: Vec<ClaudeMessage> = Vec::new();

    for turn in transcript {
        // The Messages API rejects empty content blocks.
        if turn.content.trim().is_empty() {
            continue;
        }
        if turn.role == Role::System {
            system_parts.push(turn.content.clone());
            continue;
        }
        let role = turn.role.as_str();

        if messages.is_empty() && role == "assistant" {
            continue;
        }
        match messages.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(&turn.content);
            }
            _ => messages.push(ClaudeMessage {
                role: role.to_string(),
                content: turn.content.clone(),
            }),
        }
    }

    let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
    (system, messages)
}

fn system_prompt(tool_context: Option<ToolContext<'_>>) -> String {
    let mut prompt = BASE_SYSTEM_PROMPT.to_string();
    if let Some(ctx) = tool_context {
        prompt.push_str(&format!(
            "\n\nYou just used the MCP tool \"{}\" and received a result.
Please provide a natural, conversational response based on this tool result.
Don't just repeat the raw result - interpret it and respond naturally.",
            ctx.request.tool_name
        ));
        if ctx.result.is_error {
            prompt.push_str(
                "\n\nThe tool reported an error. Explain to the user what went wrong in plain terms.",
            );
        }
    }
    prompt
}

fn tool_outcome_note(ctx: ToolContext<'_>) -> String {
    format!(
        "\nTool Call: {}\nArguments: {}\nResult: {}",
        ctx.request.tool_name, ctx.request.arguments, ctx.result.content
    )
}

fn extract_text(response: ClaudeResponse) -> String {
    let mut text_parts = Vec::new();
    for block in response.content {
        match block {
            ClaudeContentBlock::Text { text } => text_parts.push(text),
            ClaudeContentBlock::ToolUse { name, .. } => {
                tracing::debug!("Ignoring tool_use block for {}", name);
            }
            ClaudeContentBlock::Unknown => {}
        }
    }
    if let Some(reason) = response.stop_reason {
        tracing::debug!("Anthropic stop reason: {}", reason);
    }
    text_parts.join("\n")
}

// Claude API request/response types

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClaudeContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[allow(dead_code)]
        id: String,
        name: String,
        #[allow(dead_code)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
    stop_reason: Option<String>,
}
