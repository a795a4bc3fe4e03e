//! mcp-chat: chat server for a language-model assistant with MCP tools
//!
//! This library provides:
//! - A conversation store shared by every transport
//! - A tool gateway for a sidecar MCP server over stdio
//! - A model gateway for the Anthropic Messages API
//! - The orchestrator that drives detection, tool calls and generation
//! - HTTP and WebSocket transports over one orchestrator

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod mcp;
pub mod transport;

pub use agent::Orchestrator;
pub use config::Config;
pub use core::ConversationStore;
