//! Transport layer: HTTP request/response and WebSocket sessions

pub mod http;
pub mod ws;

pub use http::{router, serve, ChatRequest};
pub use ws::{ChannelDelivery, ClientEvent, ServerEvent};
