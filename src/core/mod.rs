//! Core domain modules
//!
//! Conversation types, the conversation store and the domain error taxonomy
//! shared by the gateways, the orchestrator and the transports.

pub mod errors;
pub mod store;
pub mod types;

pub use errors::ChatError;
pub use store::{ConversationStore, ExchangeGuard};
pub use types::*;
