//! In-memory conversation store
//!
//! Maps conversation ids to append-only transcripts. Each conversation has
//! two locks: one guarding its turns (held only for the duration of a single
//! read or append) and an exchange lock that an orchestrated exchange holds
//! from the user append through the assistant append. Readers never wait on
//! an in-flight exchange; two exchanges on one id never interleave.

use super::types::{new_conversation_id, ConversationId, Turn};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

#[derive(Default)]
struct Conversation {
    turns: RwLock<Vec<Turn>>,
    exchange: Arc<Mutex<()>>,
}

/// Exclusive right to run one exchange on a conversation
///
/// Released on drop.
pub struct ExchangeGuard {
    conversation_id: ConversationId,
    _guard: OwnedMutexGuard<()>,
}

impl ExchangeGuard {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
}

/// Owner of every conversation transcript
#[derive(Default)]
pub struct ConversationStore {
    conversations: DashMap<ConversationId, Arc<Conversation>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the given id, or mint a new one when absent or empty.
    ///
    /// The conversation is created if it does not exist yet.
    pub fn resolve(&self, id: Option<&str>) -> ConversationId {
        let id = match id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => new_conversation_id(),
        };
        self.conversation(&id);
        id
    }

    /// Wait for and take the exchange lock of a conversation
    pub async fn begin_exchange(&self, id: &str) -> ExchangeGuard {
        let lock = self.conversation(id).exchange.clone();
        let guard = lock.lock_owned().await;
        tracing::trace!(conversation_id = %id, "Exchange started");
        ExchangeGuard {
            conversation_id: id.to_string(),
            _guard: guard,
        }
    }

    /// Append a turn, returning the new transcript length
    pub async fn append(&self, id: &str, turn: Turn) -> usize {
        let conversation = self.conversation(id);
        let mut turns = conversation.turns.write().await;
        turns.push(turn);
        turns.len()
    }

    /// Ordered transcript for an id; empty when the id is unknown
    pub async fn history(&self, id: &str) -> Vec<Turn> {
        let conversation = match self.conversations.get(id) {
            Some(entry) => entry.value().clone(),
            None => return Vec::new(),
        };
        let turns = conversation.turns.read().await;
        turns.clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.conversations.contains_key(id)
    }

    /// Number of conversations
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Drop every conversation
    pub fn reset(&self) {
        self.conversations.clear();
    }

    fn conversation(&self, id: &str) -> Arc<Conversation> {
        // The map guard is released before any await on the returned Arc.
        self.conversations
            .entry(id.to_string())
            .or_default()
            .value()
            .clone()
    }
}
