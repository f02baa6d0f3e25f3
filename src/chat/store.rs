use anyhow::{Error, Result};

use super::models::Conversation;
use super::state::ChatState;
use crate::storage::{BoxedKvStore, KvStore, MemoryKv};

pub const CONVERSATIONS_KEY: &str = "conversations";
pub const ACTIVE_ID_KEY: &str = "activeConversationId";

/// Durable home of the conversation set and the active id, stored as
/// two named entries.
pub struct ConversationStore {
    kv: BoxedKvStore,
}

impl ConversationStore {
    pub fn new(kv: BoxedKvStore) -> Self {
        Self { kv }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryKv::new()))
    }

    /// Reads the saved state. An unreadable conversation blob is
    /// logged and treated as empty so the app can still start.
    pub fn load(&self) -> Result<ChatState, Error> {
        let conversations = match self.kv.get(CONVERSATIONS_KEY)? {
            Some(blob) => serde_json::from_str::<Vec<Conversation>>(&blob).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable conversation list: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        let active_id = self.kv.get(ACTIVE_ID_KEY)?;
        Ok(ChatState::load(conversations, active_id.as_deref()))
    }

    /// Overwrites both entries with the current state.
    pub fn save(&self, state: &ChatState) -> Result<(), Error> {
        let blob = serde_json::to_string(state.conversations())?;
        self.kv.set(CONVERSATIONS_KEY, &blob)?;
        self.kv.set(ACTIVE_ID_KEY, state.active_id())?;
        Ok(())
    }

    #[cfg(test)]
    fn kv(&self) -> &dyn KvStore {
        self.kv.as_ref()
    }
}
