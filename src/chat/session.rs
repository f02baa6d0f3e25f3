use std::sync::{Arc, RwLock};

use anyhow::{Error, Result};
use serde::Serialize;

use super::state::ChatState;
use super::store::ConversationStore;

/// Lifecycle of the one outbound chat request.
#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Idle,
    Requesting,
    Streaming,
    Error,
}

/// Chat state together with the store it is mirrored to.
pub struct Session {
    state: ChatState,
    store: ConversationStore,
    status: RequestState,
}

pub type SharedSession = Arc<RwLock<Session>>;

impl Session {
    pub fn load(store: ConversationStore) -> Result<Self, Error> {
        let state = store.load()?;
        Ok(Self {
            state,
            store,
            status: RequestState::Idle,
        })
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(RwLock::new(self))
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn status(&self) -> RequestState {
        self.status
    }

    pub fn set_status(&mut self, status: RequestState) {
        self.status = status;
    }

    /// Runs an update against the state and writes the result to
    /// storage. A failed write is logged, the in-memory state stays
    /// usable.
    pub fn apply<R>(&mut self, update: impl FnOnce(&mut ChatState) -> R) -> R {
        let out = update(&mut self.state);
        if let Err(e) = self.store.save(&self.state) {
            tracing::error!("Failed to persist conversations: {}", e);
        }
        out
    }
}
