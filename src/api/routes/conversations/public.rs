//! Public types for the conversations API
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::{Conversation, Message, RequestState};

/// A row in the conversation list
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&Conversation> for ConversationSummary {
    fn from(c: &Conversation) -> Self {
        Self {
            id: c.id.clone(),
            title: c.title.clone(),
            message_count: c.messages.len(),
            updated_at: c.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
    pub active_id: String,
    pub is_draft: bool,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewConversationResponse {
    pub id: String,
}

/// What is on screen right now
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ActiveConversationResponse {
    pub id: String,
    pub title: String,
    pub is_draft: bool,
    pub status: RequestState,
    pub messages: Vec<Message>,
}

#[derive(Serialize, Debug)]
pub struct ConversationResponse {
    pub conversation: Conversation,
}
