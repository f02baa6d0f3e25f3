//! The core models for conversations kept on this device.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::openai;

pub const DEFAULT_TITLE: &str = "New chat";
/// Id of the greeting every conversation starts with. It is shown but
/// never sent upstream.
pub const WELCOME_ID: &str = "welcome";
pub const WELCOME_MESSAGE: &str = "Hi! I'm your assistant. Ask me anything, describe an image you'd like me to draw, or share a picture for me to look at.";

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

impl From<Role> for openai::Role {
    fn from(role: Role) -> Self {
        match role {
            Role::User => openai::Role::User,
            Role::Assistant => openai::Role::Assistant,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// URL of a generated image or the file name of an upload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.image = Some(image.to_string());
        self
    }

    /// Role and content only, the shape sent upstream.
    pub fn to_request_message(&self) -> openai::Message {
        openai::Message::new(self.role.into(), &self.content)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// A fresh conversation seeded with the welcome message.
    pub fn new() -> Self {
        let now = Utc::now();
        Conversation {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages: vec![Message {
                id: WELCOME_ID.to_string(),
                role: Role::Assistant,
                content: WELCOME_MESSAGE.to_string(),
                image: None,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// The conversation on screen. A `Draft` exists only in memory until
/// the first user message promotes it into the saved set.
#[derive(Clone, Debug, PartialEq)]
pub enum ActiveConversation {
    Draft(Conversation),
    Saved(String),
}
