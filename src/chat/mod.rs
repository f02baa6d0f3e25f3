//! Conversations, their persistence and the request lifecycle for a
//! chat turn.
mod core;
pub mod models;
mod session;
mod state;
mod store;
pub mod title;

pub use self::core::{Chat, ChatBuilder, ChatEvent, ERROR_MARKER, EventSender, SendOutcome};
pub use models::{ActiveConversation, Conversation, Message, Role};
pub use session::{RequestState, Session, SharedSession};
pub use state::ChatState;
pub use store::{ACTIVE_ID_KEY, CONVERSATIONS_KEY, ConversationStore};
