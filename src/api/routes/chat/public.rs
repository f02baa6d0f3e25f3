//! Public types for the chat API
use serde::{Deserialize, Serialize};

pub use crate::chat::ChatEvent;

#[derive(Deserialize, Serialize, Debug)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CancelResponse {
    pub cancelled: bool,
}
