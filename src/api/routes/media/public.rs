//! Public types for image generation and description
use serde::{Deserialize, Serialize};

use crate::chat::Message;

#[derive(Deserialize, Serialize, Debug)]
pub struct ImageRequest {
    pub prompt: String,
}

/// An uploaded image, base64 encoded
#[derive(Deserialize, Serialize, Debug)]
pub struct DescribeRequest {
    pub image: String,
    pub mime: String,
    pub file_name: String,
    pub question: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MediaResponse {
    pub conversation_id: String,
    pub message: Message,
}
