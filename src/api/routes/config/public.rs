//! Public types for the config API
use serde::{Deserialize, Serialize};

/// Settings a front-end needs to render the chat
#[derive(Serialize, Deserialize, Debug)]
pub struct ConfigResponse {
    pub model: String,
    pub image_api_url: String,
    pub logo_url: Option<String>,
    pub history_limit: usize,
    pub request_timeout_secs: u64,
}
