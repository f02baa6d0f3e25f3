//! Test utilities for integration tests
#![allow(dead_code)]
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{Router, body::Body};

use parley::api::AppState;
use parley::api::app;
use parley::chat::{ChatBuilder, ConversationStore, Session};
use parley::core::AppConfig;

pub const SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

/// Config pointing the text endpoint at `server_url`.
pub fn test_config(server_url: &str) -> AppConfig {
    AppConfig {
        db_path: String::from(":memory:"),
        text_api_url: format!("{}/openai", server_url),
        image_api_url: String::from("https://img.test/prompt"),
        model: String::from("openai"),
        temperature: 0.7,
        system_message: String::from(SYSTEM_MESSAGE),
        referrer: None,
        logo_url: Some(String::from("https://img.test/logo.png")),
        history_limit: 18,
        request_timeout: Duration::from_secs(5),
    }
}

/// Creates a test application router backed by in-memory storage.
pub fn test_app(server_url: &str) -> Router {
    let config = test_config(server_url);
    let session = Session::load(ConversationStore::in_memory())
        .expect("Failed to load session")
        .shared();
    let chat = ChatBuilder::new(config.clone(), session).build();
    let app_state = AppState::new(chat, config);
    app(Arc::new(RwLock::new(app_state)))
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}
