//! API routes module

pub mod chat;
pub mod config;
pub mod conversations;
pub mod media;

use std::sync::{Arc, RwLock};

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Front-end configuration
        .nest("/config", config::router())
        // Conversation list and selection
        .nest("/conversations", conversations::router())
        // Chat turns streamed as server sent events
        .nest("/chat", chat::router())
        // Image generation and description
        .merge(media::router())
}
