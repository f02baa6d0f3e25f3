//! Router for the conversations API

use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use super::public;
use crate::api::state::AppState;
use crate::chat::Chat;

type SharedState = Arc<RwLock<AppState>>;

fn chat(state: &SharedState) -> Arc<Chat> {
    Arc::clone(&state.read().expect("Unable to read share state").chat)
}

/// List saved conversations, most recent first
async fn conversation_list(State(state): State<SharedState>) -> Json<public::ConversationListResponse> {
    let snapshot = chat(&state).snapshot();
    Json(public::ConversationListResponse {
        conversations: snapshot
            .conversations()
            .iter()
            .map(public::ConversationSummary::from)
            .collect(),
        active_id: snapshot.active_id().to_string(),
        is_draft: snapshot.is_draft(),
    })
}

/// Start a new draft conversation
async fn conversation_new(State(state): State<SharedState>) -> Json<public::NewConversationResponse> {
    let id = chat(&state).new_chat();
    tracing::debug!("Started draft conversation {}", id);
    Json(public::NewConversationResponse { id })
}

async fn conversation_active(State(state): State<SharedState>) -> Json<public::ActiveConversationResponse> {
    let chat = chat(&state);
    let snapshot = chat.snapshot();
    let active = snapshot.active_conversation();
    Json(public::ActiveConversationResponse {
        id: active.id.clone(),
        title: active.title.clone(),
        is_draft: snapshot.is_draft(),
        status: chat.status(),
        messages: snapshot.live().to_vec(),
    })
}

/// Get a single conversation by ID
async fn conversation_get(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let snapshot = chat(&state).snapshot();
    match snapshot.find(&id) {
        Some(conversation) => Json(public::ConversationResponse {
            conversation: conversation.clone(),
        })
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("Conversation {} not found", id),
        )
            .into_response(),
    }
}

async fn conversation_select(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if chat(&state).select(&id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            format!("Conversation {} not found", id),
        )
            .into_response()
    }
}

async fn conversation_delete(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if chat(&state).delete(&id) {
        tracing::info!("Deleted conversation {}", id);
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            format!("Conversation {} not found", id),
        )
            .into_response()
    }
}

/// Create the conversations router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(conversation_list).post(conversation_new))
        .route("/active", get(conversation_active))
        .route("/{id}", get(conversation_get).delete(conversation_delete))
        .route("/{id}/select", post(conversation_select))
}
