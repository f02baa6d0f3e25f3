//! Router for image generation and description

use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use tokio::sync::mpsc;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::chat::{Chat, ChatEvent, SendOutcome};

type SharedState = Arc<RwLock<AppState>>;

fn chat(state: &SharedState) -> Arc<Chat> {
    Arc::clone(&state.read().expect("Unable to read share state").chat)
}

/// The last message appended during a turn, which is the reply or the
/// error notice.
fn last_appended(rx: &mut mpsc::UnboundedReceiver<ChatEvent>) -> Option<public::MediaResponse> {
    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        if let ChatEvent::Appended {
            conversation_id,
            message,
        } = event
        {
            last = Some(public::MediaResponse {
                conversation_id,
                message,
            });
        }
    }
    last
}

fn respond(
    outcome: SendOutcome,
    rx: &mut mpsc::UnboundedReceiver<ChatEvent>,
) -> Result<Response, ApiError> {
    let status = match outcome {
        SendOutcome::Ignored => {
            return Ok((StatusCode::BAD_REQUEST, "Nothing to send").into_response());
        }
        SendOutcome::Completed { .. } => StatusCode::OK,
        SendOutcome::Failed(_) => StatusCode::BAD_GATEWAY,
    };
    let resp = last_appended(rx).ok_or_else(|| anyhow!("No message was appended"))?;
    Ok((status, Json(resp)).into_response())
}

/// Add a generated image to the active conversation
async fn image_handler(
    State(state): State<SharedState>,
    Json(payload): Json<public::ImageRequest>,
) -> Result<Response, ApiError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = chat(&state).imagine(tx, &payload.prompt);
    respond(outcome, &mut rx)
}

/// Describe an uploaded image in the active conversation
async fn describe_handler(
    State(state): State<SharedState>,
    Json(payload): Json<public::DescribeRequest>,
) -> Result<Response, ApiError> {
    let chat = chat(&state);
    if chat.is_busy() {
        return Ok((StatusCode::CONFLICT, "A request is already in flight").into_response());
    }

    let image = match STANDARD.decode(payload.image.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            return Ok((StatusCode::BAD_REQUEST, format!("Invalid image data: {}", e)).into_response());
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = chat
        .describe(
            tx,
            &image,
            &payload.mime,
            &payload.file_name,
            payload.question.as_deref(),
        )
        .await;
    respond(outcome, &mut rx)
}

/// Create the media router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/image", post(image_handler))
        .route("/describe", post(describe_handler))
}
