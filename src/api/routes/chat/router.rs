//! Router for the chat API

use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response, sse::Event, sse::KeepAlive, sse::Sse},
    routing::post,
};
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::public;
use crate::api::state::AppState;
use crate::chat::{ChatEvent, SendOutcome};

type SharedState = Arc<RwLock<AppState>>;

/// Send a message in the active conversation and stream the progress
/// of the turn. The stream ends once the turn and any title request
/// it started have settled.
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<public::ChatRequest>,
) -> Result<Response, crate::api::public::ApiError> {
    let chat = Arc::clone(&state.read().expect("Unable to read share state").chat);
    if chat.is_busy() {
        return Ok((StatusCode::CONFLICT, "A request is already in flight").into_response());
    }
    let (tx, rx) = mpsc::unbounded_channel::<ChatEvent>();

    let sse_stream = UnboundedReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize chat event: {}", e);
            String::from("{}")
        });
        Ok::<Event, Infallible>(Event::default().data(data))
    });

    // The turn keeps running if the client goes away so the reply
    // still lands in the conversation
    tokio::spawn(async move {
        match chat.send(tx, &payload.message).await {
            SendOutcome::Ignored => tracing::debug!("Ignoring empty chat message"),
            SendOutcome::Completed { message_id } => {
                tracing::debug!("Chat turn completed with message {}", message_id)
            }
            SendOutcome::Failed(e) => tracing::warn!("Chat turn failed: {}", e),
        }
    });

    let resp = Sse::new(sse_stream)
        .keep_alive(
            KeepAlive::default()
                .text("keep-alive")
                .interval(Duration::from_secs(15)),
        )
        .into_response();

    Ok(resp)
}

/// Abort the request in flight
async fn chat_cancel(State(state): State<SharedState>) -> Json<public::CancelResponse> {
    let chat = Arc::clone(&state.read().expect("Unable to read share state").chat);
    let cancelled = chat.cancel();
    if cancelled {
        tracing::info!("Cancelled chat request");
    }
    Json(public::CancelResponse { cancelled })
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_handler))
        .route("/cancel", post(chat_cancel))
}
