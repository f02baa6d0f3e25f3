//! Router for the config API

use std::sync::{Arc, RwLock};

use axum::{Json, Router, extract::State, routing::get};

use super::public;
use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

async fn config_get(State(state): State<SharedState>) -> Json<public::ConfigResponse> {
    let shared_state = state.read().expect("Unable to read share state");
    let config = &shared_state.config;
    Json(public::ConfigResponse {
        model: config.model.clone(),
        image_api_url: config.image_api_url.clone(),
        logo_url: config.logo_url.clone(),
        history_limit: config.history_limit,
        request_timeout_secs: config.request_timeout.as_secs(),
    })
}

/// Create the config router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(config_get))
}
