use std::sync::Arc;

use crate::chat::Chat;
use crate::core::AppConfig;

pub struct AppState {
    pub chat: Arc<Chat>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(chat: Chat, config: AppConfig) -> Self {
        Self {
            chat: Arc::new(chat),
            config,
        }
    }
}
