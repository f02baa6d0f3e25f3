use std::env;
use std::time::Duration;

pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant. Answer clearly and format responses with Markdown when it helps readability.";

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// SQLite file under `PARLEY_STORAGE_PATH`
    pub db_path: String,
    pub text_api_url: String,
    pub image_api_url: String,
    pub model: String,
    pub temperature: f32,
    pub system_message: String,
    /// Appended as `referrer=` to every outbound call when set
    pub referrer: Option<String>,
    /// Overrides the logo shown by a front-end
    pub logo_url: Option<String>,
    pub history_limit: usize,
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("PARLEY_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/parley.db", storage_path.trim_end_matches('/'));
        let text_api_url = env::var("PARLEY_TEXT_API_URL")
            .unwrap_or_else(|_| "https://text.pollinations.ai/openai".to_string());
        let image_api_url = env::var("PARLEY_IMAGE_API_URL")
            .unwrap_or_else(|_| "https://image.pollinations.ai/prompt".to_string());
        let model = env::var("PARLEY_MODEL").unwrap_or_else(|_| "openai".to_string());
        let temperature = env::var("PARLEY_TEMPERATURE")
            .ok()
            .and_then(|t| t.parse::<f32>().ok())
            .unwrap_or(0.7);
        let system_message = env::var("PARLEY_SYSTEM_MESSAGE")
            .unwrap_or_else(|_| DEFAULT_SYSTEM_MESSAGE.to_string());
        let referrer = non_empty_var("PARLEY_REFERRER");
        let logo_url = non_empty_var("PARLEY_LOGO_URL");

        Self {
            db_path,
            text_api_url,
            image_api_url,
            model,
            temperature,
            system_message,
            referrer,
            logo_url,
            history_limit: 18,
            request_timeout: Duration::from_secs(45),
        }
    }
}

// Blank values count as unset
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.db_path.ends_with("/parley.db"));
        assert!(!config.db_path.contains("//"));
        assert_eq!(config.history_limit, 18);
        assert_eq!(config.request_timeout, Duration::from_secs(45));
    }
}
