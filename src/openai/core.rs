use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{StatusCode, header};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::stream::Record;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

// Plain text for ordinary turns, a list of parts when an image is
// attached.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: Content::Text(content.to_string()),
        }
    }

    pub fn new_with_image(role: Role, text: &str, image_url: &str) -> Self {
        Message {
            role,
            content: Content::Parts(vec![
                ContentPart::Text {
                    text: text.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.to_string(),
                    },
                },
            ]),
        }
    }
}

/// Request body for the text endpoint.
#[derive(Clone, Serialize, Debug)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    /// Keeps the exchange out of the provider's public feed
    pub private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(model: &str, messages: Vec<Message>) -> Self {
        Self {
            model: model.to_string(),
            messages,
            stream: false,
            private: true,
            temperature: None,
        }
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request was cancelled")]
    Cancelled,
    #[error("request timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
    #[error("server responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Appends the configured referrer to an outbound URL.
pub fn with_referrer(url: &str, referrer: Option<&str>) -> String {
    match referrer {
        Some(r) if !r.is_empty() => {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{}{}referrer={}", url, sep, urlencoding::encode(r))
        }
        _ => url.to_string(),
    }
}

/// URL of a generated image for `prompt`. The image service renders
/// on GET so the URL itself is the resource to display.
pub fn image_url(image_api_url: &str, prompt: &str, referrer: Option<&str>) -> String {
    let url = format!(
        "{}/{}",
        image_api_url.trim_end_matches('/'),
        urlencoding::encode(prompt.trim())
    );
    with_referrer(&url, referrer)
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Sends a completion request and checks the status. On a
/// non-success status the entire body is read and returned in the
/// error.
pub async fn send_completion(
    http: &reqwest::Client,
    url: &str,
    request: &CompletionRequest,
) -> Result<reqwest::Response, ChatError> {
    let response = http
        .post(url)
        .header(header::CONTENT_TYPE, "application/json")
        .json(request)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await?;
        return Err(ChatError::Status { status, body });
    }

    Ok(response)
}

/// Whether the body should be read incrementally. Anything other
/// than a plain JSON document is treated as a record stream.
pub fn is_streamed(response: &reqwest::Response) -> bool {
    !response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// Extracts the message text from a complete, non-streamed response
/// body.
pub fn parse_completion(body: &str) -> Result<String, ChatError> {
    let record = serde_json::from_str::<Record>(body)
        .map_err(|e| ChatError::Malformed(e.to_string()))?;
    record
        .into_text()
        .ok_or_else(|| ChatError::Malformed("response has no message content".to_string()))
}

/// Non-streaming completion returning the assistant's text.
pub async fn completion(
    http: &reqwest::Client,
    url: &str,
    request: &CompletionRequest,
) -> Result<String, ChatError> {
    let response = send_completion(http, url, request).await?;
    let body = response.text().await?;
    parse_completion(&body)
}
