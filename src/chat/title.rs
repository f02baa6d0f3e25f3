use anyhow::{Error, Result, anyhow};

use super::models::DEFAULT_TITLE;
use crate::openai::{self, CompletionRequest, Message, Role};

const MAX_TITLE_WORDS: usize = 8;
const MAX_TITLE_CHARS: usize = 60;
const QUOTES: &[char] = &['"', '\'', '`', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

const TITLE_PROMPT: &str = "You write short titles for chat conversations. Reply with a 3-6 word title for a conversation that starts with the user's message. Reply with the title only, no quotes or punctuation at the end.";

/// Title derived locally from the user's text: quotes stripped,
/// whitespace collapsed, at most 8 words and 60 characters.
pub fn derive_title(text: &str) -> String {
    let unquoted: String = text.chars().filter(|c| !QUOTES.contains(c)).collect();
    let words = unquoted
        .split_whitespace()
        .take(MAX_TITLE_WORDS)
        .collect::<Vec<_>>()
        .join(" ");
    let title: String = words.chars().take(MAX_TITLE_CHARS).collect();
    let title = title.trim();

    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title.to_string()
    }
}

/// Asks the text endpoint for a short title.
pub async fn generate_title(
    http: &reqwest::Client,
    url: &str,
    model: &str,
    first_message: &str,
) -> Result<String, Error> {
    let request = CompletionRequest::new(
        model,
        vec![
            Message::new(Role::System, TITLE_PROMPT),
            Message::new(Role::User, first_message),
        ],
    );
    let content = openai::completion(http, url, &request).await?;
    let unquoted: String = content.chars().filter(|c| !QUOTES.contains(c)).collect();
    let title = unquoted.trim().trim_end_matches(['.', '!', '?']).trim();
    if title.is_empty() {
        return Err(anyhow!("Empty title in response: {:?}", content));
    }

    Ok(derive_title(title))
}

/// Generated title, or the locally derived one on any failure.
pub async fn title_or_fallback(
    http: &reqwest::Client,
    url: &str,
    model: &str,
    first_message: &str,
) -> String {
    match generate_title(http, url, model, first_message).await {
        Ok(title) => title,
        Err(e) => {
            tracing::warn!("Title generation failed, using local title: {}", e);
            derive_title(first_message)
        }
    }
}
