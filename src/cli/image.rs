use anyhow::{Result, bail};
use tokio::sync::mpsc;

use super::open_chat;
use crate::chat::{ChatEvent, SendOutcome};
use crate::core::AppConfig;

pub async fn run(config: AppConfig, prompt: &str) -> Result<()> {
    let chat = open_chat(&config)?;
    let (tx, mut rx) = mpsc::unbounded_channel();

    if let SendOutcome::Ignored = chat.imagine(tx, prompt) {
        bail!("Prompt is empty");
    }
    while let Ok(event) = rx.try_recv() {
        if let ChatEvent::Appended { message, .. } = event {
            if let Some(url) = message.image {
                println!("{}", url);
            }
        }
    }

    // Let the title land before the process exits
    chat.wait_for_title().await;
    Ok(())
}
