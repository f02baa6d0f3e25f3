use anyhow::Result;

use crate::chat::ConversationStore;
use crate::core::AppConfig;
use crate::storage::SqliteKv;

pub fn run(config: AppConfig) -> Result<()> {
    let store = ConversationStore::new(Box::new(SqliteKv::open(&config.db_path)?));
    let state = store.load()?;

    if state.conversations().is_empty() {
        println!("No saved conversations");
        return Ok(());
    }

    for c in state.conversations() {
        let marker = if c.id == state.active_id() { "*" } else { " " };
        println!(
            "{} {}  {}  ({} messages, updated {})",
            marker,
            c.id,
            c.title,
            c.messages.len(),
            c.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
