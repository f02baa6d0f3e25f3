use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod conversations;
pub mod image;
pub mod serve;

use crate::chat::{Chat, ChatBuilder, ConversationStore, Session};
use crate::core::AppConfig;
use crate::storage::SqliteKv;

#[derive(Subcommand)]
enum Command {
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Start an interactive chat session
    Chat {},
    /// List saved conversations
    Conversations {},
    /// Add a generated image to the active conversation
    Image {
        #[arg(long)]
        prompt: String,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

/// Builds a `Chat` over the conversations saved on disk.
pub fn open_chat(config: &AppConfig) -> Result<Chat> {
    let store = ConversationStore::new(Box::new(SqliteKv::open(&config.db_path)?));
    let session = Session::load(store)?.shared();
    Ok(ChatBuilder::new(config.clone(), session).build())
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let config = AppConfig::default();

    // Handle each sub command
    match args.command {
        Some(Command::Serve { host, port }) => {
            serve::run(host, port, config).await?;
        }
        Some(Command::Chat {}) => {
            crate::api::init_tracing(&format!("{}=warn", env!("CARGO_CRATE_NAME")));
            chat::run(config).await?;
        }
        Some(Command::Conversations {}) => {
            conversations::run(config)?;
        }
        Some(Command::Image { prompt }) => {
            image::run(config, &prompt).await?;
        }
        None => {}
    }

    Ok(())
}
