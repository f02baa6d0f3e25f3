use std::io::Write;
use std::path::Path;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use super::open_chat;
use crate::chat::{Chat, ChatEvent, Role, SendOutcome};
use crate::core::AppConfig;

const HELP: &str = "Commands:
  /new                       start a new conversation
  /list                      list saved conversations
  /open <id>                 switch to a saved conversation
  /delete <id>               delete a conversation
  /image <prompt>            generate an image
  /describe <path> [prompt]  describe an image file
  /quit                      exit
Press Ctrl-C while a reply is streaming to stop it.";

fn print_event(event: &ChatEvent) {
    match event {
        ChatEvent::Delta { delta, .. } => {
            print!("{}", delta);
            let _ = std::io::stdout().flush();
        }
        ChatEvent::Appended { message, .. } if message.role == Role::Assistant => {
            if let Some(image) = &message.image {
                println!("{}", image);
            } else if !message.content.is_empty() {
                print!("{}", message.content);
            }
        }
        _ => {}
    }
}

/// Runs a turn while echoing its progress. Ctrl-C cancels the
/// request, keeping whatever has streamed so far.
async fn run_turn<F>(chat: &Chat, turn: F, mut rx: mpsc::UnboundedReceiver<ChatEvent>) -> SendOutcome
where
    F: Future<Output = SendOutcome>,
{
    tokio::pin!(turn);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    let outcome = loop {
        tokio::select! {
            outcome = &mut turn => break outcome,
            Some(event) = rx.recv() => print_event(&event),
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                chat.cancel();
            }
        }
    };
    while let Ok(event) = rx.try_recv() {
        print_event(&event);
    }
    println!();
    outcome
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn list(chat: &Chat) {
    let snapshot = chat.snapshot();
    if snapshot.conversations().is_empty() {
        println!("No saved conversations");
    }
    for c in snapshot.conversations() {
        let marker = if c.id == snapshot.active_id() { "*" } else { " " };
        println!("{} {}  {}", marker, c.id, c.title);
    }
}

async fn describe(chat: &Chat, args: &str) -> Result<()> {
    let (path, question) = match args.split_once(' ') {
        Some((path, question)) => (path, Some(question)),
        None => (args, None),
    };
    let path = Path::new(path);
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image");

    let (tx, rx) = mpsc::unbounded_channel();
    let turn = chat.describe(tx, &bytes, mime_for(path), file_name, question);
    run_turn(chat, turn, rx).await;
    Ok(())
}

pub async fn run(config: AppConfig) -> Result<()> {
    let chat = open_chat(&config)?;
    let mut rl = DefaultEditor::new()?;

    println!("{}\n", HELP);
    let snapshot = chat.snapshot();
    if snapshot.is_draft() {
        if let Some(welcome) = snapshot.live().first() {
            println!("{}\n", welcome.content);
        }
    } else {
        println!("Continuing \"{}\"\n", snapshot.active_conversation().title);
    }

    loop {
        let readline = rl.readline(">>> ");
        let line = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        let (command, args) = line.split_once(' ').unwrap_or((line, ""));
        let args = args.trim();
        match command {
            "/quit" => break,
            "/help" => println!("{}", HELP),
            "/new" => {
                chat.new_chat();
                println!("Started a new conversation");
            }
            "/list" => list(&chat),
            "/open" => {
                if chat.select(args) {
                    for m in chat.snapshot().live() {
                        println!("[{:?}] {}", m.role, m.content);
                    }
                } else {
                    println!("No conversation {}", args);
                }
            }
            "/delete" => {
                if !chat.delete(args) {
                    println!("No conversation {}", args);
                }
            }
            "/image" => {
                let (tx, rx) = mpsc::unbounded_channel();
                let outcome = chat.imagine(tx, args);
                run_turn(&chat, async move { outcome }, rx).await;
            }
            "/describe" => {
                if let Err(e) = describe(&chat, args).await {
                    println!("Error: {}", e);
                }
            }
            _ => {
                let (tx, rx) = mpsc::unbounded_channel();
                let turn = chat.send(tx, line);
                run_turn(&chat, turn, rx).await;
            }
        }
    }

    chat.wait_for_title().await;
    Ok(())
}
