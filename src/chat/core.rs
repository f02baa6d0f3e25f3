use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::models::{Message, Role};
use super::session::{RequestState, SharedSession};
use super::state::ChatState;
use super::title::{derive_title, title_or_fallback};
use crate::core::AppConfig;
use crate::openai::{self, ChatError, CompletionRequest, StreamDecoder};

pub const ERROR_MARKER: &str = "⚠️ Error:";
const DESCRIBE_PROMPT: &str = "Describe this image in detail.";

/// Progress reported to the presentation layer while a turn runs.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Status {
        state: RequestState,
    },
    Appended {
        conversation_id: String,
        message: Message,
    },
    Delta {
        message_id: String,
        delta: String,
    },
    Title {
        conversation_id: String,
        title: String,
    },
    Error {
        message: String,
    },
}

pub type EventSender = mpsc::UnboundedSender<ChatEvent>;

#[derive(Debug)]
pub enum SendOutcome {
    /// Blank input, nothing happened
    Ignored,
    Completed { message_id: String },
    /// The error was also appended to the conversation
    Failed(ChatError),
}

/// Drives a chat turn against the text endpoint: appends the user
/// message, streams the reply into the conversation and keeps the
/// saved conversations in sync.
///
/// Only one request is expected in flight at a time. Use
/// `ChatBuilder` to construct a `Chat`.
pub struct Chat {
    config: AppConfig,
    http: reqwest::Client,
    session: SharedSession,
    cancel: Mutex<Option<(u64, CancellationToken)>>,
    next_request: AtomicU64,
    title_task: Mutex<Option<JoinHandle<()>>>,
}

impl Chat {
    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn status(&self) -> RequestState {
        self.session.read().expect("Session lock poisoned").status()
    }

    /// A copy of the current state for rendering.
    pub fn snapshot(&self) -> ChatState {
        self.session
            .read()
            .expect("Session lock poisoned")
            .state()
            .clone()
    }

    pub fn new_chat(&self) -> String {
        self.commit(|s| s.new_chat())
    }

    pub fn select(&self, id: &str) -> bool {
        self.commit(|s| s.select(id))
    }

    pub fn delete(&self, id: &str) -> bool {
        self.commit(|s| s.delete(id))
    }

    /// Aborts the request in flight, if any. Content already streamed
    /// stays in the conversation.
    pub fn cancel(&self) -> bool {
        match self.cancel.lock().expect("Cancel lock poisoned").take() {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a chat or describe request is in flight.
    pub fn is_busy(&self) -> bool {
        self.status() != RequestState::Idle
            || self.cancel.lock().expect("Cancel lock poisoned").is_some()
    }

    /// Waits for the background title request, if one is running.
    pub async fn wait_for_title(&self) {
        let handle = self.title_task.lock().expect("Title lock poisoned").take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!("Title task failed: {}", e);
                }
            }
        }
    }

    fn text_url(&self) -> String {
        openai::with_referrer(&self.config.text_api_url, self.config.referrer.as_deref())
    }

    fn commit<R>(&self, update: impl FnOnce(&mut ChatState) -> R) -> R {
        self.session
            .write()
            .expect("Session lock poisoned")
            .apply(update)
    }

    fn set_status(&self, tx: &EventSender, state: RequestState) {
        self.session
            .write()
            .expect("Session lock poisoned")
            .set_status(state);
        let _ = tx.send(ChatEvent::Status { state });
    }

    fn arm(&self) -> (u64, CancellationToken) {
        let request = self.next_request.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        *self.cancel.lock().expect("Cancel lock poisoned") = Some((request, token.clone()));
        (request, token)
    }

    /// Clears the cancel slot unless a newer request has taken it.
    fn disarm(&self, request: u64) {
        let mut slot = self.cancel.lock().expect("Cancel lock poisoned");
        if slot.as_ref().is_some_and(|(armed, _)| *armed == request) {
            slot.take();
        }
    }

    /// Outbound request for a chat turn: the system message followed
    /// by the trimmed history.
    pub fn chat_request(&self, history: Vec<openai::Message>) -> CompletionRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(openai::Message::new(
            openai::Role::System,
            &self.config.system_message,
        ));
        messages.extend(history);
        CompletionRequest::new(&self.config.model, messages)
            .streaming()
            .temperature(self.config.temperature)
    }

    /// Appends the user's message, promoting a draft or naming a
    /// fresh conversation, and returns the conversation id with the
    /// history to send.
    fn begin_turn(&self, tx: &EventSender, user: Message) -> (String, Vec<openai::Message>) {
        let text = user.content.clone();
        let provisional = derive_title(&text);
        let limit = self.config.history_limit;

        let (conversation_id, titled, history) = self.commit(|s| {
            let first_turn = !s.active_conversation().has_user_message()
                && s.active_conversation().has_default_title();
            s.append(user.clone());

            let titled = if s.is_draft() {
                s.promote(&provisional).is_some()
            } else if first_turn {
                let id = s.active_id().to_string();
                s.set_title(&id, &provisional)
            } else {
                false
            };

            let history = s
                .history(limit)
                .into_iter()
                .map(Message::to_request_message)
                .collect::<Vec<_>>();
            (s.active_id().to_string(), titled, history)
        });

        let _ = tx.send(ChatEvent::Appended {
            conversation_id: conversation_id.clone(),
            message: user,
        });
        if titled {
            let _ = tx.send(ChatEvent::Title {
                conversation_id: conversation_id.clone(),
                title: provisional,
            });
            self.spawn_title(tx.clone(), conversation_id.clone(), text);
        }

        (conversation_id, history)
    }

    /// Refines the provisional title in the background. A newer
    /// request replaces one still running.
    fn spawn_title(&self, tx: EventSender, conversation_id: String, text: String) {
        let http = self.http.clone();
        let url = self.text_url();
        let model = self.config.model.clone();
        let session = Arc::clone(&self.session);

        let handle = tokio::spawn(async move {
            let title = title_or_fallback(&http, &url, &model, &text).await;
            let applied = session
                .write()
                .expect("Session lock poisoned")
                .apply(|s| s.set_title(&conversation_id, &title));
            if applied {
                tracing::debug!("Titled conversation {}: {}", conversation_id, title);
                let _ = tx.send(ChatEvent::Title {
                    conversation_id,
                    title,
                });
            }
        });

        let mut slot = self.title_task.lock().expect("Title lock poisoned");
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    fn append_reply(&self, tx: &EventSender, conversation_id: &str, reply: Message) -> String {
        let id = reply.id.clone();
        let delivered = self.commit(|s| s.append_to(conversation_id, reply.clone()));
        if !delivered {
            tracing::warn!("Conversation {} is gone, dropping reply", conversation_id);
        }
        let _ = tx.send(ChatEvent::Appended {
            conversation_id: conversation_id.to_string(),
            message: reply,
        });
        id
    }

    fn apply_delta(
        &self,
        tx: &EventSender,
        conversation_id: &str,
        message_id: &str,
        content: &mut String,
        delta: String,
    ) {
        if delta.is_empty() {
            return;
        }
        content.push_str(&delta);
        self.commit(|s| s.update_content_in(conversation_id, message_id, content));
        let _ = tx.send(ChatEvent::Delta {
            message_id: message_id.to_string(),
            delta,
        });
    }

    /// Settles a turn. Failures are appended to the conversation as an
    /// assistant message and handed back to the caller.
    fn finish(
        &self,
        tx: &EventSender,
        conversation_id: &str,
        request: u64,
        result: Result<String, ChatError>,
    ) -> SendOutcome {
        self.disarm(request);
        match result {
            Ok(message_id) => {
                self.set_status(tx, RequestState::Idle);
                SendOutcome::Completed { message_id }
            }
            Err(e) => {
                tracing::error!("Chat request failed: {}", e);
                self.set_status(tx, RequestState::Error);
                let text = format!("{} {}", ERROR_MARKER, e);
                self.append_reply(tx, conversation_id, Message::new(Role::Assistant, &text));
                let _ = tx.send(ChatEvent::Error {
                    message: e.to_string(),
                });
                self.set_status(tx, RequestState::Idle);
                SendOutcome::Failed(e)
            }
        }
    }

    /// Sends the user's message and streams the reply into the active
    /// conversation.
    pub async fn send(&self, tx: EventSender, input: &str) -> SendOutcome {
        let text = input.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }

        let (conversation_id, history) = self.begin_turn(&tx, Message::new(Role::User, text));
        let request = self.chat_request(history);
        let (request_id, token) = self.arm();

        let result = self
            .stream_reply(&tx, &conversation_id, &request, &token)
            .await;
        self.finish(&tx, &conversation_id, request_id, result)
    }

    async fn stream_reply(
        &self,
        tx: &EventSender,
        conversation_id: &str,
        request: &CompletionRequest,
        token: &CancellationToken,
    ) -> Result<String, ChatError> {
        let timeout = self.config.request_timeout;
        let deadline = Instant::now() + timeout;
        let url = self.text_url();

        self.set_status(tx, RequestState::Requesting);
        let response = abortable(
            token,
            deadline,
            timeout,
            openai::send_completion(&self.http, &url, request),
        )
        .await??;

        if !openai::is_streamed(&response) {
            let body = abortable(token, deadline, timeout, response.text()).await??;
            let content = openai::parse_completion(&body)?;
            let reply = Message::new(Role::Assistant, &content);
            return Ok(self.append_reply(tx, conversation_id, reply));
        }

        self.set_status(tx, RequestState::Streaming);
        let reply_id =
            self.append_reply(tx, conversation_id, Message::new(Role::Assistant, ""));

        let mut decoder = StreamDecoder::new();
        let mut content = String::new();
        let stream = response.bytes_stream();
        tokio::pin!(stream);

        while let Some(chunk) = abortable(token, deadline, timeout, stream.next()).await? {
            let chunk = chunk?;
            let delta = decoder.feed(&chunk);
            self.apply_delta(tx, conversation_id, &reply_id, &mut content, delta);
        }
        let delta = decoder.finish();
        self.apply_delta(tx, conversation_id, &reply_id, &mut content, delta);

        Ok(reply_id)
    }

    /// Adds a generated image for `prompt` to the conversation. The
    /// image service renders on request so no call is made here.
    pub fn imagine(&self, tx: EventSender, prompt: &str) -> SendOutcome {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return SendOutcome::Ignored;
        }

        let (conversation_id, _) = self.begin_turn(&tx, Message::new(Role::User, prompt));
        let url = openai::image_url(
            &self.config.image_api_url,
            prompt,
            self.config.referrer.as_deref(),
        );
        let reply = Message::new(Role::Assistant, prompt).with_image(&url);
        let message_id = self.append_reply(&tx, &conversation_id, reply);
        SendOutcome::Completed { message_id }
    }

    /// Asks the endpoint to describe an uploaded image. The upload is
    /// sent inline as a base64 data URI.
    pub async fn describe(
        &self,
        tx: EventSender,
        image: &[u8],
        mime: &str,
        file_name: &str,
        question: Option<&str>,
    ) -> SendOutcome {
        if image.is_empty() {
            return SendOutcome::Ignored;
        }
        let question = question
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(DESCRIBE_PROMPT);

        let user = Message::new(Role::User, question).with_image(file_name);
        let (conversation_id, _) = self.begin_turn(&tx, user);
        let request = CompletionRequest::new(
            &self.config.model,
            vec![
                openai::Message::new(openai::Role::System, &self.config.system_message),
                openai::Message::new_with_image(
                    openai::Role::User,
                    question,
                    &openai::data_uri(mime, image),
                ),
            ],
        );
        let (request_id, token) = self.arm();

        let result = self
            .describe_reply(&tx, &conversation_id, &request, &token)
            .await;
        self.finish(&tx, &conversation_id, request_id, result)
    }

    async fn describe_reply(
        &self,
        tx: &EventSender,
        conversation_id: &str,
        request: &CompletionRequest,
        token: &CancellationToken,
    ) -> Result<String, ChatError> {
        let timeout = self.config.request_timeout;
        let deadline = Instant::now() + timeout;
        let url = self.text_url();

        self.set_status(tx, RequestState::Requesting);
        let content = abortable(
            token,
            deadline,
            timeout,
            openai::completion(&self.http, &url, request),
        )
        .await??;
        Ok(self.append_reply(tx, conversation_id, Message::new(Role::Assistant, &content)))
    }
}

/// Runs `fut` unless the token is cancelled or the deadline passes
/// first. Hitting the deadline cancels the token too.
async fn abortable<F: Future>(
    token: &CancellationToken,
    deadline: Instant,
    timeout: Duration,
    fut: F,
) -> Result<F::Output, ChatError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ChatError::Cancelled),
        _ = tokio::time::sleep_until(deadline) => {
            token.cancel();
            Err(ChatError::TimedOut(timeout))
        }
        out = fut => Ok(out),
    }
}

pub struct ChatBuilder {
    config: AppConfig,
    session: SharedSession,
    http: Option<reqwest::Client>,
}

impl ChatBuilder {
    pub fn new(config: AppConfig, session: SharedSession) -> Self {
        Self {
            config,
            session,
            http: None,
        }
    }

    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> Chat {
        Chat {
            config: self.config,
            http: self.http.unwrap_or_default(),
            session: self.session,
            cancel: Mutex::new(None),
            next_request: AtomicU64::new(0),
            title_task: Mutex::new(None),
        }
    }
}
