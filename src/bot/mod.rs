pub mod conversation;
pub mod telegram;
pub mod types;

pub use conversation::{Conversation, Input, Reply, State, Transition, main_menu};
pub use telegram::TelegramClient;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::download::{Dispatcher, DownloadOutcome, FileRef, OutcomeStatus};
use types::{InlineKeyboardMarkup, Update};

const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Chat transport the runner talks through
#[async_trait]
pub trait ChatApi: Send + Sync + 'static {
    async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>>;

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<()>;

    async fn answer_callback(&self, callback_id: &str) -> Result<()>;
}

/// Routes updates to per-chat conversations and dispatches the requests
/// they produce.
pub struct BotRunner<A: ChatApi> {
    api: Arc<A>,
    dispatcher: Arc<Dispatcher>,
    allowed_users: Vec<i64>,
    sessions: HashMap<i64, Conversation>,
    offset: i64,
}

impl<A: ChatApi> BotRunner<A> {
    pub fn new(api: Arc<A>, dispatcher: Arc<Dispatcher>, allowed_users: Vec<i64>) -> Self {
        Self {
            api,
            dispatcher,
            allowed_users,
            sessions: HashMap::new(),
            offset: 0,
        }
    }

    /// Long-poll forever. Transport failures are logged and retried.
    pub async fn run(&mut self, poll_timeout: Duration) -> Result<()> {
        info!("bot is polling for updates");
        loop {
            match self.poll_once(poll_timeout).await {
                Ok(count) => debug!(count, "processed updates"),
                Err(e) => {
                    warn!(error = %format!("{:#}", e), "polling failed, retrying");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }
    }

    /// Fetch and handle one batch of updates, returning how many were seen
    pub async fn poll_once(&mut self, poll_timeout: Duration) -> Result<usize> {
        let updates = self.api.get_updates(self.offset, poll_timeout).await?;
        let count = updates.len();

        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);
            if let Err(e) = self.handle_update(update).await {
                warn!(error = %format!("{:#}", e), "failed to handle update");
            }
        }

        Ok(count)
    }

    /// Number of chats currently inside a wizard
    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub async fn handle_update(&mut self, update: Update) -> Result<()> {
        let (chat_id, user, input) = if let Some(query) = update.callback_query {
            self.api.answer_callback(&query.id).await.ok();
            let Some(chat_id) = query.message.as_ref().map(|m| m.chat.id) else {
                return Ok(());
            };
            let input = query.data.map(Input::Action).unwrap_or(Input::Other);
            (chat_id, query.from, input)
        } else if let Some(message) = update.message {
            let Some(user) = message.from else {
                return Ok(());
            };
            let input = if let Some(document) = message.document {
                Input::Document(FileRef::new(document.file_id, document.file_name))
            } else if let Some(text) = message.text.as_deref() {
                Input::from_text(text)
            } else {
                Input::Other
            };
            (message.chat.id, user, input)
        } else {
            return Ok(());
        };

        if !self.allowed_users.is_empty() && !self.allowed_users.contains(&user.id) {
            warn!(user_id = user.id, "ignoring user outside the allow list");
            return self
                .api
                .send_message(chat_id, "Sorry, you are not allowed to use this bot.", None)
                .await;
        }

        let mut conversation = self.sessions.remove(&chat_id).unwrap_or_default();
        let transition = conversation.handle(input, &user.first_name);
        // Idle chats keep no state, so only chats mid-wizard are stored
        if *conversation.state() != State::Idle {
            self.sessions.insert(chat_id, conversation);
        }

        for reply in &transition.replies {
            self.send(chat_id, reply).await?;
        }

        if let Some(request) = transition.request {
            let (outcomes, receiver) = mpsc::unbounded_channel();
            match self.dispatcher.dispatch(request, outcomes) {
                Ok(id) => {
                    info!(chat_id, %id, "download accepted");
                    forward_outcomes(Arc::clone(&self.api), chat_id, receiver);
                    self.send(chat_id, &Reply::text("Done!")).await?;
                }
                Err(e) => {
                    info!(chat_id, error = %e, "download rejected");
                    self.send(chat_id, &Reply::text(e.user_message())).await?;
                }
            }
            self.send(chat_id, &main_menu(&user.first_name)).await?;
        }

        Ok(())
    }

    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<()> {
        self.api
            .send_message(chat_id, &reply.text, reply.keyboard.as_ref())
            .await
    }
}

/// Post every user-relevant outcome of one download back to its chat.
/// Ends when the download's sender side is dropped.
pub fn forward_outcomes<A: ChatApi>(
    api: Arc<A>,
    chat_id: i64,
    mut outcomes: mpsc::UnboundedReceiver<DownloadOutcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(outcome) = outcomes.recv().await {
            if outcome.status == OutcomeStatus::Started {
                debug!(chat_id, id = %outcome.id, "download started");
                continue;
            }
            if let Err(e) = api.send_message(chat_id, &outcome.message, None).await {
                warn!(chat_id, id = %outcome.id, error = %format!("{:#}", e), "could not deliver outcome");
            }
        }
    })
}
