use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::ChatApi;
use super::types::{ApiResponse, File, InlineKeyboardMarkup, Update};
use crate::download::{FileLinkResolver, FileRef};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Minimal Bot API client: long polling, messages, callback answers and
/// file links. The token is part of every URL, so URLs are never logged.
pub struct TelegramClient {
    client: Client,
    api_url: String,
    token: String,
}

#[derive(Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 2],
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
}

#[derive(Serialize)]
struct GetFile<'a> {
    file_id: &'a str,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_api_url(token, DEFAULT_API_URL)
    }

    /// Point the client at another Bot API server (self-hosted, tests)
    pub fn with_api_url(token: impl Into<String>, api_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("mediabot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    /// Public download URL for a `file_path` returned by `getFile`
    pub fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_url, self.token, file_path)
    }

    async fn call<P, T>(&self, method: &str, params: &P, timeout: Duration) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(method, "calling bot api");
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(params)
            .send()
            .await
            .map_err(|e| anyhow!("{} request failed: {}", method, e.without_url()))?;

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| anyhow!("{} returned an unreadable body: {}", method, e.without_url()))?;

        if !body.ok {
            return Err(anyhow!(
                "{} failed: {}",
                method,
                body.description.unwrap_or_else(|| "unknown error".to_string())
            ));
        }

        body.result
            .with_context(|| format!("{} returned no result", method))
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File> {
        self.call("getFile", &GetFile { file_id }, Duration::from_secs(30))
            .await
    }
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>> {
        let params = GetUpdates {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: ["message", "callback_query"],
        };
        // Leave the server time to answer an empty long poll
        self.call("getUpdates", &params, timeout + Duration::from_secs(10))
            .await
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let params = SendMessage {
            chat_id,
            text,
            reply_markup: keyboard,
        };
        let _: serde_json::Value = self
            .call("sendMessage", &params, Duration::from_secs(30))
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        let params = AnswerCallbackQuery {
            callback_query_id: callback_id,
        };
        let _: bool = self
            .call("answerCallbackQuery", &params, Duration::from_secs(30))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FileLinkResolver for TelegramClient {
    async fn resolve(&self, file: &FileRef) -> Result<String> {
        let remote = self.get_file(&file.file_id).await?;
        let path = remote
            .file_path
            .context("Telegram did not return a file path (file may be too large)")?;
        Ok(self.file_url(&path))
    }
}
