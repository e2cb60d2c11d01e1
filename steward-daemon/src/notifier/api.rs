use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::errors::{DaemonError, Result};

/// Public Bot API endpoint
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Long-poll duration requested from `getUpdates`, in seconds
pub const POLL_TIMEOUT_SECS: u64 = 10;

const USER_AGENT: &str = concat!("steward/", env!("CARGO_PKG_VERSION"));

/// Transport used by the notifier
pub trait ChatApi: Send + Sync + 'static {
    fn send_text(&self, chat_id: i64, text: &str) -> impl Future<Output = Result<()>> + Send;

    /// Long-poll for updates with id `>= offset`
    fn get_updates(&self, offset: i64) -> impl Future<Output = Result<Vec<Update>>> + Send;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// [`ChatApi`] over the Telegram Bot HTTP API
#[derive(Clone)]
pub struct TelegramApi {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the bot token
        f.debug_struct("TelegramApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TelegramApi {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(TELEGRAM_API_URL, token)
    }

    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 20))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(DaemonError::Telegram(format!("{}: {}", status, body.trim())));
        }
        let parsed: ApiResponse<T> = serde_json::from_str(&body)
            .map_err(|e| DaemonError::Telegram(format!("malformed response: {}", e)))?;
        match parsed {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(DaemonError::Telegram(
                description.unwrap_or_else(|| "request not ok".to_string()),
            )),
        }
    }
}

impl ChatApi for TelegramApi {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&SendMessage { chat_id, text })
            .send()
            .await?;
        let _: serde_json::Value = Self::decode(response).await?;
        Ok(())
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let mut query = vec![("timeout", POLL_TIMEOUT_SECS.to_string())];
        if offset != 0 {
            query.push(("offset", offset.to_string()));
        }
        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&query)
            .send()
            .await?;
        Self::decode(response).await
    }
}
