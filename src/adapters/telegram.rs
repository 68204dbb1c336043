//! Telegram Alerts
//!
//! Pushes rendered notices to a chat through the Bot API. Delivery runs on a
//! spawned task so the decision loop never waits on Telegram.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::AlertsSection;
use crate::ports::{Notice, Notifier};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Bot API message length limit, in characters
const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API error {status}: {description}")]
    Api { status: u16, description: String },
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: Client,
    api_url: String,
    token: String,
    chat_id: String,
    dry_run: bool,
}

impl TelegramNotifier {
    pub fn new(
        token: impl Into<String>,
        chat_id: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self, TelegramError> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http,
            api_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
            dry_run,
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build from the alerts section. `None` when alerts are off or the
    /// token/chat id are missing.
    pub fn from_config(alerts: &AlertsSection, dry_run: bool) -> Option<Self> {
        if !alerts.telegram_enabled {
            return None;
        }

        let (token, chat_id) = match (alerts.get_bot_token(), alerts.get_chat_id()) {
            (Some(token), Some(chat_id)) => (token, chat_id),
            _ => {
                tracing::warn!("Telegram alerts enabled but bot token or chat id is missing - alerts disabled");
                return None;
            }
        };

        match Self::new(token, chat_id, dry_run) {
            Ok(notifier) => Some(match alerts.telegram_api_url {
                Some(ref url) => notifier.with_api_url(url.clone()),
                None => notifier,
            }),
            Err(e) => {
                tracing::warn!("Failed to create Telegram client: {} - alerts disabled", e);
                None
            }
        }
    }

    /// Send one message and wait for the API's answer
    pub async fn send_message(&self, text: &str) -> Result<(), TelegramError> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.token);
        let text = self.format_text(text);

        let response = self
            .http
            .post(&url)
            .json(&json!({ "chat_id": self.chat_id, "text": text }))
            .send()
            .await?;

        let status = response.status();
        let body: Option<ApiResponse> = response.json().await.ok();
        match body {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            other => Err(TelegramError::Api {
                status: status.as_u16(),
                description: other
                    .and_then(|b| b.description)
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }

    fn format_text(&self, text: &str) -> String {
        let text = if self.dry_run {
            format!("[DRY RUN] {}", text)
        } else {
            text.to_string()
        };
        truncate_chars(&text, MAX_MESSAGE_CHARS)
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

impl Notifier for TelegramNotifier {
    fn notify(&self, notice: Notice) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("Telegram notice dropped: no async runtime");
                return;
            }
        };

        let this = self.clone();
        let text = notice.render();
        handle.spawn(async move {
            if let Err(e) = this.send_message(&text).await {
                tracing::warn!("Telegram delivery failed: {}", e);
            }
        });
    }
}
