// # Telegram Notifier
//
// Notifier implementation backed by the Telegram Bot API.
//
// Configuration comes from the environment:
// - `TELEGRAM_BOT_TOKEN`: bot token; unset disables notification entirely
// - `TELEGRAM_CHAT_ID`: destination chat; when unset, the most recent chat
//   seen by the bot (via `getUpdates`) is resolved once and cached
//
// Notification is strictly fire-and-forget: every transport failure is
// logged at warn level and swallowed, so a broken notifier can never affect
// orchestrator control flow.

use async_trait::async_trait;
use fip_core::traits::Notifier;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default HTTP timeout for Telegram API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Notifier delivering messages through the Telegram Bot API
pub struct TelegramNotifier {
    token: Option<String>,
    /// Configured or lazily resolved chat id
    chat_id: Mutex<Option<String>>,
    client: reqwest::Client,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl TelegramNotifier {
    /// Build from `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`
    pub fn from_env() -> Self {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.is_empty());
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok().filter(|c| !c.is_empty());
        if token.is_none() {
            debug!("telegram token not configured; notifications disabled");
        }
        Self::new(token, chat_id)
    }

    pub fn new(token: Option<String>, chat_id: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .expect("default reqwest client builds");
        Self {
            token,
            chat_id: Mutex::new(chat_id),
            client,
        }
    }

    /// Resolve the destination chat, caching the answer.
    ///
    /// Falls back to the chat of the most recent update the bot has seen.
    async fn resolve_chat_id(&self, token: &str) -> Option<String> {
        let mut cached = self.chat_id.lock().await;
        if let Some(chat_id) = cached.as_ref() {
            return Some(chat_id.clone());
        }

        let url = format!("https://api.telegram.org/bot{token}/getUpdates");
        let payload: Value = match self.client.get(&url).send().await {
            Ok(response) => match response.json().await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("telegram getUpdates returned invalid JSON: {e}");
                    return None;
                }
            },
            Err(e) => {
                warn!("telegram getUpdates failed: {e}");
                return None;
            }
        };

        if payload.get("ok") != Some(&Value::Bool(true)) {
            warn!("telegram getUpdates not ok");
            return None;
        }

        let chat_id = last_chat_id(&payload);
        if let Some(chat_id) = &chat_id {
            *cached = Some(chat_id.clone());
        } else {
            debug!("telegram chat id not configured and none derivable; skip notification");
        }
        chat_id
    }

    async fn post(&self, text: &str, parse_mode: Option<&str>) {
        let Some(token) = self.token.as_ref() else {
            return;
        };
        let Some(chat_id) = self.resolve_chat_id(token).await else {
            return;
        };

        let mut payload = serde_json::json!({ "chat_id": chat_id, "text": text });
        if let Some(mode) = parse_mode {
            payload["parse_mode"] = Value::String(mode.to_string());
        }

        let url = format!("https://api.telegram.org/bot{token}/sendMessage");
        match self.client.post(&url).json(&payload).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!("telegram notify failed: HTTP {}", response.status());
            }
            Ok(_) => {}
            Err(e) => warn!("telegram notify failed: {e}"),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, text: &str) {
        self.post(text, None).await;
    }

    async fn send_table(&self, table: &str) {
        let wrapped = format!("<pre>{}</pre>", escape_html(table));
        self.post(&wrapped, Some("HTML")).await;
    }
}

/// Chat id of the most recent update carrying a message
fn last_chat_id(payload: &Value) -> Option<String> {
    let updates = payload.get("result")?.as_array()?;
    for update in updates.iter().rev() {
        for key in ["message", "edited_message", "channel_post", "edited_channel_post"] {
            if let Some(id) = update
                .get(key)
                .and_then(|m| m.get("chat"))
                .and_then(|c| c.get("id"))
            {
                return Some(id.to_string());
            }
        }
    }
    None
}

/// Minimal HTML escaping for `<pre>` blocks
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
