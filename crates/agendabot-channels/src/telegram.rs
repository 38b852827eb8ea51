//! Telegram Bot API channel: sendMessage with inline buttons, plus a
//! getUpdates long-poll listener for the button callbacks.

use agendabot_core::config::TelegramConfig;
use agendabot_core::error::{AgendaError, Result};
use agendabot_core::traits::NotifyChannel;
use agendabot_core::types::{DoseCallback, InboundAction, Notice, NoticeAction};
use async_trait::async_trait;
use futures::stream::Stream;
use serde::Deserialize;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Telegram bot channel.
#[derive(Clone)]
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        if config.bot_token.trim().is_empty() {
            return Err(AgendaError::config("Telegram bot_token is empty (set TELEGRAM_BOT_TOKEN)"));
        }
        // Long polls must not trip the client timeout.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.poll_timeout_secs + 15))
            .user_agent(concat!("agendabot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgendaError::Channel(format!("Telegram client: {e}")))?;
        Ok(Self { config, client })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.config.api_base.trim_end_matches('/'), self.config.bot_token)
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, method: &str, body: &serde_json::Value) -> Result<T> {
        let response = self.client.post(self.method_url(method)).json(body).send().await
            .map_err(|e| AgendaError::Channel(format!("Telegram {method} failed: {e}")))?;

        let status = response.status();
        let parsed: TgResponse<T> = response.json().await
            .map_err(|e| AgendaError::Channel(format!("Telegram {method} {status}: invalid response: {e}")))?;
        if !parsed.ok {
            let reason = parsed.description.unwrap_or_default();
            return Err(AgendaError::Channel(format!("Telegram {method} {status}: {reason}")));
        }
        parsed.result
            .ok_or_else(|| AgendaError::Channel(format!("Telegram {method}: empty result")))
    }

    /// Send a Markdown message, with one row of inline buttons if any.
    pub async fn send_message(&self, chat_id: &str, text: &str, actions: &[NoticeAction]) -> Result<()> {
        let _: serde_json::Value = self.call("sendMessage", &message_body(chat_id, text, actions)).await?;
        Ok(())
    }

    /// Get current bot info.
    pub async fn get_me(&self) -> Result<TgUser> {
        self.call("getMe", &serde_json::json!({})).await
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<TgUpdate>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": self.config.poll_timeout_secs,
            "allowed_updates": ["callback_query"],
        });
        self.call("getUpdates", &body).await
    }

    /// Stop the client-side spinner on a pressed button.
    pub async fn answer_callback(&self, callback_query_id: &str) -> Result<()> {
        let body = serde_json::json!({ "callback_query_id": callback_query_id });
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }

    /// Start long-polling for dose button presses; returns a stream of parsed actions.
    /// Presses from anyone but `authorized` are acknowledged and dropped.
    /// Auto-reconnects on errors with exponential backoff.
    pub fn start_callback_listener(self, authorized: Option<String>) -> TelegramCallbackStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let channel = self;
            let mut offset: i64 = 0;
            let mut backoff_secs: u64 = 5;
            tracing::info!("📱 Telegram callback listener started");

            // ═══ Poll loop ═══
            loop {
                let updates = match channel.get_updates(offset).await {
                    Ok(updates) => updates,
                    Err(e) => {
                        tracing::error!("Telegram getUpdates failed: {e}, retrying in {backoff_secs}s...");
                        tokio::time::sleep(tokio::time::Duration::from_secs(backoff_secs)).await;
                        backoff_secs = (backoff_secs * 2).min(60);
                        continue;
                    }
                };
                backoff_secs = 5;

                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(query) = update.callback_query else { continue };

                    if let Err(e) = channel.answer_callback(&query.id).await {
                        tracing::debug!("answerCallbackQuery failed: {e}");
                    }
                    let Some(action) = parse_callback(&query, authorized.as_deref()) else { continue };
                    if tx.send(action).is_err() {
                        tracing::info!("Telegram callback stream closed (receiver dropped)");
                        return;
                    }
                }
            }
        });

        TelegramCallbackStream { rx }
    }
}

/// sendMessage payload.
pub fn message_body(chat_id: &str, text: &str, actions: &[NoticeAction]) -> serde_json::Value {
    let mut body = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
        "parse_mode": "Markdown",
    });
    if !actions.is_empty() {
        let row: Vec<serde_json::Value> = actions
            .iter()
            .map(|a| serde_json::json!({ "text": a.label, "callback_data": a.callback.encode() }))
            .collect();
        body["reply_markup"] = serde_json::json!({ "inline_keyboard": [row] });
    }
    body
}

/// Turn a button press into a dose action, if it is one and comes from `authorized`.
pub fn parse_callback(query: &TgCallbackQuery, authorized: Option<&str>) -> Option<InboundAction> {
    let sender_id = query.from.id.to_string();
    if authorized != Some(sender_id.as_str()) {
        tracing::warn!("🚫 Ignoring callback from unauthorized user {sender_id}");
        return None;
    }
    let data = query.data.as_deref()?;
    let Some(callback) = DoseCallback::decode(data) else {
        tracing::debug!("Ignoring unknown callback data: {data}");
        return None;
    };
    Some(InboundAction { callback, sender_id })
}

/// Stream of dose actions from the callback listener.
pub struct TelegramCallbackStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<InboundAction>,
}

impl Stream for TelegramCallbackStream {
    type Item = InboundAction;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[async_trait]
impl NotifyChannel for TelegramChannel {
    fn name(&self) -> &str { "telegram" }

    async fn send(&self, recipient: &str, notice: &Notice) -> Result<()> {
        self.send_message(recipient, &notice.text, &notice.actions).await
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
struct TgResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUpdate {
    pub update_id: i64,
    pub callback_query: Option<TgCallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgCallbackQuery {
    pub id: String,
    pub from: TgUser,
    pub data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use agendabot_core::types::TimeOfDay;

    fn query(from: i64, data: &str) -> TgCallbackQuery {
        TgCallbackQuery {
            id: "q1".into(),
            from: TgUser { id: from, username: None },
            data: Some(data.into()),
        }
    }

    #[test]
    fn test_message_body_with_buttons() {
        let time = TimeOfDay::new(9, 0).unwrap();
        let actions = vec![
            NoticeAction { label: "✅ Taken".into(), callback: DoseCallback::Confirm { time } },
            NoticeAction { label: "⏰ 30 min".into(), callback: DoseCallback::Snooze { time } },
        ];
        let body = message_body("42", "pills", &actions);
        assert_eq!(body["chat_id"], "42");
        assert_eq!(body["parse_mode"], "Markdown");
        let row = &body["reply_markup"]["inline_keyboard"][0];
        assert_eq!(row[0]["callback_data"], "dose_done|09:00");
        assert_eq!(row[1]["text"], "⏰ 30 min");
    }

    #[test]
    fn test_plain_message_has_no_keyboard() {
        let body = message_body("42", "hello", &[]);
        assert!(body.get("reply_markup").is_none());
    }

    #[test]
    fn test_parse_callback_authorization() {
        let q = query(42, "dose_snooze|21:30");
        let action = parse_callback(&q, Some("42")).unwrap();
        assert_eq!(action.sender_id, "42");
        assert_eq!(action.callback, DoseCallback::Snooze { time: TimeOfDay::new(21, 30).unwrap() });

        assert!(parse_callback(&q, Some("7")).is_none());
        assert!(parse_callback(&q, None).is_none());
        assert!(parse_callback(&query(42, "comp_abc"), Some("42")).is_none());
    }

    #[test]
    fn test_update_deserialization() {
        let raw = r#"{"ok":true,"result":[{"update_id":10,"callback_query":{"id":"77","from":{"id":42,"is_bot":false,"first_name":"A"},"data":"dose_done|08:00"}},{"update_id":11}]}"#;
        let parsed: TgResponse<Vec<TgUpdate>> = serde_json::from_str(raw).unwrap();
        let updates = parsed.result.unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].callback_query.as_ref().unwrap().from.id, 42);
        assert!(updates[1].callback_query.is_none());
    }

    #[test]
    fn test_requires_token() {
        assert!(matches!(
            TelegramChannel::new(TelegramConfig::default()),
            Err(AgendaError::Config(_))
        ));
        let config = TelegramConfig { bot_token: "1:abc".into(), ..Default::default() };
        let channel = TelegramChannel::new(config).unwrap();
        assert_eq!(channel.method_url("getMe"), "https://api.telegram.org/bot1:abc/getMe");
    }
}
