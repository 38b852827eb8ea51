//! Webhook channel: POST notices as JSON to an external endpoint.
//!
//! Useful for bridging to systems without a native channel (n8n, Home Assistant, custom APIs).
//! Delivery is one-way, so dose buttons are left out; doses are confirmed over Telegram.

use agendabot_core::config::WebhookConfig;
use agendabot_core::error::{AgendaError, Result};
use agendabot_core::traits::NotifyChannel;
use agendabot_core::types::Notice;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Header carrying the body signature on outbound requests.
pub const SIGNATURE_HEADER: &str = "X-Agendabot-Signature";

/// Hex sha256 over `secret` followed by `payload`.
pub fn sign(secret: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{secret}{payload}"));
    format!("{:x}", hasher.finalize())
}

/// Webhook channel.
pub struct WebhookChannel {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Outbound body for a notice. Action buttons are dropped.
    pub fn payload(recipient: &str, notice: &Notice) -> serde_json::Value {
        serde_json::json!({
            "recipient": recipient,
            "text": notice.text,
        })
    }
}

#[async_trait]
impl NotifyChannel for WebhookChannel {
    fn name(&self) -> &str { "webhook" }

    async fn send(&self, recipient: &str, notice: &Notice) -> Result<()> {
        let url = self.config.outbound_url.as_deref()
            .ok_or_else(|| AgendaError::config("webhook.outbound_url is not set"))?;

        let body = serde_json::to_string(&Self::payload(recipient, notice))?;
        let mut request = self.client.post(url)
            .header("Content-Type", "application/json");
        if let Some(secret) = &self.config.secret {
            request = request.header(SIGNATURE_HEADER, sign(secret, &body));
        }

        let response = request.body(body).send().await
            .map_err(|e| AgendaError::Channel(format!("Webhook send failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AgendaError::Channel(format!("Webhook {status}: {text}")));
        }
        tracing::debug!("🔗 Webhook delivered to {url}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agendabot_core::types::{DoseCallback, NoticeAction, TimeOfDay};

    fn channel(secret: Option<&str>) -> WebhookChannel {
        WebhookChannel::new(WebhookConfig {
            outbound_url: None,
            secret: secret.map(String::from),
            enabled: true,
        })
    }

    #[test]
    fn test_payload_drops_buttons() {
        let time = TimeOfDay::new(8, 0).unwrap();
        let notice = Notice::with_actions(
            "💊 Omega3",
            vec![NoticeAction { label: "✅ Taken".into(), callback: DoseCallback::Confirm { time } }],
        );
        let body = WebhookChannel::payload("42", &notice);
        assert_eq!(body["recipient"], "42");
        assert_eq!(body["text"], "💊 Omega3");
        assert!(body.get("actions").is_none());
    }

    #[test]
    fn test_sign_is_stable_hex() {
        let sig = sign("k", "{}");
        assert_eq!(sig.len(), 64);
        assert_eq!(sig, sign("k", "{}"));
        assert_ne!(sig, sign("other", "{}"));
    }

    #[tokio::test]
    async fn test_send_without_url_is_config_error() {
        let err = channel(None).send("42", &Notice::text("hi")).await.unwrap_err();
        assert!(matches!(err, AgendaError::Config(_)));
    }
}
