//! Notification routing: deliver a notice to the authorized recipient
//! through the first channel that accepts it.
//!
//! ```text
//! NotifyRouter
//!   ├── Telegram (priority 1)
//!   └── Webhook  (priority 2)
//! ```

use agendabot_core::error::{AgendaError, Result};
use agendabot_core::traits::NotifyChannel;
use agendabot_core::types::Notice;
use std::sync::Arc;

pub struct NotifyRouter {
    recipient: Option<String>,
    channels: Vec<Arc<dyn NotifyChannel>>,
}

impl NotifyRouter {
    pub fn new(recipient: Option<String>) -> Self {
        Self { recipient, channels: Vec::new() }
    }

    /// Append a channel; earlier channels are tried first.
    pub fn with_channel(mut self, channel: Arc<dyn NotifyChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Returns `Ok(false)` when delivery was skipped (no recipient or no channel).
    pub async fn send(&self, notice: &Notice) -> Result<bool> {
        let Some(recipient) = self.recipient.as_deref() else {
            tracing::warn!("⚠️ No authorized recipient configured, notice not sent");
            return Ok(false);
        };
        if self.channels.is_empty() {
            tracing::warn!("⚠️ No notification channel configured, notice not sent");
            return Ok(false);
        }

        let mut last_err = None;
        for channel in &self.channels {
            match channel.send(recipient, notice).await {
                Ok(()) => {
                    tracing::debug!("📤 Notice delivered via {}", channel.name());
                    return Ok(true);
                }
                Err(e) => {
                    tracing::warn!("⚠️ {} delivery failed: {e}", channel.name());
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| AgendaError::channel("all channels failed")))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every notice; optionally fails.
    pub struct RecordingChannel {
        pub fail: bool,
        pub sent: Mutex<Vec<(String, Notice)>>,
    }

    impl RecordingChannel {
        pub fn new() -> Arc<Self> {
            Arc::new(Self { fail: false, sent: Mutex::new(Vec::new()) })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self { fail: true, sent: Mutex::new(Vec::new()) })
        }

        pub fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(_, n)| n.text.clone()).collect()
        }

        pub fn notices(&self) -> Vec<Notice> {
            self.sent.lock().unwrap().iter().map(|(_, n)| n.clone()).collect()
        }
    }

    #[async_trait]
    impl NotifyChannel for RecordingChannel {
        fn name(&self) -> &str {
            if self.fail { "broken" } else { "recording" }
        }

        async fn send(&self, recipient: &str, notice: &Notice) -> Result<()> {
            if self.fail {
                return Err(AgendaError::channel("unreachable"));
            }
            self.sent.lock().unwrap().push((recipient.to_string(), notice.clone()));
            Ok(())
        }
    }
}
