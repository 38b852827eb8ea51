//! # agendabot channels
//!
//! Notify channels for the scheduler's router: Telegram (buttons and
//! callback listener) and an outbound JSON webhook.

pub mod telegram;
pub mod webhook;

use agendabot_core::config::ChannelConfig;
use agendabot_core::error::Result;
use agendabot_core::traits::NotifyChannel;
use std::sync::Arc;

pub use telegram::{TelegramCallbackStream, TelegramChannel};
pub use webhook::WebhookChannel;

/// Enabled channels in delivery priority order: Telegram, then webhook.
pub fn create_channels(config: &ChannelConfig) -> Result<Vec<Arc<dyn NotifyChannel>>> {
    let mut channels: Vec<Arc<dyn NotifyChannel>> = Vec::new();

    if let Some(tg) = config.telegram.as_ref().filter(|c| c.enabled) {
        channels.push(Arc::new(TelegramChannel::new(tg.clone())?));
    }
    if let Some(wh) = config.webhook.as_ref().filter(|c| c.enabled && c.outbound_url.is_some()) {
        channels.push(Arc::new(WebhookChannel::new(wh.clone())));
    }
    Ok(channels)
}
