//! Notification channel trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Notice;

/// Fire-and-forget delivery to a single recipient.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, recipient: &str, notice: &Notice) -> Result<()>;
}
