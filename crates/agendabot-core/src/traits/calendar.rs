//! Calendar store trait: the remote calendar the scheduler reads and patches.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{CalendarItem, ItemPatch, NewItem};

/// Remote calendar. Calls may fail transiently; the scheduler never retries
/// inside a job and relies on the next tick instead.
#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Items overlapping `[start, end]`, ordered by start, recurring items expanded.
    async fn list_items(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CalendarItem>>;

    async fn create_item(&self, item: NewItem) -> Result<CalendarItem>;

    async fn update_item(&self, id: &str, patch: ItemPatch) -> Result<CalendarItem>;

    /// Returns `false` when the item did not exist.
    async fn delete_item(&self, id: &str) -> Result<bool>;
}
