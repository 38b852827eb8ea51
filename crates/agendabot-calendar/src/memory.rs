//! In-memory calendar store: local dry runs and tests.

use agendabot_core::error::{AgendaError, Result};
use agendabot_core::traits::CalendarStore;
use agendabot_core::types::{CalendarItem, ItemPatch, NewItem};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct MemoryCalendar {
    tz: Tz,
    items: Mutex<Vec<CalendarItem>>,
    next_id: AtomicU64,
}

impl MemoryCalendar {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            items: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert an item directly, bypassing the async trait.
    pub fn seed(&self, item: NewItem) -> CalendarItem {
        let created = CalendarItem {
            id: format!("mem-{}", self.next_id.fetch_add(1, Ordering::Relaxed)),
            title: item.title,
            notes: item.notes,
            state: item.state,
            window: item.window,
        };
        match self.items.lock() {
            Ok(mut items) => items.push(created.clone()),
            Err(poisoned) => poisoned.into_inner().push(created.clone()),
        }
        created
    }

    /// Every stored item, in insertion order.
    pub fn snapshot(&self) -> Vec<CalendarItem> {
        match self.items.lock() {
            Ok(items) => items.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<CalendarItem>>> {
        self.items
            .lock()
            .map_err(|e| AgendaError::calendar(format!("memory calendar poisoned: {e}")))
    }
}

#[async_trait]
impl CalendarStore for MemoryCalendar {
    fn name(&self) -> &str { "memory" }

    async fn list_items(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CalendarItem>> {
        let items = self.lock()?;
        let mut found: Vec<CalendarItem> = items
            .iter()
            .filter(|item| item.window.overlaps(self.tz, start, end))
            .cloned()
            .collect();
        found.sort_by_key(|item| item.window.start_utc(self.tz));
        Ok(found)
    }

    async fn create_item(&self, item: NewItem) -> Result<CalendarItem> {
        Ok(self.seed(item))
    }

    async fn update_item(&self, id: &str, patch: ItemPatch) -> Result<CalendarItem> {
        let mut items = self.lock()?;
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| AgendaError::ItemNotFound(id.to_string()))?;
        patch.apply_to(item);
        Ok(item.clone())
    }

    async fn delete_item(&self, id: &str) -> Result<bool> {
        let mut items = self.lock()?;
        let before = items.len();
        items.retain(|item| item.id != id);
        Ok(items.len() != before)
    }
}
