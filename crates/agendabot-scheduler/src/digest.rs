//! Agenda digest composer.
//!
//! Reads a window of calendar items and splits it into what still needs doing
//! today ("pending") and timed items starting soon ("upcoming"). Read-only
//! apart from [`AgendaDigest::complete_item`].

use agendabot_core::config::JobsConfig;
use agendabot_core::error::Result;
use agendabot_core::traits::CalendarStore;
use agendabot_core::types::time::local_day_bounds;
use agendabot_core::types::{CalendarItem, ItemPatch, ItemState, ItemWindow};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

/// Timed items at least this long are treated like tasks and stay pending
/// after they started.
pub const LONG_ITEM_THRESHOLD_HOURS: i64 = 12;

/// Classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestPolicy {
    pub long_item_threshold: Duration,
    /// A timed item that started less than this long ago is still pending.
    pub recent_grace: Duration,
    pub upcoming_horizon: Duration,
}

impl Default for DigestPolicy {
    fn default() -> Self {
        Self {
            long_item_threshold: Duration::hours(LONG_ITEM_THRESHOLD_HOURS),
            recent_grace: Duration::minutes(60),
            upcoming_horizon: Duration::minutes(120),
        }
    }
}

impl From<&JobsConfig> for DigestPolicy {
    fn from(jobs: &JobsConfig) -> Self {
        Self {
            long_item_threshold: Duration::hours(jobs.long_item_hours),
            recent_grace: Duration::minutes(jobs.recent_grace_minutes),
            upcoming_horizon: Duration::minutes(jobs.upcoming_horizon_minutes),
        }
    }
}

/// A timed item starting within the horizon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingItem {
    pub item: CalendarItem,
    /// Whole minutes until start, truncated.
    pub minutes_until: i64,
}

impl UpcomingItem {
    /// "in 45 min" or "in 1h 30min".
    pub fn time_remaining(&self) -> String {
        if self.minutes_until < 60 {
            format!("in {} min", self.minutes_until)
        } else {
            format!("in {}h {}min", self.minutes_until / 60, self.minutes_until % 60)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Digest {
    pub pending: Vec<CalendarItem>,
    pub upcoming: Vec<UpcomingItem>,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.upcoming.is_empty()
    }
}

/// Whether an item belongs in the pending list at `now`.
///
/// A timed item with no real end (zero length) is open-ended and always pending.
pub fn is_pending(item: &CalendarItem, now: DateTime<Utc>, policy: &DigestPolicy) -> bool {
    if item.state == ItemState::Completed {
        return false;
    }
    match &item.window {
        ItemWindow::AllDay { .. } => true,
        ItemWindow::Timed { start, end } => {
            if *end <= *start || *start >= now - policy.recent_grace {
                return true;
            }
            *end - *start >= policy.long_item_threshold
        }
    }
}

/// Minutes until an item starts, if it is timed, open and within the horizon.
pub fn upcoming_in(item: &CalendarItem, now: DateTime<Utc>, policy: &DigestPolicy) -> Option<UpcomingItem> {
    if item.is_completed() {
        return None;
    }
    let ItemWindow::Timed { start, .. } = item.window else {
        return None;
    };
    let until = start - now;
    if until <= Duration::zero() || until > policy.upcoming_horizon {
        return None;
    }
    Some(UpcomingItem { item: item.clone(), minutes_until: until.num_minutes() })
}

/// Split items into pending and upcoming. Input order is preserved.
pub fn classify(items: &[CalendarItem], now: DateTime<Utc>, policy: &DigestPolicy) -> Digest {
    Digest {
        pending: items
            .iter()
            .filter(|item| is_pending(item, now, policy))
            .cloned()
            .collect(),
        upcoming: items
            .iter()
            .filter_map(|item| upcoming_in(item, now, policy))
            .collect(),
    }
}

pub struct AgendaDigest {
    calendar: Arc<dyn CalendarStore>,
    tz: Tz,
    policy: DigestPolicy,
}

impl AgendaDigest {
    pub fn new(calendar: Arc<dyn CalendarStore>, tz: Tz, policy: DigestPolicy) -> Self {
        Self { calendar, tz, policy }
    }

    pub fn policy(&self) -> &DigestPolicy {
        &self.policy
    }

    /// Digest of the items overlapping `[start, end]`, evaluated at `now`.
    pub async fn digest(&self, start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Result<Digest> {
        let items = self.calendar.list_items(start, end).await?;
        let digest = classify(&items, now, &self.policy);
        tracing::debug!(
            "📋 Digest: {} items, {} pending, {} upcoming",
            items.len(),
            digest.pending.len(),
            digest.upcoming.len()
        );
        Ok(digest)
    }

    /// Digest of the local day containing `now`.
    pub async fn today(&self, now: &DateTime<Tz>) -> Result<Digest> {
        let (start, end) = local_day_bounds(self.tz, now.date_naive());
        self.digest(start, end, now.with_timezone(&Utc)).await
    }

    /// Items starting within the horizon, even if that crosses midnight.
    pub async fn upcoming(&self, now: DateTime<Utc>) -> Result<Vec<UpcomingItem>> {
        let items = self.calendar.list_items(now, now + self.policy.upcoming_horizon).await?;
        Ok(items
            .iter()
            .filter_map(|item| upcoming_in(item, now, &self.policy))
            .collect())
    }

    /// Mark an item completed so reminders and renewal skip it from now on.
    pub async fn complete_item(&self, id: &str) -> Result<CalendarItem> {
        let item = self.calendar.update_item(id, ItemPatch::state(ItemState::Completed)).await?;
        tracing::info!("✅ Completed: {}", item.title);
        Ok(item)
    }
}
