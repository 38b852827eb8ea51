//! Calendar item types.
//!
//! The remote store has no custom fields, so completion and renewal used to be
//! written into the description as marker text. Here they are a first-class
//! [`ItemState`]; [`ItemState::decode_notes`] and [`ItemState::encode_notes`]
//! translate to and from the description format for adapters that need it.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::time::local_day_start;

/// Marker line written for completed items.
pub const COMPLETED_MARKER: &str = "[COMPLETED]";
/// Marker line written on originals that were migrated to the next day.
pub const RENEWED_MARKER: &str = "[RENEWED]";
/// Completion markers left behind by older deployments of the bot.
const LEGACY_COMPLETED_MARKERS: &[&str] = &["[COMPLETADA]"];

/// Lifecycle state of a calendar item as far as reminders are concerned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    #[default]
    Open,
    Completed,
    Renewed,
}

impl std::fmt::Display for ItemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemState::Open => write!(f, "open"),
            ItemState::Completed => write!(f, "completed"),
            ItemState::Renewed => write!(f, "renewed"),
        }
    }
}

impl ItemState {
    /// Split a raw description into state and user notes.
    ///
    /// Markers are recognised anywhere in the text. Completed wins over renewed.
    pub fn decode_notes(raw: &str) -> (ItemState, String) {
        let mut completed = false;
        let mut renewed = false;
        let mut kept = Vec::new();

        for line in raw.lines() {
            let mut rest = line.to_string();
            for marker in std::iter::once(&COMPLETED_MARKER).chain(LEGACY_COMPLETED_MARKERS) {
                if rest.contains(*marker) {
                    completed = true;
                    rest = rest.replace(*marker, "");
                }
            }
            if rest.contains(RENEWED_MARKER) {
                renewed = true;
                rest = rest.replace(RENEWED_MARKER, "");
            }
            let leftover = rest.trim();
            // "✅" decorated the completion marker in older descriptions.
            if rest.len() != line.len() && (leftover.is_empty() || leftover == "✅") {
                continue;
            }
            kept.push(rest);
        }

        let state = if completed {
            ItemState::Completed
        } else if renewed {
            ItemState::Renewed
        } else {
            ItemState::Open
        };
        (state, kept.join("\n").trim().to_string())
    }

    /// Render state and user notes back into a description.
    pub fn encode_notes(self, notes: &str) -> String {
        let notes = notes.trim();
        let marker = match self {
            ItemState::Open => return notes.to_string(),
            ItemState::Completed => COMPLETED_MARKER,
            ItemState::Renewed => RENEWED_MARKER,
        };
        if notes.is_empty() {
            marker.to_string()
        } else {
            format!("{marker}\n{notes}")
        }
    }
}

/// When an item happens: a date-only task or a timestamped meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemWindow {
    /// `end` is exclusive, like the remote store's all-day ranges.
    AllDay { start: NaiveDate, end: NaiveDate },
    Timed { start: DateTime<Utc>, end: DateTime<Utc> },
}

impl ItemWindow {
    /// A single all-day slot on `date`.
    pub fn all_day(date: NaiveDate) -> Self {
        ItemWindow::AllDay { start: date, end: date + Duration::days(1) }
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, ItemWindow::AllDay { .. })
    }

    pub fn start_utc(&self, tz: Tz) -> DateTime<Utc> {
        match self {
            ItemWindow::AllDay { start, .. } => local_day_start(tz, *start),
            ItemWindow::Timed { start, .. } => *start,
        }
    }

    pub fn end_utc(&self, tz: Tz) -> DateTime<Utc> {
        match self {
            ItemWindow::AllDay { end, .. } => local_day_start(tz, *end),
            ItemWindow::Timed { end, .. } => *end,
        }
    }

    /// Whether the window intersects the inclusive range `[from, to]`.
    pub fn overlaps(&self, tz: Tz, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.start_utc(tz) <= to && self.end_utc(tz) > from
    }
}

/// A calendar entry as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub state: ItemState,
    pub window: ItemWindow,
}

impl CalendarItem {
    pub fn is_completed(&self) -> bool {
        self.state == ItemState::Completed
    }

    pub fn is_renewed(&self) -> bool {
        self.state == ItemState::Renewed
    }
}

/// Fields for a new calendar item. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub title: String,
    pub notes: String,
    pub state: ItemState,
    pub window: ItemWindow,
}

impl NewItem {
    pub fn all_day(title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            notes: String::new(),
            state: ItemState::Open,
            window: ItemWindow::all_day(date),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Partial update; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub state: Option<ItemState>,
}

impl ItemPatch {
    pub fn state(state: ItemState) -> Self {
        Self { state: Some(state), ..Default::default() }
    }

    /// Apply the patch to an in-memory item.
    pub fn apply_to(&self, item: &mut CalendarItem) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(notes) = &self.notes {
            item.notes = notes.clone();
        }
        if let Some(state) = self.state {
            item.state = state;
        }
    }
}
