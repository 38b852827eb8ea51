//! Supplement dose schedules.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::time::TimeOfDay;

fn default_true() -> bool { true }

/// One daily supplement reminder, as persisted in the dose store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoseSchedule {
    pub id: String,
    pub name: String,
    /// Nominal daily trigger.
    pub time: TimeOfDay,
    #[serde(default)]
    pub last_taken_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Snooze anchor. When set it replaces `time` for the due check.
    #[serde(default)]
    pub next_reminder: Option<DateTime<Utc>>,
}

impl DoseSchedule {
    pub fn new(name: impl Into<String>, time: TimeOfDay) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            time,
            last_taken_date: None,
            active: true,
            next_reminder: None,
        }
    }

    pub fn taken_on(&self, date: NaiveDate) -> bool {
        self.last_taken_date == Some(date)
    }

    /// Creation-time uniqueness key: case-insensitive name plus time.
    pub fn same_key(&self, name: &str, time: TimeOfDay) -> bool {
        self.time == time && self.name.to_lowercase() == name.trim().to_lowercase()
    }
}

/// Doses sharing one time key, notified and confirmed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoseGroup {
    pub time: TimeOfDay,
    pub doses: Vec<DoseSchedule>,
}

impl DoseGroup {
    pub fn ids(&self) -> Vec<String> {
        self.doses.iter().map(|d| d.id.clone()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.doses.iter().map(|d| d.name.clone()).collect()
    }
}
