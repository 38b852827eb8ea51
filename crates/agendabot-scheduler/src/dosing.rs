//! Dose tracker: due-now sets and taken/snoozed transitions over the dose store.

use agendabot_core::error::{AgendaError, Result};
use agendabot_core::types::{DoseGroup, DoseSchedule, TimeOfDay};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::path::Path;

use crate::store::DoseStore;

/// Whether a schedule needs a notice at `now`.
///
/// Taken today never counts. A snooze anchor, when present, replaces the
/// nominal time.
pub fn is_due(dose: &DoseSchedule, now: &DateTime<Tz>) -> bool {
    if !dose.active || dose.taken_on(now.date_naive()) {
        return false;
    }
    match dose.next_reminder {
        Some(anchor) => now.with_timezone(&Utc) >= anchor,
        None => now.time() >= dose.time.as_naive(),
    }
}

/// Batch doses by time key, one group per key, earliest first.
pub fn group_by_time(doses: Vec<DoseSchedule>) -> Vec<DoseGroup> {
    let mut groups: BTreeMap<TimeOfDay, Vec<DoseSchedule>> = BTreeMap::new();
    for dose in doses {
        groups.entry(dose.time).or_default().push(dose);
    }
    groups
        .into_iter()
        .map(|(time, doses)| DoseGroup { time, doses })
        .collect()
}

pub struct DoseTracker {
    store: DoseStore,
    tz: Tz,
}

impl DoseTracker {
    pub fn new(store: DoseStore, tz: Tz) -> Self {
        Self { store, tz }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    /// Register a new daily dose. Returns `false` if the same name (any case)
    /// is already scheduled at that time.
    pub fn add_supplement(&self, name: &str, time: &str) -> Result<bool> {
        let time = TimeOfDay::parse(time)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AgendaError::Other("supplement name is empty".into()));
        }
        let added = self.store.update(|records| {
            if records.iter().any(|r| r.same_key(name, time)) {
                return false;
            }
            records.push(DoseSchedule::new(name, time));
            true
        })?;
        if added {
            tracing::info!("💊 Scheduled {name} daily at {time}");
        } else {
            tracing::debug!("💊 {name} at {time} already scheduled");
        }
        Ok(added)
    }

    pub fn list(&self) -> Vec<DoseSchedule> {
        self.store.load()
    }

    /// Pause or resume a schedule. Returns `false` for an unknown id.
    pub fn set_active(&self, id: &str, active: bool) -> Result<bool> {
        self.store.update(|records| {
            match records.iter_mut().find(|r| r.id == id) {
                Some(record) => {
                    record.active = active;
                    true
                }
                None => false,
            }
        })
    }

    /// Schedules due at `now`, in store order.
    pub fn pending(&self, now: &DateTime<Tz>) -> Vec<DoseSchedule> {
        self.store
            .load()
            .into_iter()
            .filter(|dose| is_due(dose, now))
            .collect()
    }

    /// Due schedules batched by time key.
    pub fn pending_groups(&self, now: &DateTime<Tz>) -> Vec<DoseGroup> {
        group_by_time(self.pending(now))
    }

    /// Record the doses as taken on `date` and clear their snooze anchors.
    pub fn mark_taken(&self, ids: &[String], date: NaiveDate) -> Result<usize> {
        self.store.update(|records| {
            let mut changed = 0;
            for record in records.iter_mut().filter(|r| ids.contains(&r.id)) {
                record.last_taken_date = Some(date);
                record.next_reminder = None;
                changed += 1;
            }
            changed
        })
    }

    /// Defer the doses until `until`. The taken date is left alone.
    pub fn snooze(&self, ids: &[String], until: DateTime<Utc>) -> Result<usize> {
        self.store.update(|records| {
            let mut changed = 0;
            for record in records.iter_mut().filter(|r| ids.contains(&r.id)) {
                record.next_reminder = Some(until);
                changed += 1;
            }
            changed
        })
    }

    fn active_ids_at(&self, time: TimeOfDay) -> Vec<DoseSchedule> {
        self.store
            .load()
            .into_iter()
            .filter(|r| r.active && r.time == time)
            .collect()
    }

    /// Confirm every active dose at `time`. Returns the confirmed names.
    pub fn confirm_all_in_group(&self, time: TimeOfDay, date: NaiveDate) -> Result<Vec<String>> {
        let group = self.active_ids_at(time);
        let ids: Vec<String> = group.iter().map(|d| d.id.clone()).collect();
        self.mark_taken(&ids, date)?;
        Ok(group.into_iter().map(|d| d.name).collect())
    }

    /// Snooze every active dose at `time`. Returns the snoozed names.
    pub fn snooze_group(&self, time: TimeOfDay, until: DateTime<Utc>) -> Result<Vec<String>> {
        let group = self.active_ids_at(time);
        let ids: Vec<String> = group.iter().map(|d| d.id.clone()).collect();
        self.snooze(&ids, until)?;
        Ok(group.into_iter().map(|d| d.name).collect())
    }
}
