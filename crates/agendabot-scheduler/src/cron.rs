//! Trigger schedule: which wall-clock triggers fell inside a tick window.
//!
//! The engine ticks every minute or so and asks for everything that fired in
//! `(previous tick, now]`. A late or skipped tick therefore never loses a
//! firing, it just delivers it late.

use agendabot_core::config::AgendaConfig;
use agendabot_core::types::TimeOfDay;
use agendabot_core::types::time::localize;
use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use chrono_tz::Tz;

use crate::tasks::JobKind;

/// Process-wide trigger configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSchedule {
    pub digest_times: Vec<TimeOfDay>,
    pub scan_interval: Duration,
    pub weekly_rollup: (Weekday, TimeOfDay),
    pub renewal_time: TimeOfDay,
    pub early_morning_cutoff: TimeOfDay,
    pub catchup_lookback: Duration,
    pub active_window: (TimeOfDay, TimeOfDay),
    pub catchup_digest_delay: std::time::Duration,
    pub catchup_renewal_delay: std::time::Duration,
}

/// A trigger instant and the job it asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    pub at: DateTime<Tz>,
    pub kind: JobKind,
}

impl TriggerSchedule {
    pub fn from_config(config: &AgendaConfig) -> Self {
        let s = &config.schedule;
        Self {
            digest_times: s.digest_times.clone(),
            scan_interval: Duration::minutes(i64::from(s.scan_interval_minutes.max(1))),
            weekly_rollup: (s.weekly_rollup.weekday, s.weekly_rollup.time),
            renewal_time: s.renewal_time,
            early_morning_cutoff: s.early_morning_cutoff,
            catchup_lookback: Duration::minutes(i64::from(s.catchup_lookback_minutes)),
            active_window: (s.active_window_start, s.active_window_end),
            catchup_digest_delay: std::time::Duration::from_secs(config.jobs.catchup_digest_delay_secs),
            catchup_renewal_delay: std::time::Duration::from_secs(config.jobs.catchup_renewal_delay_secs),
        }
    }

    /// Inclusive on both ends; an end before the start wraps past midnight.
    pub fn in_active_window(&self, t: TimeOfDay) -> bool {
        let (start, end) = self.active_window;
        if start <= end {
            start <= t && t <= end
        } else {
            t >= start || t <= end
        }
    }

    /// The first configured digest slot, greeted as the start of the day.
    pub fn first_digest(&self) -> Option<TimeOfDay> {
        self.digest_times.first().copied()
    }

    /// Every trigger whose instant lies in `(prev, now]`, in chronological order.
    ///
    /// Windows longer than a day are clamped to the last day. Several digest
    /// slots in one window collapse into the latest one.
    pub fn fired_between(&self, tz: Tz, prev: DateTime<Utc>, now: DateTime<Utc>) -> Vec<Firing> {
        let prev = prev.max(now - Duration::days(1));
        if prev >= now {
            return Vec::new();
        }

        let mut fired = Vec::new();
        let mut date = prev.with_timezone(&tz).date_naive();
        let last = now.with_timezone(&tz).date_naive();
        let in_window = |t: TimeOfDay, date| {
            let at = localize(tz, t.on(date));
            let utc = at.with_timezone(&Utc);
            (prev < utc && utc <= now).then_some(at)
        };

        while date <= last {
            let mut digest: Option<Firing> = None;
            for slot in &self.digest_times {
                if let Some(at) = in_window(*slot, date) {
                    if digest.as_ref().is_none_or(|d| d.at < at) {
                        digest = Some(Firing { at, kind: JobKind::Digest { slot: *slot } });
                    }
                }
            }
            fired.extend(digest);

            if let Some(at) = in_window(self.renewal_time, date) {
                fired.push(Firing { at, kind: JobKind::Renewal { target: date } });
            }
            let (weekday, time) = self.weekly_rollup;
            if date.weekday() == weekday {
                if let Some(at) = in_window(time, date) {
                    fired.push(Firing { at, kind: JobKind::WeeklyRollup });
                }
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }

        // Keep only the latest digest across day boundaries too.
        if let Some(latest) = fired
            .iter()
            .filter(|f| matches!(f.kind, JobKind::Digest { .. }))
            .map(|f| f.at)
            .max()
        {
            fired.retain(|f| !matches!(f.kind, JobKind::Digest { .. }) || f.at == latest);
        }

        let step = self.scan_interval.num_seconds().max(1);
        let boundary = now.timestamp().div_euclid(step) * step;
        if boundary > prev.timestamp() {
            if let Some(at) = DateTime::<Utc>::from_timestamp(boundary, 0) {
                fired.push(Firing { at: at.with_timezone(&tz), kind: JobKind::NearTerm });
            }
        }

        fired.sort_by_key(|f| f.at);
        fired
    }
}
