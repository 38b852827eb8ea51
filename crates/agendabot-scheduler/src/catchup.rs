//! Startup catch-up for triggers missed while the process was down.

use agendabot_core::types::TimeOfDay;
use chrono::{Duration, NaiveDateTime};
use std::collections::VecDeque;
use tokio::time::Instant;

use crate::cron::TriggerSchedule;
use crate::tasks::{JobKind, OneOffJob};

/// One-off jobs to run shortly after a start at local time `now`.
///
/// At most one digest is replayed: the first configured slot that passed
/// within the lookback. The renewal sweep is replayed for today if the start
/// is after the renewal time, or for yesterday in the early morning.
pub fn compute_catchup_jobs(now: NaiveDateTime, schedule: &TriggerSchedule) -> Vec<OneOffJob> {
    let mut jobs = Vec::new();
    let current = TimeOfDay::of(&now).minutes_from_midnight();
    let lookback = schedule.catchup_lookback.num_minutes();

    let missed = schedule.digest_times.iter().find(|slot| {
        let diff = current - slot.minutes_from_midnight();
        0 < diff && diff <= lookback
    });
    if let Some(slot) = missed {
        jobs.push(OneOffJob {
            kind: JobKind::Digest { slot: *slot },
            delay: schedule.catchup_digest_delay,
            reason: format!("digest at {slot} missed {} min ago", current - slot.minutes_from_midnight()),
        });
    }

    let today = now.date();
    if current >= schedule.renewal_time.minutes_from_midnight() {
        jobs.push(OneOffJob {
            kind: JobKind::Renewal { target: today },
            delay: schedule.catchup_renewal_delay,
            reason: format!("renewal at {} missed today", schedule.renewal_time),
        });
    } else if current <= schedule.early_morning_cutoff.minutes_from_midnight() {
        let yesterday = today - Duration::days(1);
        jobs.push(OneOffJob {
            kind: JobKind::Renewal { target: yesterday },
            delay: schedule.catchup_renewal_delay,
            reason: format!("early start, renewing {yesterday}"),
        });
    }

    jobs
}

/// Catch-up jobs waiting out their delay.
///
/// Regular runs are recorded while jobs are queued; a job whose kind a regular
/// run already covered is dropped when it comes due.
pub struct CatchupQueue {
    pending: VecDeque<(Instant, OneOffJob)>,
    ran_since_start: Vec<JobKind>,
}

impl CatchupQueue {
    pub fn new(started: Instant, jobs: Vec<OneOffJob>) -> Self {
        let mut pending: Vec<(Instant, OneOffJob)> =
            jobs.into_iter().map(|job| (started + job.delay, job)).collect();
        pending.sort_by_key(|(at, _)| *at);
        Self { pending: pending.into(), ran_since_start: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &OneOffJob> {
        self.pending.iter().map(|(_, job)| job)
    }

    /// When the earliest queued job is due.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.front().map(|(at, _)| *at)
    }

    /// Note regular jobs that just ran. Ignored once the queue is drained.
    pub fn record_regular(&mut self, ran: impl IntoIterator<Item = JobKind>) {
        if !self.pending.is_empty() {
            self.ran_since_start.extend(ran);
        }
    }

    /// Pop the earliest job. `None` if the queue is empty or a regular run covered it.
    pub fn take_next(&mut self) -> Option<JobKind> {
        let (_, job) = self.pending.pop_front()?;
        let covered = self.ran_since_start.iter().any(|kind| kind.covers(&job.kind));
        if self.pending.is_empty() {
            self.ran_since_start.clear();
        }
        if covered {
            tracing::info!("⏭️ Catch-up {} dropped, its regular trigger already ran", job.kind);
            return None;
        }
        Some(job.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agendabot_core::config::AgendaConfig;
    use chrono::NaiveDate;
    use std::time::Duration as StdDuration;

    fn schedule() -> TriggerSchedule {
        TriggerSchedule::from_config(&AgendaConfig::default())
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn slot(h: u32, m: u32) -> TimeOfDay {
        TimeOfDay::new(h, m).unwrap()
    }

    #[test]
    fn test_restart_shortly_after_digest() {
        let jobs = compute_catchup_jobs(at(8, 45), &schedule());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].kind, JobKind::Digest { slot: slot(8, 30) });
        assert_eq!(jobs[0].delay, StdDuration::from_secs(10));
    }

    #[test]
    fn test_lookback_edges() {
        let s = schedule();
        assert!(compute_catchup_jobs(at(8, 30), &s).is_empty());
        assert_eq!(compute_catchup_jobs(at(9, 0), &s).len(), 1);
        assert!(compute_catchup_jobs(at(9, 1), &s).is_empty());
    }

    #[test]
    fn test_late_evening_renews_today() {
        let jobs = compute_catchup_jobs(at(23, 57), &schedule());
        assert_eq!(
            jobs.iter().map(|j| j.kind).collect::<Vec<_>>(),
            vec![JobKind::Renewal { target: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap() }]
        );
        assert_eq!(jobs[0].delay, StdDuration::from_secs(20));
    }

    #[test]
    fn test_early_morning_renews_yesterday() {
        let jobs = compute_catchup_jobs(at(0, 10), &schedule());
        let kinds: Vec<JobKind> = jobs.iter().map(|j| j.kind).collect();
        assert_eq!(
            kinds,
            vec![
                JobKind::Digest { slot: slot(0, 0) },
                JobKind::Renewal { target: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() },
            ]
        );

        let at_cutoff = compute_catchup_jobs(at(4, 0), &schedule());
        assert_eq!(at_cutoff.len(), 1);
        assert!(compute_catchup_jobs(at(4, 1), &schedule()).is_empty());
    }

    #[test]
    fn test_first_configured_match_wins() {
        let s = TriggerSchedule {
            digest_times: vec![slot(9, 0), slot(8, 45)],
            ..schedule()
        };
        let jobs = compute_catchup_jobs(at(9, 10), &s);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].kind, JobKind::Digest { slot: slot(9, 0) });
    }

    fn queued(kinds: &[(JobKind, u64)]) -> CatchupQueue {
        let jobs = kinds
            .iter()
            .map(|(kind, secs)| OneOffJob { kind: *kind, delay: StdDuration::from_secs(*secs), reason: String::new() })
            .collect();
        CatchupQueue::new(Instant::now(), jobs)
    }

    #[test]
    fn test_queue_orders_by_delay() {
        let renewal = JobKind::Renewal { target: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() };
        let digest = JobKind::Digest { slot: slot(0, 0) };
        let mut queue = queued(&[(renewal, 20), (digest, 10)]);
        assert_eq!(queue.take_next(), Some(digest));
        assert_eq!(queue.take_next(), Some(renewal));
        assert!(queue.is_empty());
        assert_eq!(queue.take_next(), None);
    }

    #[test]
    fn test_catchup_dropped_after_regular_run() {
        let mut queue = queued(&[(JobKind::Digest { slot: slot(8, 30) }, 10)]);
        queue.record_regular([JobKind::Digest { slot: slot(10, 30) }, JobKind::NearTerm]);
        assert_eq!(queue.take_next(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_catchup_runs_when_not_covered() {
        let target = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut queue = queued(&[(JobKind::Renewal { target }, 20)]);
        queue.record_regular([JobKind::NearTerm, JobKind::Renewal { target: target + Duration::days(1) }]);
        assert_eq!(queue.take_next(), Some(JobKind::Renewal { target }));
    }

    #[test]
    fn test_regular_runs_after_drain_are_ignored() {
        let mut queue = queued(&[]);
        queue.record_regular([JobKind::NearTerm]);
        assert!(queue.ran_since_start.is_empty());
        assert!(queue.next_due().is_none());
    }
}
