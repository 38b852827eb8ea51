//! Scheduler engine: the single loop that fires triggers, runs jobs and
//! applies dose callbacks.
//!
//! Everything runs sequentially on one task, so jobs never overlap and the
//! dose store has exactly one writer.

use agendabot_core::config::AgendaConfig;
use agendabot_core::error::{AgendaError, Result};
use agendabot_core::traits::CalendarStore;
use agendabot_core::types::{DoseCallback, InboundAction, Notice, TimeOfDay};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::catchup::{compute_catchup_jobs, CatchupQueue};
use crate::cron::TriggerSchedule;
use crate::digest::{AgendaDigest, DigestPolicy};
use crate::dosing::DoseTracker;
use crate::notify::NotifyRouter;
use crate::renewal::TaskRenewer;
use crate::tasks::JobKind;
use crate::{render, rollup};

pub struct SchedulerEngine {
    tz: Tz,
    schedule: TriggerSchedule,
    calendar: Arc<dyn CalendarStore>,
    composer: AgendaDigest,
    renewer: TaskRenewer,
    tracker: DoseTracker,
    router: NotifyRouter,
    tick: std::time::Duration,
    job_timeout: std::time::Duration,
    snooze: chrono::Duration,
    /// Near-term items already announced, per local day.
    announced: HashSet<(NaiveDate, String)>,
}

impl SchedulerEngine {
    pub fn new(
        config: &AgendaConfig,
        calendar: Arc<dyn CalendarStore>,
        tracker: DoseTracker,
        router: NotifyRouter,
    ) -> Result<Self> {
        config.validate()?;
        let tz = config.tz()?;
        Ok(Self {
            tz,
            schedule: TriggerSchedule::from_config(config),
            composer: AgendaDigest::new(calendar.clone(), tz, DigestPolicy::from(&config.jobs)),
            renewer: TaskRenewer::new(calendar.clone(), tz),
            calendar,
            tracker,
            router,
            tick: std::time::Duration::from_secs(config.jobs.tick_secs),
            job_timeout: std::time::Duration::from_secs(config.jobs.timeout_secs),
            snooze: chrono::Duration::minutes(config.jobs.snooze_minutes),
            announced: HashSet::new(),
        })
    }

    pub fn schedule(&self) -> &TriggerSchedule {
        &self.schedule
    }

    pub fn tracker(&self) -> &DoseTracker {
        &self.tracker
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    // ═══ Jobs ═══

    /// Run one job to completion. Errors are returned, not logged.
    pub async fn run_job(&mut self, kind: JobKind, now: DateTime<Tz>) -> Result<()> {
        match kind {
            JobKind::Digest { slot } => self.send_digest(slot, &now).await,
            JobKind::NearTerm => self.announce_near_term(&now).await,
            JobKind::DoseScan => self.scan_doses(&now).await,
            JobKind::WeeklyRollup => {
                let r = rollup::weekly_rollup(self.calendar.as_ref(), self.tz, now.date_naive()).await?;
                self.router.send(&Notice::text(render::rollup(&r))).await?;
                Ok(())
            }
            JobKind::Renewal { target } => {
                let report = self.renewer.renew(target).await?;
                self.router.send(&Notice::text(render::renewal(&report))).await?;
                Ok(())
            }
        }
    }

    async fn send_digest(&mut self, slot: TimeOfDay, now: &DateTime<Tz>) -> Result<()> {
        if !self.schedule.in_active_window(slot) {
            tracing::debug!("🌙 Digest slot {slot} outside the active window, skipping");
            return Ok(());
        }
        tracing::info!("⏰ Agenda digest ({slot})");
        let digest = self.composer.today(now).await?;
        let first_slot = self.schedule.first_digest() == Some(slot);
        self.router.send(&Notice::text(render::digest(&digest, now, first_slot))).await?;
        Ok(())
    }

    async fn announce_near_term(&mut self, now: &DateTime<Tz>) -> Result<()> {
        let today = now.date_naive();
        self.announced.retain(|(day, _)| *day >= today);

        let upcoming: Vec<_> = self
            .composer
            .upcoming(now.with_timezone(&Utc))
            .await?
            .into_iter()
            .filter(|up| !self.announced.contains(&(today, up.item.id.clone())))
            .collect();
        if upcoming.is_empty() {
            return Ok(());
        }

        self.router.send(&Notice::text(render::upcoming(&upcoming))).await?;
        for up in &upcoming {
            self.announced.insert((today, up.item.id.clone()));
        }
        Ok(())
    }

    async fn scan_doses(&mut self, now: &DateTime<Tz>) -> Result<()> {
        let groups = self.tracker.pending_groups(now);
        let until = now.with_timezone(&Utc) + self.snooze;
        for group in groups {
            tracing::info!("💊 Dose reminder {}: {}", group.time, group.names().join(", "));
            let notice = render::dose_group(&group, self.snooze.num_minutes());
            self.router.send(&notice).await?;
            self.tracker.snooze(&group.ids(), until)?;
        }
        Ok(())
    }

    /// Run a job under the per-job timeout. Failures are logged; returns success.
    pub async fn run_guarded(&mut self, kind: JobKind, now: DateTime<Tz>) -> bool {
        let limit = self.job_timeout;
        match tokio::time::timeout(limit, self.run_job(kind, now)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) if e.is_transient() => {
                tracing::warn!("⚠️ Job {kind} failed, will retry on its next trigger: {e}");
                false
            }
            Ok(Err(e)) => {
                tracing::error!("❌ Job {kind} failed: {e}");
                false
            }
            Err(_) => {
                tracing::error!("⏱️ Job {kind} timed out after {limit:?}");
                false
            }
        }
    }

    // ═══ Callbacks ═══

    /// Apply a dose button press from the authorized recipient.
    pub async fn handle_action(&mut self, action: InboundAction, now: DateTime<Tz>) -> Result<()> {
        match self.router.recipient() {
            Some(recipient) if recipient == action.sender_id => {}
            _ => {
                return Err(AgendaError::Other(format!(
                    "dose action from unauthorized sender {}",
                    action.sender_id
                )));
            }
        }

        let reply = match action.callback {
            DoseCallback::Confirm { time } => {
                let names = self.tracker.confirm_all_in_group(time, now.date_naive())?;
                tracing::info!("✅ Doses at {time} taken: {}", names.join(", "));
                render::doses_confirmed(&names)
            }
            DoseCallback::Snooze { time } => {
                let until = now.with_timezone(&Utc) + self.snooze;
                let names = self.tracker.snooze_group(time, until)?;
                tracing::info!("⏳ Doses at {time} snoozed until {until}");
                render::doses_snoozed(&names, self.snooze.num_minutes())
            }
        };
        self.router.send(&Notice::text(reply)).await?;
        Ok(())
    }

    // ═══ Loop ═══

    /// Run everything that fired in `(prev, now]`, then the dose scan.
    /// Returns the regular jobs that were attempted.
    pub async fn on_tick(&mut self, prev: DateTime<Utc>, now: DateTime<Utc>) -> Vec<JobKind> {
        let local = now.with_timezone(&self.tz);
        let mut ran = Vec::new();
        for firing in self.schedule.fired_between(self.tz, prev, now) {
            tracing::debug!("🔔 Trigger {} (due {})", firing.kind, firing.at.format("%H:%M"));
            self.run_guarded(firing.kind, local).await;
            ran.push(firing.kind);
        }
        self.run_guarded(JobKind::DoseScan, local).await;
        ran
    }

    /// Drive the engine until `shutdown` resolves.
    pub async fn run(mut self, mut actions: mpsc::Receiver<InboundAction>, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        let mut catchup = CatchupQueue::new(
            Instant::now(),
            compute_catchup_jobs(self.now().naive_local(), &self.schedule),
        );
        for job in catchup.jobs() {
            tracing::info!("⏪ Catch-up {} in {:?}: {}", job.kind, job.delay, job.reason);
        }

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut prev = Utc::now();
        let mut actions_open = true;

        tracing::info!(
            "🚀 Scheduler running (tz {}, {} digest slots, renewal at {})",
            self.tz,
            self.schedule.digest_times.len(),
            self.schedule.renewal_time
        );

        loop {
            let next_catchup = catchup.next_due();
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("🛑 Scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let now = Utc::now();
                    let ran = self.on_tick(prev, now).await;
                    catchup.record_regular(ran);
                    prev = now;
                }
                _ = tokio::time::sleep_until(next_catchup.unwrap_or_else(Instant::now)), if next_catchup.is_some() => {
                    if let Some(kind) = catchup.take_next() {
                        let now = self.now();
                        self.run_guarded(kind, now).await;
                    }
                }
                action = actions.recv(), if actions_open => match action {
                    Some(action) => {
                        let now = self.now();
                        if let Err(e) = self.handle_action(action, now).await {
                            tracing::warn!("⚠️ Dose action not applied: {e}");
                        }
                    }
                    None => {
                        tracing::debug!("Action channel closed");
                        actions_open = false;
                    }
                }
            }
        }
    }
}
