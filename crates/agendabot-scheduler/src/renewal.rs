//! Task renewal: carry uncompleted all-day tasks over to the next day.
//!
//! The sweep creates the next-day copy first and only then marks the original
//! as renewed. If the process dies in between, the next sweep finds the copy
//! by title and just marks the original, so running it any number of times
//! yields one copy per task.

use agendabot_core::error::Result;
use agendabot_core::traits::CalendarStore;
use agendabot_core::types::time::{local_day_bounds, local_day_start};
use agendabot_core::types::{CalendarItem, ItemPatch, ItemState, NewItem};
use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::sync::Arc;

pub const RENEWAL_PREFIX: &str = "📌 ";

/// Title of the carried-over copy. The prefix is never doubled.
pub fn with_renewal_prefix(title: &str) -> String {
    if title.starts_with(RENEWAL_PREFIX) {
        title.to_string()
    } else {
        format!("{RENEWAL_PREFIX}{title}")
    }
}

/// Notes of the carried-over copy.
pub fn renewal_notes(original: &str, target: NaiveDate) -> String {
    let line = format!("[Renewed - not completed on {}]", target.format("%d/%m/%Y"));
    format!("{original}\n{line}").trim().to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenewalReport {
    pub target: Option<NaiveDate>,
    /// Originals copied to the next day in this run.
    pub renewed: Vec<String>,
    /// Originals whose copy already existed and were only marked.
    pub healed: Vec<String>,
    pub failed: usize,
}

impl RenewalReport {
    pub fn is_empty(&self) -> bool {
        self.renewed.is_empty() && self.healed.is_empty() && self.failed == 0
    }
}

pub struct TaskRenewer {
    calendar: Arc<dyn CalendarStore>,
    tz: Tz,
}

enum Outcome {
    Skipped,
    Renewed,
    Healed,
}

impl TaskRenewer {
    pub fn new(calendar: Arc<dyn CalendarStore>, tz: Tz) -> Self {
        Self { calendar, tz }
    }

    /// Sweep `target`'s local day. Listing failures abort; per-item failures are counted.
    pub async fn renew(&self, target: NaiveDate) -> Result<RenewalReport> {
        tracing::info!("🔄 Renewing uncompleted tasks of {target}");
        let (start, end) = local_day_bounds(self.tz, target);
        let items = self.calendar.list_items(start, end).await?;

        let mut report = RenewalReport { target: Some(target), ..Default::default() };
        let mut next_day_titles: Option<HashSet<String>> = None;

        for item in &items {
            match self.renew_item(item, target, &mut next_day_titles).await {
                Ok(Outcome::Skipped) => {}
                Ok(Outcome::Renewed) => report.renewed.push(item.title.clone()),
                Ok(Outcome::Healed) => report.healed.push(item.title.clone()),
                Err(e) => {
                    tracing::error!("❌ Renewal of '{}' failed: {e}", item.title);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "🔄 Renewal {target}: {} renewed, {} healed, {} failed",
            report.renewed.len(),
            report.healed.len(),
            report.failed
        );
        Ok(report)
    }

    async fn renew_item(
        &self,
        item: &CalendarItem,
        target: NaiveDate,
        next_day_titles: &mut Option<HashSet<String>>,
    ) -> Result<Outcome> {
        if item.state != ItemState::Open {
            return Ok(Outcome::Skipped);
        }
        let next_day = target + Duration::days(1);
        if item.window.end_utc(self.tz) > local_day_start(self.tz, next_day) {
            return Ok(Outcome::Skipped);
        }
        if !item.window.is_all_day() {
            return Ok(Outcome::Skipped);
        }

        let next_title = with_renewal_prefix(&item.title);
        if next_day_titles.is_none() {
            let (start, end) = local_day_bounds(self.tz, next_day);
            let listed = self.calendar.list_items(start, end).await?;
            *next_day_titles = Some(listed.into_iter().map(|i| i.title).collect());
        }
        let titles = next_day_titles.get_or_insert_with(HashSet::new);

        if titles.contains(&next_title) {
            self.mark_renewed(item).await?;
            tracing::warn!("🩹 '{}' already carried over, marking original", item.title);
            return Ok(Outcome::Healed);
        }

        let copy = NewItem::all_day(next_title.clone(), next_day)
            .with_notes(renewal_notes(&item.notes, target));
        self.calendar.create_item(copy).await?;
        titles.insert(next_title);
        self.mark_renewed(item).await?;
        tracing::debug!("📌 Carried '{}' over to {next_day}", item.title);
        Ok(Outcome::Renewed)
    }

    async fn mark_renewed(&self, item: &CalendarItem) -> Result<()> {
        self.calendar
            .update_item(&item.id, ItemPatch::state(ItemState::Renewed))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agendabot_calendar::MemoryCalendar;
    use agendabot_core::error::AgendaError;
    use agendabot_core::types::ItemWindow;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn tz() -> Tz {
        "America/Argentina/Buenos_Aires".parse().unwrap()
    }

    fn jan(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    async fn day_items(cal: &MemoryCalendar, date: NaiveDate) -> Vec<CalendarItem> {
        let (start, end) = local_day_bounds(tz(), date);
        cal.list_items(start, end).await.unwrap()
    }

    #[test]
    fn test_prefix_is_not_doubled() {
        assert_eq!(with_renewal_prefix("call mom"), "📌 call mom");
        assert_eq!(with_renewal_prefix("📌 call mom"), "📌 call mom");
    }

    #[test]
    fn test_renewal_notes() {
        assert_eq!(
            renewal_notes("", jan(1)),
            "[Renewed - not completed on 01/01/2024]"
        );
        assert_eq!(
            renewal_notes("bring receipts", jan(1)),
            "bring receipts\n[Renewed - not completed on 01/01/2024]"
        );
    }

    #[tokio::test]
    async fn test_uncompleted_task_moves_to_next_day() {
        let cal = Arc::new(MemoryCalendar::new(tz()));
        let original = cal.seed(NewItem::all_day("buy stamps", jan(1)));
        let renewer = TaskRenewer::new(cal.clone(), tz());

        let report = renewer.renew(jan(1)).await.unwrap();
        assert_eq!(report.renewed, vec!["buy stamps"]);
        assert_eq!(report.failed, 0);

        let next = day_items(&cal, jan(2)).await;
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].title, "📌 buy stamps");
        assert_eq!(next[0].window, ItemWindow::all_day(jan(2)));
        assert!(next[0].notes.contains("01/01/2024"));

        let stored = cal.snapshot().into_iter().find(|i| i.id == original.id).unwrap();
        assert!(stored.is_renewed());
    }

    #[tokio::test]
    async fn test_renew_is_idempotent() {
        let cal = Arc::new(MemoryCalendar::new(tz()));
        cal.seed(NewItem::all_day("buy stamps", jan(1)));
        cal.seed(NewItem::all_day("renew passport", jan(1)));
        let renewer = TaskRenewer::new(cal.clone(), tz());

        renewer.renew(jan(1)).await.unwrap();
        let second = renewer.renew(jan(1)).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(day_items(&cal, jan(2)).await.len(), 2);
    }

    #[tokio::test]
    async fn test_skips_completed_timed_and_multi_day() {
        let cal = Arc::new(MemoryCalendar::new(tz()));
        let mut done = NewItem::all_day("done already", jan(1));
        done.state = ItemState::Completed;
        cal.seed(done);
        cal.seed(NewItem {
            title: "dentist".into(),
            notes: String::new(),
            state: ItemState::Open,
            window: ItemWindow::Timed {
                start: tz().with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap().with_timezone(&Utc),
                end: tz().with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap().with_timezone(&Utc),
            },
        });
        cal.seed(NewItem {
            title: "conference".into(),
            notes: String::new(),
            state: ItemState::Open,
            window: ItemWindow::AllDay { start: jan(1), end: jan(4) },
        });

        let report = TaskRenewer::new(cal.clone(), tz()).renew(jan(1)).await.unwrap();
        assert!(report.is_empty());
        let created: Vec<CalendarItem> = cal
            .snapshot()
            .into_iter()
            .filter(|i| i.title.starts_with(RENEWAL_PREFIX))
            .collect();
        assert!(created.is_empty());
    }

    #[tokio::test]
    async fn test_existing_copy_heals_original() {
        let cal = Arc::new(MemoryCalendar::new(tz()));
        let original = cal.seed(NewItem::all_day("water plants", jan(1)));
        cal.seed(NewItem::all_day("📌 water plants", jan(2)));

        let report = TaskRenewer::new(cal.clone(), tz()).renew(jan(1)).await.unwrap();
        assert_eq!(report.healed, vec!["water plants"]);
        assert!(report.renewed.is_empty());
        assert_eq!(day_items(&cal, jan(2)).await.len(), 1);
        let stored = cal.snapshot().into_iter().find(|i| i.id == original.id).unwrap();
        assert!(stored.is_renewed());
    }

    /// Fails the first `update_item` call, like a crash right after create.
    struct FailFirstMark {
        inner: MemoryCalendar,
        failed: AtomicBool,
    }

    #[async_trait]
    impl CalendarStore for FailFirstMark {
        fn name(&self) -> &str { "fail-first-mark" }

        async fn list_items(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CalendarItem>> {
            self.inner.list_items(start, end).await
        }

        async fn create_item(&self, item: NewItem) -> Result<CalendarItem> {
            self.inner.create_item(item).await
        }

        async fn update_item(&self, id: &str, patch: ItemPatch) -> Result<CalendarItem> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(AgendaError::calendar("connection reset"));
            }
            self.inner.update_item(id, patch).await
        }

        async fn delete_item(&self, id: &str) -> Result<bool> {
            self.inner.delete_item(id).await
        }
    }

    #[tokio::test]
    async fn test_crash_between_create_and_mark_heals_next_run() {
        let flaky = Arc::new(FailFirstMark { inner: MemoryCalendar::new(tz()), failed: AtomicBool::new(false) });
        flaky.inner.seed(NewItem::all_day("file taxes", jan(1)));
        let renewer = TaskRenewer::new(flaky.clone(), tz());

        let first = renewer.renew(jan(1)).await.unwrap();
        assert_eq!(first.failed, 1);

        let second = renewer.renew(jan(1)).await.unwrap();
        assert_eq!(second.healed, vec!["file taxes"]);

        let copies = flaky
            .inner
            .snapshot()
            .into_iter()
            .filter(|i| i.title == "📌 file taxes")
            .count();
        assert_eq!(copies, 1);
    }
}
