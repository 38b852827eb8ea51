//! Weekly completion rollup.

use agendabot_core::error::Result;
use agendabot_core::traits::CalendarStore;
use agendabot_core::types::time::local_day_bounds;
use agendabot_core::types::{CalendarItem, ItemState};
use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;

/// Days covered by the rollup, today included.
pub const ROLLUP_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rollup {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total: usize,
    pub completed: usize,
}

impl Rollup {
    /// Completed share, rounded down. An empty week counts as 0%.
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.completed * 100 / self.total) as u32
    }
}

/// Count items; renewed originals are excluded since their copy is counted instead.
pub fn tally(items: &[CalendarItem], from: NaiveDate, to: NaiveDate) -> Rollup {
    let counted = items.iter().filter(|i| i.state != ItemState::Renewed);
    let (total, completed) = counted.fold((0, 0), |(total, done), item| {
        (total + 1, done + usize::from(item.is_completed()))
    });
    Rollup { from, to, total, completed }
}

/// Rollup over the trailing week ending on `today`.
pub async fn weekly_rollup(calendar: &dyn CalendarStore, tz: Tz, today: NaiveDate) -> Result<Rollup> {
    let from = today - Duration::days(ROLLUP_DAYS - 1);
    let (start, _) = local_day_bounds(tz, from);
    let (_, end) = local_day_bounds(tz, today);
    let items = calendar.list_items(start, end).await?;
    let rollup = tally(&items, from, today);
    tracing::info!(
        "📊 Weekly rollup {from}..{today}: {}/{} ({}%)",
        rollup.completed,
        rollup.total,
        rollup.percent()
    );
    Ok(rollup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agendabot_calendar::MemoryCalendar;
    use agendabot_core::types::NewItem;

    fn jan(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_percent() {
        let r = Rollup { from: jan(1), to: jan(7), total: 3, completed: 2 };
        assert_eq!(r.percent(), 66);
        let empty = Rollup { total: 0, completed: 0, ..r };
        assert_eq!(empty.percent(), 0);
    }

    #[tokio::test]
    async fn test_weekly_window() {
        let tz: Tz = "UTC".parse().unwrap();
        let cal = MemoryCalendar::new(tz);
        let mut done = NewItem::all_day("done", jan(2));
        done.state = ItemState::Completed;
        cal.seed(done);
        cal.seed(NewItem::all_day("open", jan(7)));
        let mut moved = NewItem::all_day("moved", jan(5));
        moved.state = ItemState::Renewed;
        cal.seed(moved);
        cal.seed(NewItem::all_day("too old", jan(1)));
        cal.seed(NewItem::all_day("future", jan(9)));

        let rollup = weekly_rollup(&cal, tz, jan(8)).await.unwrap();
        assert_eq!(rollup.from, jan(2));
        assert_eq!(rollup.total, 2);
        assert_eq!(rollup.completed, 1);
        assert_eq!(rollup.percent(), 50);
    }
}
