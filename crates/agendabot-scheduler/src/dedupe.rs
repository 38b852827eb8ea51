//! Same-day duplicate cleanup.

use agendabot_core::error::Result;
use agendabot_core::traits::CalendarStore;
use agendabot_core::types::time::local_day_bounds;
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupeReport {
    /// Titles that appeared more than once.
    pub duplicated_titles: Vec<String>,
    pub deleted: usize,
    pub failed: usize,
}

/// Keep the first item of each title on `date` and delete the rest.
pub async fn dedupe_day(calendar: &dyn CalendarStore, tz: Tz, date: NaiveDate) -> Result<DedupeReport> {
    let (start, end) = local_day_bounds(tz, date);
    let items = calendar.list_items(start, end).await?;

    let mut seen = HashSet::new();
    let mut report = DedupeReport::default();
    for item in &items {
        if seen.insert(item.title.as_str()) {
            continue;
        }
        if !report.duplicated_titles.contains(&item.title) {
            report.duplicated_titles.push(item.title.clone());
        }
        match calendar.delete_item(&item.id).await {
            Ok(true) => report.deleted += 1,
            Ok(false) => tracing::debug!("🧹 {} already gone", item.id),
            Err(e) => {
                tracing::error!("❌ Could not delete duplicate {} ({}): {e}", item.id, item.title);
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        "🧹 Dedupe {date}: {} duplicated titles, {} deleted",
        report.duplicated_titles.len(),
        report.deleted
    );
    Ok(report)
}
