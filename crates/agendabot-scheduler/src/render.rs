//! Message text for every notice the scheduler sends (Telegram Markdown).

use agendabot_core::types::{CalendarItem, DoseCallback, DoseGroup, ItemWindow, Notice, NoticeAction, TimeOfDay};
use chrono::DateTime;
use chrono_tz::Tz;

use crate::digest::{Digest, UpcomingItem};
use crate::renewal::RenewalReport;
use crate::rollup::Rollup;

/// Escape user text for Telegram's legacy Markdown.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '[' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_all(names: &[String]) -> String {
    names.iter().map(|n| escape(n)).collect::<Vec<_>>().join(", ")
}

/// One item as a digest block.
pub fn item_line(item: &CalendarItem, tz: Tz) -> String {
    let when = match &item.window {
        ItemWindow::AllDay { start, .. } => format!("📅 {}  (all day)", start.format("%d/%m/%Y")),
        ItemWindow::Timed { start, .. } => {
            let local = start.with_timezone(&tz);
            format!("📅 {}  🕐 {}", local.format("%d/%m/%Y"), local.format("%H:%M"))
        }
    };
    let mut line = format!("📌 *{}*\n{when}", escape(item.title.trim_start_matches("📌 ")));
    if !item.notes.is_empty() {
        line.push_str(&format!("\n📝 {}", escape(&item.notes)));
    }
    line
}

/// "• *Title* (in 45 min)" lines.
pub fn upcoming(items: &[UpcomingItem]) -> String {
    let mut lines = vec!["🔔 *Coming up:*\n".to_string()];
    for up in items {
        lines.push(format!("• *{}* ({})", escape(&up.item.title), up.time_remaining()));
    }
    lines.join("\n")
}

/// The scheduled digest. `first_slot` switches the empty message to a morning greeting.
pub fn digest(digest: &Digest, now: &DateTime<Tz>, first_slot: bool) -> String {
    let clock = now.format("%H:%M");
    let mut sections = Vec::new();

    if digest.pending.is_empty() {
        if first_slot {
            sections.push("☀️ *Good morning!*\n\nNothing pending for today. 🎉".to_string());
        } else {
            sections.push(format!("✅ *Check {clock}*: nothing pending. All caught up! 🎉"));
        }
    } else {
        let mut lines = vec![
            format!("⏰ *Agenda reminder* ({clock})\n"),
            format!("📋 You have *{}* pending item(s) today:\n", digest.pending.len()),
        ];
        let tz = now.timezone();
        lines.extend(digest.pending.iter().map(|item| item_line(item, tz)));
        sections.push(lines.join("\n\n"));
    }

    if !digest.upcoming.is_empty() {
        sections.push(upcoming(&digest.upcoming));
    }
    sections.join("\n\n")
}

/// Dose reminder with "taken" and "snooze" buttons keyed by the group's time.
pub fn dose_group(group: &DoseGroup, snooze_minutes: i64) -> Notice {
    let names = group.names().iter().map(|n| escape(n)).collect::<Vec<_>>().join(", ");
    let text = format!(
        "💊 *Time for your supplements* ({})\n\n{names}\n\nLet me know once you've taken them.",
        group.time
    );
    Notice::with_actions(text, dose_actions(group.time, snooze_minutes))
}

fn dose_actions(time: TimeOfDay, snooze_minutes: i64) -> Vec<NoticeAction> {
    vec![
        NoticeAction { label: "✅ Taken".into(), callback: DoseCallback::Confirm { time } },
        NoticeAction {
            label: format!("⏰ {snooze_minutes} min"),
            callback: DoseCallback::Snooze { time },
        },
    ]
}

pub fn doses_confirmed(names: &[String]) -> String {
    if names.is_empty() {
        return "🤷 Nothing left to confirm for that time.".to_string();
    }
    format!("✅ Great! Marked as taken: *{}*.\nKeep it up! 💪", escape_all(names))
}

pub fn doses_snoozed(names: &[String], minutes: i64) -> String {
    if names.is_empty() {
        return "🤷 Nothing left to snooze for that time.".to_string();
    }
    format!("⏳ Got it. I'll ask about *{}* again in {minutes} minutes. 💊", escape_all(names))
}

pub fn renewal(report: &RenewalReport) -> String {
    let moved: Vec<&String> = report.renewed.iter().chain(&report.healed).collect();
    let mut text = if moved.is_empty() {
        "✅ *Every task for today was completed.* Great job! 🎉".to_string()
    } else {
        let mut lines = vec!["🔄 *Tasks carried over to tomorrow:*\n".to_string()];
        lines.extend(moved.iter().map(|title| format!("• 📌 {}", escape(title.trim_start_matches("📌 ")))));
        lines.push("\n_They weren't completed today, so I moved them to tomorrow._".to_string());
        lines.join("\n")
    };
    if report.failed > 0 {
        text.push_str(&format!("\n\n⚠️ {} task(s) could not be carried over; I'll retry on the next run.", report.failed));
    }
    text
}

pub fn rollup(r: &Rollup) -> String {
    format!(
        "📊 *Weekly summary* ({} to {})\n\nCompleted *{}* of *{}* items ({}%).",
        r.from.format("%d/%m"),
        r.to.format("%d/%m"),
        r.completed,
        r.total,
        r.percent()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use agendabot_core::types::{DoseSchedule, ItemState};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn tz() -> Tz {
        "America/Argentina/Buenos_Aires".parse().unwrap()
    }

    #[test]
    fn test_item_line_timed_in_local_time() {
        let item = CalendarItem {
            id: "1".into(),
            title: "Dentist".into(),
            notes: String::new(),
            state: ItemState::Open,
            window: ItemWindow::Timed {
                start: Utc.with_ymd_and_hms(2024, 1, 1, 13, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 1, 1, 14, 0, 0).unwrap(),
            },
        };
        let line = item_line(&item, tz());
        assert!(line.contains("*Dentist*"));
        assert!(line.contains("🕐 10:00"));
    }

    #[test]
    fn test_empty_digest_messages() {
        let now = tz().with_ymd_and_hms(2024, 1, 1, 6, 30, 0).unwrap();
        assert!(digest(&Digest::default(), &now, true).contains("Good morning"));
        assert!(digest(&Digest::default(), &now, false).contains("Check 06:30"));
    }

    #[test]
    fn test_dose_group_buttons() {
        let nine = TimeOfDay::new(9, 0).unwrap();
        let group = DoseGroup {
            time: nine,
            doses: vec![DoseSchedule::new("A", nine), DoseSchedule::new("B", nine)],
        };
        let notice = dose_group(&group, 30);
        assert!(notice.text.contains("A, B"));
        let data: Vec<String> = notice.actions.iter().map(|a| a.callback.encode()).collect();
        assert_eq!(data, vec!["dose_done|09:00", "dose_snooze|09:00"]);
        assert_eq!(notice.actions[1].label, "⏰ 30 min");
    }

    #[test]
    fn test_user_text_is_escaped() {
        assert_eq!(escape("Q3_report *draft* [v2] `x`"), "Q3\\_report \\*draft\\* \\[v2] \\`x\\`");

        let nine = TimeOfDay::new(9, 0).unwrap();
        let group = DoseGroup { time: nine, doses: vec![DoseSchedule::new("Vitamin_D", nine)] };
        let notice = dose_group(&group, 30);
        assert!(notice.text.contains("Vitamin\\_D"));
        assert!(doses_confirmed(&["Vitamin_D".to_string()]).contains("*Vitamin\\_D*"));

        let item = CalendarItem {
            id: "1".into(),
            title: "Q3_report".into(),
            notes: "see *notes*".into(),
            state: ItemState::Open,
            window: ItemWindow::all_day(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        };
        let line = item_line(&item, tz());
        assert!(line.contains("*Q3\\_report*"));
        assert!(line.contains("see \\*notes\\*"));
    }

    #[test]
    fn test_renewal_text() {
        let empty = RenewalReport::default();
        assert!(renewal(&empty).contains("completed"));

        let report = RenewalReport {
            target: NaiveDate::from_ymd_opt(2024, 1, 1),
            renewed: vec!["📌 gym".into()],
            healed: vec!["taxes".into()],
            failed: 1,
        };
        let text = renewal(&report);
        assert!(text.contains("• 📌 gym"));
        assert!(!text.contains("📌 📌"));
        assert!(text.contains("• 📌 taxes"));
        assert!(text.contains("could not be carried over"));
    }
}
