//! Outbound notices and the dose actions that come back from them.

use serde::{Deserialize, Serialize};

use super::time::TimeOfDay;

/// A message for the authorized recipient, optionally with action buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<NoticeAction>,
}

impl Notice {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), actions: vec![] }
    }

    pub fn with_actions(text: impl Into<String>, actions: Vec<NoticeAction>) -> Self {
        Self { text: text.into(), actions }
    }
}

/// A button attached to a notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeAction {
    pub label: String,
    pub callback: DoseCallback,
}

/// Group-level dose action, keyed by the shared `HH:MM` time rather than by ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum DoseCallback {
    Confirm { time: TimeOfDay },
    Snooze { time: TimeOfDay },
}

impl DoseCallback {
    const CONFIRM_TAG: &'static str = "dose_done";
    const SNOOZE_TAG: &'static str = "dose_snooze";

    pub fn time(&self) -> TimeOfDay {
        match self {
            DoseCallback::Confirm { time } | DoseCallback::Snooze { time } => *time,
        }
    }

    /// Compact wire form used as button callback data, e.g. `dose_done|09:00`.
    pub fn encode(&self) -> String {
        match self {
            DoseCallback::Confirm { time } => format!("{}|{time}", Self::CONFIRM_TAG),
            DoseCallback::Snooze { time } => format!("{}|{time}", Self::SNOOZE_TAG),
        }
    }

    pub fn decode(data: &str) -> Option<Self> {
        let (tag, key) = data.split_once('|')?;
        let time = TimeOfDay::parse(key).ok()?;
        match tag {
            Self::CONFIRM_TAG => Some(DoseCallback::Confirm { time }),
            Self::SNOOZE_TAG => Some(DoseCallback::Snooze { time }),
            _ => None,
        }
    }
}

impl std::fmt::Display for DoseCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// A dose action received from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundAction {
    pub callback: DoseCallback,
    pub sender_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_wire_form() {
        let nine = TimeOfDay::new(9, 0).unwrap();
        assert_eq!(DoseCallback::Confirm { time: nine }.encode(), "dose_done|09:00");
        assert_eq!(DoseCallback::Snooze { time: nine }.to_string(), "dose_snooze|09:00");
        assert_eq!(
            DoseCallback::decode("dose_snooze|09:00"),
            Some(DoseCallback::Snooze { time: nine })
        );
    }

    #[test]
    fn test_callback_rejects_foreign_data() {
        assert_eq!(DoseCallback::decode("comp_abc123"), None);
        assert_eq!(DoseCallback::decode("dose_done|noon"), None);
        assert_eq!(DoseCallback::decode("del_confirm|09:00"), None);
    }

    #[test]
    fn test_notice_constructors() {
        let plain = Notice::text("hello");
        assert!(plain.actions.is_empty());

        let time = TimeOfDay::new(21, 30).unwrap();
        let rich = Notice::with_actions(
            "take it",
            vec![NoticeAction { label: "Taken".into(), callback: DoseCallback::Confirm { time } }],
        );
        assert_eq!(rich.actions.len(), 1);
        assert_eq!(rich.actions[0].callback.time(), time);
    }
}
