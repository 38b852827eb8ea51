//! Job definitions for the trigger engine.

use agendabot_core::types::TimeOfDay;
use chrono::NaiveDate;
use std::fmt;
use std::time::Duration;

/// What a trigger asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Pending and upcoming digest for the slot at `slot`.
    Digest { slot: TimeOfDay },
    /// Announce timed items starting soon.
    NearTerm,
    /// Notify due dose groups.
    DoseScan,
    WeeklyRollup,
    /// Carry `target`'s uncompleted tasks to the next day.
    Renewal { target: NaiveDate },
}

impl JobKind {
    /// Whether a regular run of `self` makes a pending catch-up of `other` redundant.
    pub fn covers(&self, other: &JobKind) -> bool {
        match (self, other) {
            (JobKind::Digest { .. }, JobKind::Digest { .. }) => true,
            (a, b) => a == b,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Digest { .. } => "digest",
            JobKind::NearTerm => "near_term",
            JobKind::DoseScan => "dose_scan",
            JobKind::WeeklyRollup => "weekly_rollup",
            JobKind::Renewal { .. } => "renewal",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Digest { slot } => write!(f, "digest@{slot}"),
            JobKind::Renewal { target } => write!(f, "renewal({target})"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// A job scheduled once, relative to process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneOffJob {
    pub kind: JobKind,
    pub delay: Duration,
    pub reason: String,
}
