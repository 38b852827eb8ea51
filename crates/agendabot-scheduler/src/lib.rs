//! # agendabot scheduler
//!
//! Time-driven reminders over a remote calendar and a local dose record.
//!
//! ## Design Principles
//! - One loop, one writer: jobs run sequentially, the dose store is never contended
//! - File-based persistence (JSON) for doses; the calendar is the source of truth for tasks
//! - Tokio timers only: a one-minute heartbeat and a few one-off catch-up sleeps
//! - Idempotent mutations: restarts never duplicate notices or calendar entries
//!
//! ## Architecture
//! ```text
//! SchedulerEngine (tokio interval)
//!   ├── 06:30 … 22:30, 00:00 → Digest (pending + upcoming)
//!   ├── every 15 min          → NearTerm (items starting soon)
//!   ├── every tick            → DoseScan (due dose groups)
//!   ├── Sunday 20:00          → WeeklyRollup
//!   ├── 23:55                 → Renewal (carry tasks to tomorrow)
//!   └── on trigger → NotifyRouter
//!                      ├── Telegram (priority 1)
//!                      └── Webhook  (priority 2)
//! ```

pub mod catchup;
pub mod cron;
pub mod dedupe;
pub mod digest;
pub mod dosing;
pub mod engine;
pub mod notify;
pub mod render;
pub mod renewal;
pub mod rollup;
pub mod store;
pub mod tasks;

pub use catchup::{compute_catchup_jobs, CatchupQueue};
pub use cron::TriggerSchedule;
pub use digest::{AgendaDigest, Digest, DigestPolicy};
pub use dosing::DoseTracker;
pub use engine::SchedulerEngine;
pub use notify::NotifyRouter;
pub use renewal::{RenewalReport, TaskRenewer};
pub use store::DoseStore;
pub use tasks::{JobKind, OneOffJob};
