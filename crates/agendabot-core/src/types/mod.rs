//! Domain types shared across agendabot crates.

pub mod calendar;
pub mod dose;
pub mod notice;
pub mod time;

pub use calendar::{CalendarItem, ItemPatch, ItemState, ItemWindow, NewItem};
pub use dose::{DoseGroup, DoseSchedule};
pub use notice::{DoseCallback, InboundAction, Notice, NoticeAction};
pub use time::TimeOfDay;
