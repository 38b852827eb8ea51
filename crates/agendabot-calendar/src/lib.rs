//! # agendabot calendar
//! Calendar store backends.

pub mod google;
pub mod memory;

use agendabot_core::config::AgendaConfig;
use agendabot_core::error::{AgendaError, Result};
use agendabot_core::traits::CalendarStore;
use std::sync::Arc;

pub use google::GoogleCalendar;
pub use memory::MemoryCalendar;

/// Create a calendar store from configuration.
pub fn create_calendar(config: &AgendaConfig) -> Result<Arc<dyn CalendarStore>> {
    let tz = config.tz()?;
    match config.calendar.backend.as_str() {
        "google" => Ok(Arc::new(GoogleCalendar::new(&config.calendar, tz)?)),
        "memory" => Ok(Arc::new(MemoryCalendar::new(tz))),
        other => Err(AgendaError::Config(format!("Unknown calendar backend: {other}"))),
    }
}
