pub mod calendar;
pub mod channel;

pub use calendar::CalendarStore;
pub use channel::NotifyChannel;
