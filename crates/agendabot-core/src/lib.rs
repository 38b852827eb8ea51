//! # agendabot core
//!
//! Error type, configuration, domain types and the two collaborator traits
//! (calendar store, notify channel) shared by every agendabot crate.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::AgendaConfig;
pub use error::{AgendaError, Result};
