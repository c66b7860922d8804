//! Core module
//!
//! Configuration, errors, soft events, statistics and arena layouts

mod config;
mod events;
mod layout;
mod stats;

pub use config::{ConfigError, NavConfig, Preset};
pub use events::{EventQueue, NavEvent};
pub use layout::{ArenaLayout, LayoutError};
pub use stats::RunStats;
