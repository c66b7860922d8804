//! Arena and sensing module
//!
//! Static obstacle geometry and the ray-cast range sensor built on it.

mod environment;
mod sensor;

pub use environment::{ArenaConfig, Environment, Obstacle, WALL_COUNT};
pub use sensor::{RangeSensor, SensorConfig, SensorReading, scan_headings};
