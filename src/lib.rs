//! Reactive robot navigation with fuzzy logic
//!
//! This crate provides:
//! - A 2-D arena of axis-aligned obstacles with ray-cast range sensors
//! - A heading controller: priority heuristics backed by Mamdani fuzzy inference
//! - Motion integration with collision recovery and deadlock escapes
//! - A deterministic, single-tick navigation loop and an observer-driven runner

pub mod ai;
pub mod core;
pub mod nav;
pub mod world;

// Re-exports for convenience
pub use glam;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::ai::{
        ControllerConfig, CorrectionEngine, Decision, DecisionSource, FuzzyConfig, Guard, RuleBase,
    };
    pub use crate::core::{
        ArenaLayout, ConfigError, LayoutError, NavConfig, NavEvent, Preset, RunStats,
    };
    pub use crate::nav::{
        AbortHandle, Escape, MotionKind, Observer, Pose, RunState, RunSummary, Simulation,
        StepResult, Terminal, init_run,
    };
    pub use crate::world::{Environment, Obstacle, RangeSensor, SensorReading};
    pub use glam::Vec2;
}
