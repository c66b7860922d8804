//! Navigation module
//!
//! Pose math, motion integration, deadlock handling and the per-tick loop

mod deadlock;
mod motion;
mod pose;
mod run;
mod simulation;

pub use deadlock::{Assessment, DeadlockConfig, DeadlockMonitor, Escape, Observation, ProgressBand};
pub use motion::{Motion, MotionConfig, MotionIntegrator, MotionKind};
pub use pose::{Pose, direction, normalize_angle};
pub use run::{AbortHandle, RunState, StepResult, Terminal, init_run, init_run_shared};
pub use simulation::{Observer, RunSummary, Simulation};
