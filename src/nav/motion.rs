//! Motion integration with collision recovery
//!
//! Constant-speed holonomic motion: rotate by the correction, advance one
//! tick along the new heading. A blocked candidate triggers, in order, a
//! clearest-heading scan, a half-speed retry along that heading, and a
//! last-resort sweep of small steps around the full circle. If all of that
//! fails the robot holds its pose for the tick.

use serde::{Deserialize, Serialize};

use super::Pose;
use crate::core::ConfigError;
use crate::world::RangeSensor;

/// Speed, tick length and recovery parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Linear speed in m/s
    pub speed: f32,
    /// Tick duration in seconds
    pub dt: f32,
    /// Angular spacing of the clearest-heading scan, degrees
    pub scan_resolution_deg: f32,
    /// Scan results at or below this clearance are ignored, centimeters
    pub min_clearance_cm: f32,
    /// Speed factor for the retry along the scanned heading
    pub slow_factor: f32,
    /// Angular spacing of the last-resort sweep, degrees
    pub last_resort_step_deg: f32,
    /// Speed factor for the last-resort sweep
    pub last_resort_factor: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed: 0.3,
            dt: 0.1,
            scan_resolution_deg: 22.5,
            min_clearance_cm: 1.0,
            slow_factor: 0.5,
            last_resort_step_deg: 10.0,
            last_resort_factor: 0.2,
        }
    }
}

impl MotionConfig {
    /// Distance covered in one tick at full speed
    #[must_use]
    pub fn step_length(&self) -> f32 {
        self.speed * self.dt
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::require_positive("motion.speed", self.speed)?;
        ConfigError::require_positive("motion.dt", self.dt)?;
        ConfigError::require_positive("motion.scan_resolution_deg", self.scan_resolution_deg)?;
        ConfigError::require_positive("motion.last_resort_step_deg", self.last_resort_step_deg)?;
        ConfigError::require_positive("motion.slow_factor", self.slow_factor)?;
        ConfigError::require_positive("motion.last_resort_factor", self.last_resort_factor)?;
        ConfigError::require_non_negative("motion.min_clearance_cm", self.min_clearance_cm)?;
        if self.scan_resolution_deg > 360.0 || self.last_resort_step_deg > 360.0 {
            return Err(ConfigError::InvalidValue {
                field: "motion.scan_resolution_deg",
                value: self.scan_resolution_deg.max(self.last_resort_step_deg),
            });
        }
        Ok(())
    }
}

/// How the tick's motion was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionKind {
    /// The corrected heading was clear
    Direct,
    /// Moved full speed along the clearest scanned heading
    Redirected,
    /// Moved at reduced speed along the clearest scanned heading
    Slowed,
    /// Moved a small step along the first free sweep heading
    LastResort,
    /// Nothing was free; pose unchanged
    Blocked,
}

impl MotionKind {
    /// Whether the robot changed position
    #[must_use]
    pub fn moved(self) -> bool {
        !matches!(self, Self::Blocked)
    }
}

/// Result of one integration step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub pose: Pose,
    pub kind: MotionKind,
}

/// Pose integrator bound to a motion configuration
#[derive(Debug, Clone)]
pub struct MotionIntegrator {
    config: MotionConfig,
}

impl MotionIntegrator {
    /// Create an integrator
    #[must_use]
    pub fn new(config: MotionConfig) -> Self {
        Self { config }
    }

    /// Motion parameters
    #[must_use]
    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Apply `correction_deg` to `pose` and advance one tick.
    #[must_use]
    pub fn advance(&self, pose: &Pose, correction_deg: f32, sensor: &RangeSensor) -> Motion {
        let env = sensor.environment();
        let step = self.config.step_length();

        let heading = pose.heading + correction_deg.to_radians();
        let candidate = pose.project(heading, step);
        if !env.is_occupied(candidate) {
            return Motion {
                pose: Pose {
                    position: candidate,
                    heading,
                },
                kind: MotionKind::Direct,
            };
        }

        if let Some((best, clearance)) =
            sensor.clearest_heading(pose.position, heading, self.config.scan_resolution_deg)
        {
            if clearance > self.config.min_clearance_cm {
                let full = pose.project(best, step);
                if !env.is_occupied(full) {
                    return Motion {
                        pose: Pose {
                            position: full,
                            heading: best,
                        },
                        kind: MotionKind::Redirected,
                    };
                }

                let slow = pose.project(best, step * self.config.slow_factor);
                if !env.is_occupied(slow) {
                    return Motion {
                        pose: Pose {
                            position: slow,
                            heading: best,
                        },
                        kind: MotionKind::Slowed,
                    };
                }
            }
        }

        self.last_resort(pose, sensor)
    }

    /// Sweep absolute headings from zero and take the first free small step
    fn last_resort(&self, pose: &Pose, sensor: &RangeSensor) -> Motion {
        let env = sensor.environment();
        let step = self.config.step_length() * self.config.last_resort_factor;
        let count = (360.0 / self.config.last_resort_step_deg).floor() as usize;

        for k in 0..count {
            let heading = (k as f32 * self.config.last_resort_step_deg).to_radians();
            let candidate = pose.project(heading, step);
            if !env.is_occupied(candidate) {
                return Motion {
                    pose: Pose {
                        position: candidate,
                        heading,
                    },
                    kind: MotionKind::LastResort,
                };
            }
        }

        log::debug!(
            "No free heading around ({:.3}, {:.3}), holding position",
            pose.position.x,
            pose.position.y
        );
        Motion {
            pose: *pose,
            kind: MotionKind::Blocked,
        }
    }
}
