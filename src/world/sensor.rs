//! Range sensor model
//!
//! Three fixed range finders (front, left, right) implemented as ray marches
//! against the [`Environment`]. The march advances by a fixed step so the
//! result depends only on the origin, the heading and the configuration.

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::Environment;
use crate::core::ConfigError;
use crate::nav::{Pose, direction};

/// Ray-march parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// March increment in meters
    pub ray_step: f32,
    /// Reading returned when nothing is hit, in centimeters
    pub max_range_cm: f32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            ray_step: 0.01,
            max_range_cm: 100.0,
        }
    }
}

impl SensorConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::require_positive("sensor.ray_step", self.ray_step)?;
        ConfigError::require_positive("sensor.max_range_cm", self.max_range_cm)?;
        if self.ray_step * 100.0 > self.max_range_cm {
            return Err(ConfigError::InvalidValue {
                field: "sensor.ray_step",
                value: self.ray_step,
            });
        }
        Ok(())
    }
}

/// One tick's worth of range readings, in centimeters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub front: f32,
    pub left: f32,
    pub right: f32,
}

impl SensorReading {
    /// Bundle three readings
    #[must_use]
    pub const fn new(front: f32, left: f32, right: f32) -> Self {
        Self { front, left, right }
    }

    /// Smallest of the three readings
    #[must_use]
    pub fn min(&self) -> f32 {
        self.front.min(self.left).min(self.right)
    }

    /// True when every reading is below `threshold`
    #[must_use]
    pub fn all_below(&self, threshold: f32) -> bool {
        self.front < threshold && self.left < threshold && self.right < threshold
    }

    /// Sign of the turn toward the side with more lateral room:
    /// `1.0` for left, `-1.0` for right. Equal room counts as left.
    #[must_use]
    pub fn roomier_side(&self) -> f32 {
        if self.right > self.left { -1.0 } else { 1.0 }
    }
}

/// Ray-casting range sensor bound to one environment
#[derive(Debug, Clone)]
pub struct RangeSensor {
    env: Arc<Environment>,
    config: SensorConfig,
    /// Number of sample points per ray
    steps: usize,
}

impl RangeSensor {
    /// Create a sensor over a shared environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the step is not positive or exceeds the range.
    pub fn new(env: Arc<Environment>, config: SensorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let max_range_m = config.max_range_cm / 100.0;
        let steps = (max_range_m / config.ray_step).ceil() as usize;
        Ok(Self { env, config, steps })
    }

    /// The environment this sensor reads
    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Distance in centimeters from `origin` to the first occupied sample point
    /// along `heading`, or the range cap if nothing is hit.
    #[must_use]
    pub fn cast(&self, origin: Vec2, heading: f32) -> f32 {
        let dir = direction(heading);
        for i in 0..self.steps {
            let dist = i as f32 * self.config.ray_step;
            if self.env.is_occupied(origin + dir * dist) {
                return (dist * 100.0).min(self.config.max_range_cm);
            }
        }
        self.config.max_range_cm
    }

    /// Front, left and right readings for a pose
    #[must_use]
    pub fn read_all(&self, pose: &Pose) -> SensorReading {
        SensorReading {
            front: self.cast(pose.position, pose.heading),
            left: self.cast(pose.position, pose.heading + FRAC_PI_2),
            right: self.cast(pose.position, pose.heading - FRAC_PI_2),
        }
    }

    /// Sample headings around the full circle starting at `base_heading`,
    /// `resolution_deg` apart, and return the one with the greatest clear
    /// distance together with that distance.
    ///
    /// The earliest sample wins ties. Returns `None` when every sample reads zero.
    #[must_use]
    pub fn clearest_heading(
        &self,
        origin: Vec2,
        base_heading: f32,
        resolution_deg: f32,
    ) -> Option<(f32, f32)> {
        let mut best: Option<(f32, f32)> = None;
        let mut best_distance = 0.0;

        for heading in scan_headings(base_heading, resolution_deg) {
            let distance = self.cast(origin, heading);
            if distance > best_distance {
                best_distance = distance;
                best = Some((heading, distance));
            }
        }

        best
    }
}

/// Headings sampled by a full-circle scan
pub fn scan_headings(base_heading: f32, resolution_deg: f32) -> impl Iterator<Item = f32> {
    let count = (360.0 / resolution_deg).round().max(1.0) as usize;
    let step = resolution_deg.to_radians();
    (0..count).map(move |k| base_heading + k as f32 * step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{ArenaConfig, Obstacle};

    fn sensor_with(obstacles: Vec<Obstacle>) -> RangeSensor {
        let env = Environment::new(&ArenaConfig::default(), obstacles).unwrap();
        RangeSensor::new(Arc::new(env), SensorConfig::default()).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_step() {
        let env = Arc::new(Environment::new(&ArenaConfig::default(), Vec::new()).unwrap());
        for ray_step in [0.0, -0.01, f32::NAN, 2.0] {
            let config = SensorConfig {
                ray_step,
                ..SensorConfig::default()
            };
            let result = RangeSensor::new(Arc::clone(&env), config);
            assert!(
                matches!(
                    result,
                    Err(ConfigError::InvalidValue {
                        field: "sensor.ray_step",
                        ..
                    })
                ),
                "ray_step {ray_step} accepted"
            );
        }

        let config = SensorConfig {
            max_range_cm: 0.0,
            ..SensorConfig::default()
        };
        assert!(RangeSensor::new(env, config).is_err());
    }

    #[test]
    fn test_open_arena_returns_cap() {
        let sensor = sensor_with(Vec::new());
        let center = Vec2::new(3.0, 3.0);

        for k in 0..16 {
            let heading = k as f32 * 0.4;
            assert_eq!(sensor.cast(center, heading), 100.0);
        }
    }

    #[test]
    fn test_cast_hits_obstacle() {
        let sensor = sensor_with(vec![Obstacle::new(3.5, 4.0, 2.5, 3.5)]);
        let d = sensor.cast(Vec2::new(3.0, 3.0), 0.0);

        // Expanded face sits at 0.49 m
        assert!((d - 49.0).abs() <= 1.5, "distance {d}");
    }

    #[test]
    fn test_cast_monotonic_as_obstacle_recedes() {
        let origin = Vec2::new(2.0, 3.0);
        let mut previous = 0.0;

        for i in 0..12 {
            let x = 2.05 + i as f32 * 0.1;
            let sensor = sensor_with(vec![Obstacle::new(x, x + 0.2, 2.5, 3.5)]);
            let d = sensor.cast(origin, 0.0);
            assert!(d >= previous, "obstacle at {x}: {d} < {previous}");
            assert!(d <= 100.0);
            previous = d;
        }

        assert_eq!(previous, 100.0);
    }

    #[test]
    fn test_cast_from_inside_obstacle_is_zero() {
        let sensor = sensor_with(vec![Obstacle::new(2.0, 3.0, 2.0, 3.0)]);
        assert_eq!(sensor.cast(Vec2::new(2.5, 2.5), 1.0), 0.0);
    }

    #[test]
    fn test_read_all_directions() {
        // Start corner: walls close on the right (south), open elsewhere
        let sensor = sensor_with(Vec::new());
        let reading = sensor.read_all(&Pose::new(0.5, 0.5, 0.0));

        assert_eq!(reading.front, 100.0);
        assert_eq!(reading.left, 100.0);
        assert!((reading.right - 24.0).abs() <= 1.5, "right {}", reading.right);
    }

    #[test]
    fn test_reading_helpers() {
        let reading = SensorReading::new(4.0, 3.0, 2.0);
        assert!(reading.all_below(5.0));
        assert!(!reading.all_below(4.0));
        assert_eq!(reading.min(), 2.0);
        assert_eq!(reading.roomier_side(), 1.0);
        assert_eq!(SensorReading::new(4.0, 2.0, 3.0).roomier_side(), -1.0);
    }

    #[test]
    fn test_scan_headings_count() {
        let headings: Vec<f32> = scan_headings(0.0, 22.5).collect();
        assert_eq!(headings.len(), 16);
        assert!((headings[8] - std::f32::consts::PI).abs() < 1e-5);
    }

    #[test]
    fn test_clearest_heading_picks_open_side() {
        // Block everything to the east, leave the west open
        let sensor = sensor_with(vec![Obstacle::new(3.05, 3.5, 1.0, 5.0)]);
        let (heading, clearance) = sensor
            .clearest_heading(Vec2::new(3.0, 3.0), 0.0, 22.5)
            .unwrap();

        assert_eq!(clearance, 100.0);
        // Straight north is the first sample that clears the block
        assert!((heading - FRAC_PI_2).abs() < 1e-5, "heading {heading}");
        assert!(sensor.cast(Vec2::new(3.0, 3.0), 0.0) < 10.0);
    }
}
