//! Deadlock detection and escape
//!
//! A stuck counter is fed every tick from how far the robot moved and how
//! much closer it got to the goal. A short position history detects loops.
//! When the counter or a loop crosses its threshold, or the robot is
//! surrounded, the monitor overrides the heading: either a strong turn
//! toward the goal, or the clearest direction of a full-circle scan.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::{Pose, normalize_angle};
use crate::core::ConfigError;
use crate::world::RangeSensor;

/// Thresholds and penalties of the stuck counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlockConfig {
    /// Positions kept for loop detection
    pub history_len: usize,
    /// Loop detection needs more than this many positions
    pub loop_min_history: usize,
    /// Most recent positions examined for a loop
    pub loop_window: usize,
    /// Radius around the current position, meters
    pub loop_radius: f32,
    /// A loop needs more than this many positions within the radius
    pub loop_count: usize,

    /// Movement below this is standing still, meters
    pub still_movement: f32,
    pub still_penalty: u32,
    /// Movement below this is creeping, meters
    pub creep_movement: f32,
    pub creep_penalty: u32,
    /// Progress below this is moving away from the goal, meters
    pub regress_progress: f32,
    pub regress_penalty: u32,
    /// Progress magnitude below this, at low movement, is a stall
    pub stall_progress: f32,
    pub stall_movement: f32,
    pub stall_penalty: u32,
    /// Readings below this on all three sensors mean surrounded, centimeters
    pub surround_cm: f32,
    pub surround_penalty: u32,
    /// Counter decrease on a healthy tick
    pub decay: u32,

    /// Counter above this triggers an escape
    pub escape_threshold: u32,
    /// Counter above this triggers an escape while looping
    pub loop_escape_threshold: u32,
    /// Counter above this forces the turn toward the goal
    pub goal_escape_threshold: u32,
    /// Fraction of the goal angle error removed by a goal escape
    pub goal_escape_gain: f32,
    /// Counter decrease after a clearest-heading escape
    pub surround_relief: u32,
}

impl Default for DeadlockConfig {
    fn default() -> Self {
        Self {
            history_len: 30,
            loop_min_history: 20,
            loop_window: 25,
            loop_radius: 0.3,
            loop_count: 12,
            still_movement: 0.001,
            still_penalty: 3,
            creep_movement: 0.003,
            creep_penalty: 1,
            regress_progress: -0.03,
            regress_penalty: 2,
            stall_progress: 0.005,
            stall_movement: 0.015,
            stall_penalty: 1,
            surround_cm: 5.0,
            surround_penalty: 2,
            decay: 2,
            escape_threshold: 10,
            loop_escape_threshold: 5,
            goal_escape_threshold: 18,
            goal_escape_gain: 0.8,
            surround_relief: 5,
        }
    }
}

impl DeadlockConfig {
    /// More patient variant paired with the smoothed controller: inertia
    /// makes wide arcs, which should not read as loops or regressions.
    #[must_use]
    pub fn smoothed() -> Self {
        Self {
            loop_radius: 0.25,
            escape_threshold: 12,
            goal_escape_threshold: 20,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("deadlock.loop_radius", self.loop_radius),
            ("deadlock.still_movement", self.still_movement),
            ("deadlock.creep_movement", self.creep_movement),
            ("deadlock.stall_progress", self.stall_progress),
            ("deadlock.stall_movement", self.stall_movement),
            ("deadlock.surround_cm", self.surround_cm),
            ("deadlock.goal_escape_gain", self.goal_escape_gain),
        ] {
            ConfigError::require_positive(field, value)?;
        }
        if !self.regress_progress.is_finite() || self.regress_progress > 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "deadlock.regress_progress",
                value: self.regress_progress,
            });
        }
        if self.history_len == 0 || self.loop_window > self.history_len {
            return Err(ConfigError::InvalidValue {
                field: "deadlock.history_len",
                value: self.history_len as f32,
            });
        }
        Ok(())
    }
}

/// Which penalty band a tick fell into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressBand {
    Still,
    Creeping,
    Regressing,
    Stalled,
    Surrounded,
    Healthy,
}

/// Heading override chosen by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Escape {
    /// Strong turn toward the goal; the counter was reset
    TowardGoal { heading: f32 },
    /// Clearest direction of a full-circle scan
    ClearestHeading { heading: f32, clearance_cm: f32 },
}

impl Escape {
    /// New absolute heading in radians
    #[must_use]
    pub fn heading(&self) -> f32 {
        match *self {
            Self::TowardGoal { heading } | Self::ClearestHeading { heading, .. } => heading,
        }
    }
}

/// What the monitor saw after a move
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Pose after the move
    pub pose: Pose,
    /// Whether all three readings of this tick were below the surround threshold
    pub surrounded: bool,
}

/// Outcome of one observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub band: ProgressBand,
    /// Distance moved this tick, meters
    pub movement: f32,
    /// Reduction of the goal distance this tick, meters
    pub progress: f32,
    pub looping: bool,
    /// Counter value after any escape adjustment
    pub stuck_counter: u32,
    pub escape: Option<Escape>,
}

impl Assessment {
    /// Pose after applying the escape, if any
    #[must_use]
    pub fn apply(&self, pose: Pose) -> Pose {
        match self.escape {
            Some(escape) => pose.with_heading(escape.heading()),
            None => pose,
        }
    }
}

/// Stateful stuck detector for one run
#[derive(Debug, Clone)]
pub struct DeadlockMonitor {
    config: DeadlockConfig,
    goal: Vec2,
    history: VecDeque<Vec2>,
    last_position: Vec2,
    last_goal_distance: f32,
    counter: u32,
}

impl DeadlockMonitor {
    /// Create a monitor for a run from `start` to `goal`
    #[must_use]
    pub fn new(config: DeadlockConfig, start: Vec2, goal: Vec2) -> Self {
        let history = VecDeque::with_capacity(config.history_len + 1);
        Self {
            config,
            goal,
            history,
            last_position: start,
            last_goal_distance: start.distance(goal),
            counter: 0,
        }
    }

    /// Current value of the stuck counter
    #[must_use]
    pub fn stuck(&self) -> u32 {
        self.counter
    }

    #[must_use]
    pub fn config(&self) -> &DeadlockConfig {
        &self.config
    }

    /// Feed one tick and decide whether to override the heading
    pub fn observe(
        &mut self,
        observation: &Observation,
        sensor: &RangeSensor,
        scan_resolution_deg: f32,
    ) -> Assessment {
        let pose = observation.pose;
        let movement = pose.position.distance(self.last_position);
        let goal_distance = pose.distance_to(self.goal);
        let progress = self.last_goal_distance - goal_distance;

        self.history.push_back(pose.position);
        while self.history.len() > self.config.history_len {
            self.history.pop_front();
        }

        let band = self.classify(movement, progress, observation.surrounded);
        self.counter = match self.penalty(band) {
            Some(penalty) => self.counter + penalty,
            None => self.counter.saturating_sub(self.config.decay),
        };

        let looping = self.is_looping(pose.position);
        let escape = self.escape(&pose, looping, observation.surrounded, sensor, scan_resolution_deg);

        self.last_position = pose.position;
        self.last_goal_distance = goal_distance;

        Assessment {
            band,
            movement,
            progress,
            looping,
            stuck_counter: self.counter,
            escape,
        }
    }

    fn classify(&self, movement: f32, progress: f32, surrounded: bool) -> ProgressBand {
        let c = &self.config;
        if movement < c.still_movement {
            ProgressBand::Still
        } else if movement < c.creep_movement {
            ProgressBand::Creeping
        } else if progress < c.regress_progress {
            ProgressBand::Regressing
        } else if progress.abs() < c.stall_progress && movement < c.stall_movement {
            ProgressBand::Stalled
        } else if surrounded {
            ProgressBand::Surrounded
        } else {
            ProgressBand::Healthy
        }
    }

    fn penalty(&self, band: ProgressBand) -> Option<u32> {
        let c = &self.config;
        match band {
            ProgressBand::Still => Some(c.still_penalty),
            ProgressBand::Creeping => Some(c.creep_penalty),
            ProgressBand::Regressing => Some(c.regress_penalty),
            ProgressBand::Stalled => Some(c.stall_penalty),
            ProgressBand::Surrounded => Some(c.surround_penalty),
            ProgressBand::Healthy => None,
        }
    }

    /// More than `loop_count` of the recent positions lie near `position`.
    /// The current position is part of the window.
    fn is_looping(&self, position: Vec2) -> bool {
        if self.history.len() <= self.config.loop_min_history {
            return false;
        }
        let skip = self.history.len().saturating_sub(self.config.loop_window);
        let near = self
            .history
            .iter()
            .skip(skip)
            .filter(|p| p.distance(position) < self.config.loop_radius)
            .count();
        near > self.config.loop_count
    }

    fn escape(
        &mut self,
        pose: &Pose,
        looping: bool,
        surrounded: bool,
        sensor: &RangeSensor,
        scan_resolution_deg: f32,
    ) -> Option<Escape> {
        let c = &self.config;
        let triggered = self.counter > c.escape_threshold
            || (looping && self.counter > c.loop_escape_threshold)
            || surrounded;
        if !triggered {
            return None;
        }

        if self.counter > c.goal_escape_threshold || looping {
            let error = normalize_angle(pose.angle_to(self.goal) - pose.heading);
            let heading = pose.heading + c.goal_escape_gain * error;
            log::info!(
                "Deadlock escape toward goal (counter {}, looping {looping})",
                self.counter
            );
            self.counter = 0;
            return Some(Escape::TowardGoal { heading });
        }

        if surrounded {
            let (heading, clearance_cm) =
                sensor.clearest_heading(pose.position, pose.heading, scan_resolution_deg)?;
            log::info!(
                "Surrounded at ({:.2}, {:.2}), turning to clearest heading ({clearance_cm:.0} cm)",
                pose.position.x,
                pose.position.y
            );
            self.counter = self.counter.saturating_sub(c.surround_relief);
            return Some(Escape::ClearestHeading {
                heading,
                clearance_cm,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};
    use std::sync::Arc;

    use super::*;
    use crate::world::{ArenaConfig, Environment, Obstacle, SensorConfig};

    fn sensor_with(obstacles: Vec<Obstacle>) -> RangeSensor {
        let env = Environment::new(&ArenaConfig::default(), obstacles).unwrap();
        RangeSensor::new(Arc::new(env), SensorConfig::default()).unwrap()
    }

    fn observe_at(
        monitor: &mut DeadlockMonitor,
        sensor: &RangeSensor,
        pose: Pose,
        surrounded: bool,
    ) -> Assessment {
        monitor.observe(&Observation { pose, surrounded }, sensor, 22.5)
    }

    #[test]
    fn test_healthy_progress_decays() {
        let sensor = sensor_with(Vec::new());
        let goal = Vec2::new(5.0, 1.0);
        let mut monitor = DeadlockMonitor::new(DeadlockConfig::default(), Vec2::new(1.0, 1.0), goal);

        // Three stationary ticks, then steady progress
        let still = Pose::new(1.0, 1.0, 0.0);
        for _ in 0..3 {
            observe_at(&mut monitor, &sensor, still, false);
        }
        assert_eq!(monitor.stuck(), 9);

        let a = observe_at(&mut monitor, &sensor, Pose::new(1.03, 1.0, 0.0), false);
        assert_eq!(a.band, ProgressBand::Healthy);
        assert!((a.progress - 0.03).abs() < 1e-4);
        assert_eq!(a.stuck_counter, 7);
    }

    #[test]
    fn test_band_order() {
        let sensor = sensor_with(Vec::new());
        let goal = Vec2::new(5.0, 3.0);
        let start = Vec2::new(3.0, 3.0);

        let mut monitor = DeadlockMonitor::new(DeadlockConfig::default(), start, goal);
        let a = observe_at(&mut monitor, &sensor, Pose::new(3.002, 3.0, 0.0), false);
        assert_eq!(a.band, ProgressBand::Creeping);

        let mut monitor = DeadlockMonitor::new(DeadlockConfig::default(), start, goal);
        let a = observe_at(&mut monitor, &sensor, Pose::new(2.96, 3.0, PI), false);
        assert_eq!(a.band, ProgressBand::Regressing);
        assert_eq!(a.stuck_counter, 2);

        // Sideways creep: movement 1 cm, progress near zero
        let mut monitor = DeadlockMonitor::new(DeadlockConfig::default(), start, goal);
        let a = observe_at(&mut monitor, &sensor, Pose::new(3.0, 3.01, FRAC_PI_2), false);
        assert_eq!(a.band, ProgressBand::Stalled);

        let mut monitor = DeadlockMonitor::new(DeadlockConfig::default(), start, goal);
        let a = observe_at(&mut monitor, &sensor, Pose::new(3.03, 3.0, 0.0), true);
        assert_eq!(a.band, ProgressBand::Surrounded);
    }

    #[test]
    fn test_stationary_robot_escapes_toward_goal() {
        let sensor = sensor_with(Vec::new());
        let goal = Vec2::new(3.0, 5.0);
        let start = Pose::new(3.0, 3.0, 0.0);
        let mut monitor = DeadlockMonitor::new(DeadlockConfig::default(), start.position, goal);

        let mut escaped_at = None;
        for tick in 1..=10 {
            let a = observe_at(&mut monitor, &sensor, start, false);
            if let Some(escape) = a.escape {
                escaped_at = Some((tick, escape));
                break;
            }
        }

        let (tick, escape) = escaped_at.unwrap();
        // 3 per tick crosses 18 on the seventh tick
        assert_eq!(tick, 7);
        assert_eq!(monitor.stuck(), 0);
        match escape {
            Escape::TowardGoal { heading } => {
                assert!((heading - 0.8 * FRAC_PI_2).abs() < 1e-4, "heading {heading}");
            }
            other => panic!("unexpected escape {other:?}"),
        }
    }

    #[test]
    fn test_surrounded_turns_to_clearest_heading() {
        // Open only to the west
        let sensor = sensor_with(vec![
            Obstacle::new(3.03, 3.5, 2.5, 3.5),
            Obstacle::new(1.0, 3.02, 3.03, 3.5),
            Obstacle::new(1.0, 3.02, 2.5, 2.97),
        ]);
        let pose = Pose::new(3.0, 3.0, 0.0);
        let mut monitor =
            DeadlockMonitor::new(DeadlockConfig::default(), pose.position, Vec2::new(5.0, 5.0));

        // Build the counter to 9 without crossing a threshold
        for _ in 0..3 {
            assert!(observe_at(&mut monitor, &sensor, pose, false).escape.is_none());
        }
        assert_eq!(monitor.stuck(), 9);

        // Still again: 12, then the relief takes 5 off
        let a = observe_at(&mut monitor, &sensor, pose, true);
        assert_eq!(a.band, ProgressBand::Still);
        assert!(!a.looping);
        assert_eq!(a.stuck_counter, 7);
        assert_eq!(monitor.stuck(), 7);
        match a.escape {
            Some(Escape::ClearestHeading {
                heading,
                clearance_cm,
            }) => {
                assert!((heading - PI).abs() < 1e-4, "heading {heading}");
                assert_eq!(clearance_cm, 100.0);
            }
            other => panic!("unexpected escape {other:?}"),
        }
        assert!((a.apply(pose).heading - PI).abs() < 1e-4);
    }

    #[test]
    fn test_loop_detection() {
        let sensor = sensor_with(Vec::new());
        let goal = Vec2::new(5.0, 5.0);
        let center = Vec2::new(3.0, 3.0);
        let mut monitor = DeadlockMonitor::new(DeadlockConfig::default(), center, goal);

        // Circle of radius 0.1 m: every position stays near every other
        let mut looped = false;
        for k in 0..40 {
            let angle = k as f32 * 0.3;
            let position = center + Vec2::new(angle.cos(), angle.sin()) * 0.1;
            let a = observe_at(&mut monitor, &sensor, Pose::new(position.x, position.y, angle), false);
            if a.looping {
                looped = true;
                assert!(k >= 20, "loop flagged with short history at {k}");
                break;
            }
        }
        assert!(looped);
    }

    #[test]
    fn test_loop_escape_below_goal_threshold() {
        let sensor = sensor_with(Vec::new());
        let goal = Vec2::new(5.0, 3.0);
        let mut monitor = DeadlockMonitor::new(DeadlockConfig::default(), Vec2::new(2.0, 3.0), goal);

        // Jitter sideways around one spot: creeping ticks add 1, the 2 cm
        // hops count as healthy and take 2 off, keeping the counter under 18
        let mut creeping = vec![true; 12];
        for _ in 0..4 {
            creeping.extend([true, false]);
        }
        creeping.push(true);
        assert_eq!(creeping.len(), 21);

        let mut y = 3.0_f32;
        let (mut creep_sign, mut hop_sign) = (1.0_f32, 1.0_f32);
        let mut expected = 0_u32;
        for (i, &creep) in creeping.iter().enumerate() {
            if creep {
                y += 0.002 * creep_sign;
                creep_sign = -creep_sign;
                expected += 1;
            } else {
                y += 0.02 * hop_sign;
                hop_sign = -hop_sign;
                expected = expected.saturating_sub(2);
            }
            let pose = Pose::new(2.0, y, FRAC_PI_2);
            let a = observe_at(&mut monitor, &sensor, pose, false);

            if i + 1 < creeping.len() {
                assert!(!a.looping, "looping at tick {}", i + 1);
                assert!(a.escape.is_none(), "escape at tick {}", i + 1);
                assert_eq!(a.stuck_counter, expected, "counter at tick {}", i + 1);
                continue;
            }

            // 21 positions within the radius, counter 9: loop escape
            assert_eq!(expected, 9);
            assert!(a.looping);
            assert_eq!(a.band, ProgressBand::Creeping);
            let error = normalize_angle(pose.angle_to(goal) - FRAC_PI_2);
            match a.escape {
                Some(Escape::TowardGoal { heading }) => {
                    assert!((heading - (FRAC_PI_2 + 0.8 * error)).abs() < 1e-5, "heading {heading}");
                }
                other => panic!("unexpected escape {other:?}"),
            }
            assert_eq!(a.stuck_counter, 0);
            assert_eq!(monitor.stuck(), 0);
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(DeadlockConfig::default().validate().is_ok());
        assert!(DeadlockConfig::smoothed().validate().is_ok());

        let config = DeadlockConfig {
            loop_window: 40,
            ..DeadlockConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
