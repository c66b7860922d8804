//! Priority heuristic tier
//!
//! An ordered list of guards, each a predicate over the three distances and
//! the target bearing paired with a fixed response. The first guard that
//! matches decides the correction outright and the fuzzy tier is skipped.
//!
//! # Design Principles
//!
//! - **Decisive**: close-range responses are never averaged away
//! - **Ordered**: the chain is data, so presets can reorder or drop guards
//! - **Pure**: a guard reads its inputs and thresholds and nothing else

use serde::{Deserialize, Serialize};

use crate::core::ConfigError;
use crate::world::SensorReading;

// ============================================================================
// Guards
// ============================================================================

/// Guards available to the heuristic chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Guard {
    /// Something is about to be hit head-on
    FrontEmergency,
    /// Plenty of room ahead and on both sides: steer at the target
    ClearCruise,
    /// Room ahead but one side almost touching: lean away while cruising
    LateralNudge,
    /// Medium room ahead with the target roughly in front
    NarrowCruise,
    /// Medium room ahead, one side almost touching: step toward the open side
    NarrowSidestep,
}

impl Guard {
    /// Guard name for logging
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FrontEmergency => "FrontEmergency",
            Self::ClearCruise => "ClearCruise",
            Self::LateralNudge => "LateralNudge",
            Self::NarrowCruise => "NarrowCruise",
            Self::NarrowSidestep => "NarrowSidestep",
        }
    }

    /// Response of this guard, or `None` if its condition does not hold
    #[must_use]
    pub fn respond(self, cfg: &HeuristicConfig, reading: &SensorReading, bearing: f32) -> Option<f32> {
        let SensorReading { front, left, right } = *reading;

        match self {
            Self::FrontEmergency => {
                if front >= cfg.emergency_front_cm {
                    return None;
                }
                if right > left + cfg.tie_tolerance_cm {
                    Some(-cfg.emergency_turn_deg)
                } else if left > right + cfg.tie_tolerance_cm {
                    Some(cfg.emergency_turn_deg)
                } else if bearing > 0.0 {
                    // Sides too close to call: break toward the target
                    Some(cfg.tie_turn_deg)
                } else {
                    Some(-cfg.tie_turn_deg)
                }
            }

            Self::ClearCruise => {
                let sides_clear = left >= cfg.lateral_critical_cm && right >= cfg.lateral_critical_cm;
                if front <= cfg.clear_front_cm || !sides_clear {
                    return None;
                }
                if bearing.abs() < cfg.aligned_bearing_deg {
                    Some(scaled(bearing, cfg.aligned_gain, cfg.aligned_limit_deg))
                } else {
                    Some(scaled(bearing, cfg.cruise_gain, cfg.cruise_limit_deg))
                }
            }

            Self::LateralNudge => {
                if front <= cfg.clear_front_cm {
                    return None;
                }
                let base = bearing * cfg.nudge_gain;
                if left < cfg.lateral_critical_cm && right > cfg.lateral_room_cm {
                    Some((base - cfg.nudge_deg).clamp(-cfg.nudge_limit_deg, cfg.nudge_limit_deg))
                } else if right < cfg.lateral_critical_cm && left > cfg.lateral_room_cm {
                    Some((base + cfg.nudge_deg).clamp(-cfg.nudge_limit_deg, cfg.nudge_limit_deg))
                } else {
                    None
                }
            }

            Self::NarrowCruise => {
                let in_band = front >= cfg.emergency_front_cm && front <= cfg.clear_front_cm;
                if in_band
                    && bearing.abs() < cfg.narrow_bearing_deg
                    && front > cfg.narrow_pass_front_cm
                {
                    Some(scaled(bearing, cfg.narrow_gain, cfg.narrow_limit_deg))
                } else {
                    None
                }
            }

            Self::NarrowSidestep => {
                let in_band = front >= cfg.emergency_front_cm && front <= cfg.narrow_pass_front_cm;
                if !in_band || bearing.abs() >= cfg.narrow_bearing_deg {
                    return None;
                }
                let margin = cfg.sidestep_margin_cm;
                let left_pinned = left < cfg.lateral_critical_cm && right > left + margin;
                let right_pinned = right < cfg.lateral_critical_cm && left > right + margin;
                if !(left_pinned || right_pinned) {
                    return None;
                }
                Some(reading.roomier_side() * cfg.sidestep_turn_deg)
            }
        }
    }
}

#[inline]
fn scaled(bearing: f32, gain: f32, limit: f32) -> f32 {
    (bearing * gain).clamp(-limit, limit)
}

// ============================================================================
// Configuration
// ============================================================================

/// Thresholds and responses of the heuristic tier.
///
/// Distances are centimeters, angles degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicConfig {
    /// Guards in evaluation order
    pub order: Vec<Guard>,

    pub emergency_front_cm: f32,
    /// Lateral difference below which the sides count as equal
    pub tie_tolerance_cm: f32,
    pub emergency_turn_deg: f32,
    pub tie_turn_deg: f32,

    pub clear_front_cm: f32,
    pub lateral_critical_cm: f32,
    pub lateral_room_cm: f32,

    pub aligned_bearing_deg: f32,
    pub aligned_gain: f32,
    pub aligned_limit_deg: f32,
    pub cruise_gain: f32,
    pub cruise_limit_deg: f32,

    pub nudge_gain: f32,
    pub nudge_deg: f32,
    pub nudge_limit_deg: f32,

    pub narrow_bearing_deg: f32,
    pub narrow_pass_front_cm: f32,
    pub narrow_gain: f32,
    pub narrow_limit_deg: f32,
    pub sidestep_margin_cm: f32,
    pub sidestep_turn_deg: f32,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self::reactive()
    }
}

impl HeuristicConfig {
    /// Default chain order
    pub const DEFAULT_ORDER: [Guard; 5] = [
        Guard::FrontEmergency,
        Guard::ClearCruise,
        Guard::LateralNudge,
        Guard::NarrowCruise,
        Guard::NarrowSidestep,
    ];

    /// Late, sharp reactions
    #[must_use]
    pub fn reactive() -> Self {
        Self {
            order: Self::DEFAULT_ORDER.to_vec(),
            emergency_front_cm: 10.0,
            tie_tolerance_cm: 3.0,
            emergency_turn_deg: 60.0,
            tie_turn_deg: 45.0,
            clear_front_cm: 20.0,
            lateral_critical_cm: 8.0,
            lateral_room_cm: 15.0,
            aligned_bearing_deg: 20.0,
            aligned_gain: 0.5,
            aligned_limit_deg: 20.0,
            cruise_gain: 0.4,
            cruise_limit_deg: 45.0,
            nudge_gain: 0.3,
            nudge_deg: 15.0,
            nudge_limit_deg: 45.0,
            narrow_bearing_deg: 30.0,
            narrow_pass_front_cm: 15.0,
            narrow_gain: 0.3,
            narrow_limit_deg: 30.0,
            sidestep_margin_cm: 5.0,
            sidestep_turn_deg: 30.0,
        }
    }

    /// Earlier reactions and gentler cruising
    #[must_use]
    pub fn smoothed() -> Self {
        Self {
            emergency_front_cm: 12.0,
            clear_front_cm: 25.0,
            lateral_critical_cm: 10.0,
            lateral_room_cm: 18.0,
            cruise_gain: 0.35,
            cruise_limit_deg: 40.0,
            narrow_pass_front_cm: 18.0,
            ..Self::reactive()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("heuristics.emergency_front_cm", self.emergency_front_cm),
            ("heuristics.clear_front_cm", self.clear_front_cm),
            ("heuristics.lateral_critical_cm", self.lateral_critical_cm),
            ("heuristics.narrow_bearing_deg", self.narrow_bearing_deg),
        ] {
            ConfigError::require_positive(field, value)?;
        }
        for (field, value) in [
            ("heuristics.tie_tolerance_cm", self.tie_tolerance_cm),
            ("heuristics.aligned_gain", self.aligned_gain),
            ("heuristics.cruise_gain", self.cruise_gain),
            ("heuristics.nudge_gain", self.nudge_gain),
            ("heuristics.narrow_gain", self.narrow_gain),
        ] {
            ConfigError::require_non_negative(field, value)?;
        }
        if self.clear_front_cm < self.emergency_front_cm {
            return Err(ConfigError::InvalidValue {
                field: "heuristics.clear_front_cm",
                value: self.clear_front_cm,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Chain
// ============================================================================

/// Ordered guard chain bound to its thresholds
#[derive(Debug, Clone)]
pub struct HeuristicChain {
    config: HeuristicConfig,
}

impl HeuristicChain {
    /// Create a chain from its configuration
    #[must_use]
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }

    /// Thresholds in use
    #[must_use]
    pub fn config(&self) -> &HeuristicConfig {
        &self.config
    }

    /// First matching guard and its response
    #[must_use]
    pub fn evaluate(&self, reading: &SensorReading, bearing: f32) -> Option<(Guard, f32)> {
        self.config.order.iter().find_map(|&guard| {
            guard
                .respond(&self.config, reading, bearing)
                .map(|correction| (guard, correction))
        })
    }
}
