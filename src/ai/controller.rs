//! Correction engine
//!
//! Maps a [`SensorReading`] and a target bearing to a heading correction in
//! degrees. The heuristic chain is consulted first; only when no guard
//! matches does fuzzy inference run, followed by a safety clamp. If inference
//! has no defined centroid a fixed fallback rule answers instead.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::heuristics::{Guard, HeuristicChain, HeuristicConfig};
use super::inference::FuzzyInputs;
use super::rules::{FuzzyConfig, InputVar, RuleBase};
use crate::core::ConfigError;
use crate::world::SensorReading;

/// Post-inference check for weak turns near a frontal obstacle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyClampConfig {
    /// Front distance below which a weak turn is strengthened, centimeters
    pub front_cm: f32,
    /// Outputs smaller than this in magnitude count as weak, degrees
    pub weak_turn_deg: f32,
    /// Magnitude a weak turn is raised to, degrees
    pub decisive_turn_deg: f32,
}

impl Default for SafetyClampConfig {
    fn default() -> Self {
        Self {
            front_cm: 15.0,
            weak_turn_deg: 15.0,
            decisive_turn_deg: 25.0,
        }
    }
}

/// Rule used when inference has no centroid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Front distance below which the fallback turns away hard, centimeters
    pub front_cm: f32,
    pub turn_deg: f32,
    /// Fraction of the bearing steered otherwise
    pub bearing_gain: f32,
    pub limit_deg: f32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            front_cm: 15.0,
            turn_deg: 50.0,
            bearing_gain: 0.4,
            limit_deg: 40.0,
        }
    }
}

/// Blend with the previous correction when nothing is close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InertiaConfig {
    /// All three readings must be at least this far, centimeters
    pub comfortable_cm: f32,
    /// Weight of the new correction, in `[0, 1]`
    pub blend: f32,
}

impl Default for InertiaConfig {
    fn default() -> Self {
        Self {
            comfortable_cm: 30.0,
            blend: 0.7,
        }
    }
}

/// Everything the correction engine needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub heuristics: HeuristicConfig,
    pub safety: SafetyClampConfig,
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub inertia: Option<InertiaConfig>,
    pub fuzzy: FuzzyConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::reactive()
    }
}

impl ControllerConfig {
    /// Sharp, memoryless controller
    #[must_use]
    pub fn reactive() -> Self {
        Self {
            heuristics: HeuristicConfig::reactive(),
            safety: SafetyClampConfig::default(),
            fallback: FallbackConfig::default(),
            inertia: None,
            fuzzy: FuzzyConfig::reactive(),
        }
    }

    /// Wider thresholds with inertia blending
    #[must_use]
    pub fn smoothed() -> Self {
        Self {
            heuristics: HeuristicConfig::smoothed(),
            safety: SafetyClampConfig {
                front_cm: 18.0,
                ..SafetyClampConfig::default()
            },
            fallback: FallbackConfig::default(),
            inertia: Some(InertiaConfig::default()),
            fuzzy: FuzzyConfig::smoothed(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.heuristics.validate()?;
        ConfigError::require_positive("safety.front_cm", self.safety.front_cm)?;
        ConfigError::require_non_negative("safety.weak_turn_deg", self.safety.weak_turn_deg)?;
        ConfigError::require_non_negative("safety.decisive_turn_deg", self.safety.decisive_turn_deg)?;
        ConfigError::require_positive("fallback.front_cm", self.fallback.front_cm)?;
        ConfigError::require_non_negative("fallback.bearing_gain", self.fallback.bearing_gain)?;
        ConfigError::require_positive("fallback.limit_deg", self.fallback.limit_deg)?;
        if let Some(inertia) = &self.inertia {
            ConfigError::require_non_negative("inertia.comfortable_cm", inertia.comfortable_cm)?;
            if !(0.0..=1.0).contains(&inertia.blend) {
                return Err(ConfigError::InvalidValue {
                    field: "inertia.blend",
                    value: inertia.blend,
                });
            }
        }
        Ok(())
    }
}

/// Which tier produced a correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionSource {
    /// A heuristic guard matched
    Heuristic(Guard),
    /// Fuzzy inference, used as is
    Fuzzy,
    /// Fuzzy inference strengthened by the safety clamp
    FuzzyClamped,
    /// Inference had no centroid; the fixed fallback rule answered
    Fallback,
    /// No decision was taken this tick
    Idle,
}

/// Correction and its provenance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Heading change in degrees, positive counter-clockwise
    pub correction: f32,
    pub source: DecisionSource,
    /// True when inertia blending altered the correction
    pub blended: bool,
}

/// Two-tier correction engine
#[derive(Debug, Clone)]
pub struct CorrectionEngine {
    chain: HeuristicChain,
    rules: Arc<RuleBase>,
    safety: SafetyClampConfig,
    fallback: FallbackConfig,
    inertia: Option<InertiaConfig>,
    /// Declared output bounds, degrees
    output_range: (f32, f32),
}

impl CorrectionEngine {
    /// Validate a configuration and compile its rule base
    ///
    /// # Errors
    ///
    /// Returns an error if any threshold or fuzzy definition is malformed.
    pub fn new(config: &ControllerConfig) -> Result<Self, ConfigError> {
        let rules = Arc::new(RuleBase::compile(&config.fuzzy)?);
        Self::with_rule_base(config, rules)
    }

    /// Build an engine around an already compiled, shared rule base.
    ///
    /// `config.fuzzy` is ignored in favour of `rules`.
    ///
    /// # Errors
    ///
    /// Returns an error if any threshold is malformed.
    pub fn with_rule_base(config: &ControllerConfig, rules: Arc<RuleBase>) -> Result<Self, ConfigError> {
        config.validate()?;
        let universe = rules.output().universe();

        Ok(Self {
            chain: HeuristicChain::new(config.heuristics.clone()),
            rules,
            safety: config.safety.clone(),
            fallback: config.fallback.clone(),
            inertia: config.inertia.clone(),
            output_range: (universe.min, universe.max),
        })
    }

    /// Shared rule base
    #[must_use]
    pub fn rule_base(&self) -> &Arc<RuleBase> {
        &self.rules
    }

    /// Declared output bounds in degrees
    #[must_use]
    pub fn output_range(&self) -> (f32, f32) {
        self.output_range
    }

    /// Decide the heading correction for one tick.
    ///
    /// `bearing` is the target direction relative to the heading in degrees;
    /// `previous` is the last tick's correction, used only for inertia.
    #[must_use]
    pub fn decide(&self, reading: &SensorReading, bearing: f32, previous: Option<f32>) -> Decision {
        let reading = self.clamp_reading(reading);
        let bearing = if bearing.is_finite() {
            bearing.clamp(-180.0, 180.0)
        } else {
            0.0
        };

        let (mut correction, source) = match self.chain.evaluate(&reading, bearing) {
            Some((guard, correction)) => (correction, DecisionSource::Heuristic(guard)),
            None => self.infer(&reading, bearing),
        };

        let mut blended = false;
        if let (Some(inertia), Some(previous)) = (&self.inertia, previous) {
            if reading.min() >= inertia.comfortable_cm {
                correction = inertia.blend * correction + (1.0 - inertia.blend) * previous;
                blended = true;
            }
        }

        let (lo, hi) = self.output_range;
        Decision {
            correction: if correction.is_finite() {
                correction.clamp(lo, hi)
            } else {
                0.0
            },
            source,
            blended,
        }
    }

    fn clamp_reading(&self, reading: &SensorReading) -> SensorReading {
        let front = self.rules.variable(InputVar::Front).universe();
        let lateral = self.rules.variable(InputVar::Left).universe();
        let clean = |v: f32, max: f32| if v.is_nan() { max } else { v };
        SensorReading {
            front: front.clamp(clean(reading.front, front.max)),
            left: lateral.clamp(clean(reading.left, lateral.max)),
            right: lateral.clamp(clean(reading.right, lateral.max)),
        }
    }

    fn infer(&self, reading: &SensorReading, bearing: f32) -> (f32, DecisionSource) {
        let inputs = FuzzyInputs {
            front: reading.front,
            left: reading.left,
            right: reading.right,
            bearing,
        };

        let Some(raw) = self.rules.infer(&inputs) else {
            log::debug!(
                "No fuzzy rule fired (front={:.1} left={:.1} right={:.1} bearing={:.1}), using fallback",
                reading.front,
                reading.left,
                reading.right,
                bearing
            );
            return (self.fallback_rule(reading, bearing), DecisionSource::Fallback);
        };

        let (lo, hi) = self.output_range;
        let output = raw.clamp(lo, hi);

        let safety = &self.safety;
        if reading.front < safety.front_cm && output.abs() < safety.weak_turn_deg {
            let forced = if reading.roomier_side() < 0.0 {
                output.min(-safety.decisive_turn_deg)
            } else {
                output.max(safety.decisive_turn_deg)
            };
            return (forced, DecisionSource::FuzzyClamped);
        }

        (output, DecisionSource::Fuzzy)
    }

    fn fallback_rule(&self, reading: &SensorReading, bearing: f32) -> f32 {
        let fb = &self.fallback;
        if reading.front < fb.front_cm {
            reading.roomier_side() * fb.turn_deg
        } else {
            (bearing * fb.bearing_gain).clamp(-fb.limit_deg, fb.limit_deg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> CorrectionEngine {
        CorrectionEngine::new(&ControllerConfig::reactive()).unwrap()
    }

    #[test]
    fn test_heuristic_short_circuits() {
        let d = engine().decide(&SensorReading::new(5.0, 100.0, 100.0), 0.0, None);
        assert_eq!(d.source, DecisionSource::Heuristic(Guard::FrontEmergency));
        assert!(d.correction.abs() >= 45.0);
    }

    #[test]
    fn test_fuzzy_tier_reached() {
        // Both sides pinned with room ahead: no guard matches
        let d = engine().decide(&SensorReading::new(30.0, 5.0, 5.0), 40.0, None);
        assert_eq!(d.source, DecisionSource::Fuzzy);
        assert!(d.correction > 0.0, "correction {}", d.correction);
    }

    #[test]
    fn test_fallback_when_no_rule_fires() {
        let d = engine().decide(&SensorReading::new(60.0, 5.0, 5.0), 90.0, None);
        assert_eq!(d.source, DecisionSource::Fallback);
        assert!((d.correction - 36.0).abs() < 1e-4);
    }

    #[test]
    fn test_fallback_close_front_turns_away() {
        let engine = engine();
        let reading = SensorReading::new(12.0, 3.0, 6.0);
        assert_eq!(engine.fallback_rule(&reading, 0.0), -50.0);
        assert_eq!(engine.fallback_rule(&SensorReading::new(12.0, 6.0, 3.0), 0.0), 50.0);
    }

    #[test]
    fn test_safety_clamp_forces_decisive_turn() {
        // Narrow band, target ahead, no side pinned: the opposing lateral
        // rules nearly cancel and the clamp has to step in
        let d = engine().decide(&SensorReading::new(12.0, 50.0, 50.0), 0.0, None);
        assert_eq!(d.source, DecisionSource::FuzzyClamped);
        assert_eq!(d.correction, 25.0);
    }

    #[test]
    fn test_output_always_within_bounds() {
        for preset in [ControllerConfig::reactive(), ControllerConfig::smoothed()] {
            let engine = CorrectionEngine::new(&preset).unwrap();
            let (lo, hi) = engine.output_range();

            let distances = [0.0, 4.0, 9.9, 12.0, 16.0, 22.0, 35.0, 60.0, 250.0];
            let bearings = [-180.0, -120.0, -90.0, -25.0, 0.0, 10.0, 45.0, 90.0, 180.0];
            for &f in &distances {
                for &l in &distances {
                    for &r in &distances {
                        for &b in &bearings {
                            let d = engine.decide(&SensorReading::new(f, l, r), b, Some(b));
                            assert!(
                                d.correction >= lo && d.correction <= hi,
                                "({f}, {l}, {r}, {b}) -> {}",
                                d.correction
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_non_finite_inputs_handled() {
        let d = engine().decide(&SensorReading::new(f32::NAN, 50.0, 50.0), f32::NAN, None);
        assert!(d.correction.is_finite());
    }

    #[test]
    fn test_inertia_blends_when_comfortable() {
        let engine = CorrectionEngine::new(&ControllerConfig::smoothed()).unwrap();
        let open = SensorReading::new(100.0, 100.0, 100.0);

        let fresh = engine.decide(&open, 60.0, None);
        let blended = engine.decide(&open, 60.0, Some(0.0));

        assert!(!fresh.blended);
        assert!(blended.blended);
        assert!((blended.correction - fresh.correction * 0.7).abs() < 1e-4);
    }

    #[test]
    fn test_inertia_ignored_near_obstacles() {
        let engine = CorrectionEngine::new(&ControllerConfig::smoothed()).unwrap();
        let d = engine.decide(&SensorReading::new(100.0, 20.0, 100.0), 60.0, Some(0.0));
        assert!(!d.blended);
    }

    #[test]
    fn test_shared_rule_base() {
        let config = ControllerConfig::reactive();
        let rules = Arc::new(RuleBase::compile(&config.fuzzy).unwrap());

        let a = CorrectionEngine::with_rule_base(&config, Arc::clone(&rules)).unwrap();
        let b = CorrectionEngine::with_rule_base(&config, Arc::clone(&rules)).unwrap();
        assert!(Arc::ptr_eq(a.rule_base(), b.rule_base()));
    }

    #[test]
    fn test_invalid_inertia_rejected() {
        let mut config = ControllerConfig::smoothed();
        config.inertia = Some(InertiaConfig {
            comfortable_cm: 30.0,
            blend: 1.5,
        });
        assert!(CorrectionEngine::new(&config).is_err());
    }
}
