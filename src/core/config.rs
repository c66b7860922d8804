//! Run configuration and construction errors
//!
//! [`NavConfig`] gathers every tunable of a run. Two presets ship with the
//! crate; either can be saved to and loaded from RON or JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ai::ControllerConfig;
use crate::nav::{DeadlockConfig, MotionConfig};
use crate::world::{ArenaConfig, SensorConfig};

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while validating configuration or building a run
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A numeric parameter is out of range
    InvalidValue { field: &'static str, value: f32 },
    /// An obstacle has non-finite or inverted bounds
    InvalidObstacle { index: usize },
    /// Two interior obstacles overlap
    OverlappingObstacles { first: usize, second: usize },
    /// A membership function's breakpoints are not ordered
    InvalidShape { term: String },
    /// A linguistic variable has an empty or inverted universe
    InvalidUniverse { variable: &'static str },
    /// A term name appears twice in one variable
    DuplicateTerm { variable: &'static str, term: String },
    /// A rule names a term its variable does not define
    UnknownTerm { variable: &'static str, term: String },
    /// A rule has no antecedents
    EmptyRule { index: usize },
    /// The rule base has no rules
    EmptyRuleBase,
    /// The start position lies inside an obstacle or wall
    StartOccupied,
    /// Reading or writing a configuration file failed
    Io(String),
    /// A configuration file could not be parsed or written
    Parse(String),
}

impl ConfigError {
    /// Reject values that are not finite and strictly positive
    pub(crate) fn require_positive(field: &'static str, value: f32) -> Result<(), Self> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(Self::InvalidValue { field, value })
        }
    }

    /// Reject values that are not finite and non-negative
    pub(crate) fn require_non_negative(field: &'static str, value: f32) -> Result<(), Self> {
        if value.is_finite() && value >= 0.0 {
            Ok(())
        } else {
            Err(Self::InvalidValue { field, value })
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, value } => write!(f, "Invalid value for {field}: {value}"),
            Self::InvalidObstacle { index } => write!(f, "Obstacle {index} has invalid bounds"),
            Self::OverlappingObstacles { first, second } => {
                write!(f, "Obstacles {first} and {second} overlap")
            }
            Self::InvalidShape { term } => {
                write!(f, "Membership function '{term}' has unordered breakpoints")
            }
            Self::InvalidUniverse { variable } => {
                write!(f, "Variable '{variable}' has an invalid universe")
            }
            Self::DuplicateTerm { variable, term } => {
                write!(f, "Variable '{variable}' defines term '{term}' twice")
            }
            Self::UnknownTerm { variable, term } => {
                write!(f, "Variable '{variable}' has no term '{term}'")
            }
            Self::EmptyRule { index } => write!(f, "Rule {index} has no antecedents"),
            Self::EmptyRuleBase => write!(f, "Rule base is empty"),
            Self::StartOccupied => write!(f, "Start position is occupied"),
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Configuration
// ============================================================================

/// Named controller tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Preset {
    /// Sharp, memoryless corrections
    #[default]
    Reactive,
    /// Wider sets, extra rules and inertia blending
    Smoothed,
}

impl Preset {
    /// Parse a preset name, ignoring case
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "reactive" => Some(Self::Reactive),
            "smoothed" => Some(Self::Smoothed),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Reactive => "reactive",
            Self::Smoothed => "smoothed",
        }
    }
}

/// Complete configuration of a navigation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavConfig {
    pub arena: ArenaConfig,
    pub sensor: SensorConfig,
    pub motion: MotionConfig,
    pub deadlock: DeadlockConfig,
    pub controller: ControllerConfig,
    /// Distance to the goal counted as arrival, meters
    pub goal_tolerance: f32,
    /// Tick budget before a run times out
    pub max_ticks: u32,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self::preset(Preset::Reactive)
    }
}

impl NavConfig {
    /// Configuration for a named preset
    #[must_use]
    pub fn preset(preset: Preset) -> Self {
        let (controller, deadlock) = match preset {
            Preset::Reactive => (ControllerConfig::reactive(), DeadlockConfig::default()),
            Preset::Smoothed => (ControllerConfig::smoothed(), DeadlockConfig::smoothed()),
        };
        Self {
            arena: ArenaConfig::default(),
            sensor: SensorConfig::default(),
            motion: MotionConfig::default(),
            deadlock,
            controller,
            goal_tolerance: 0.08,
            max_ticks: 5000,
        }
    }

    #[must_use]
    pub fn with_goal_tolerance(mut self, tolerance: f32) -> Self {
        self.goal_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u32) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Check every section.
    ///
    /// The rule base is validated separately when it is compiled.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.arena.validate()?;
        self.sensor.validate()?;
        self.motion.validate()?;
        self.deadlock.validate()?;
        self.controller.validate()?;
        ConfigError::require_positive("goal_tolerance", self.goal_tolerance)?;
        if self.max_ticks == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_ticks",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// Parse a configuration from RON text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize to pretty RON text
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = self.to_ron_string()?;
        fs::write(path, text).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Load from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Save to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, text).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Load from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
