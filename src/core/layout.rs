//! Arena layout serialization
//!
//! A layout is everything that varies between episodes: the interior
//! obstacles, the start pose and the goal. Layouts are saved and loaded in
//! RON (Rusty Object Notation) or JSON.

use std::fs;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::{ConfigError, NavConfig};
use crate::nav::{Pose, RunState, init_run};
use crate::world::Obstacle;

/// Obstacles, start pose and goal of one episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaLayout {
    /// Layout name
    pub name: String,
    /// Layout version for compatibility
    pub version: u32,
    pub start: Pose,
    pub goal: Vec2,
    /// Interior obstacles; the boundary walls are implicit
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
}

impl ArenaLayout {
    /// Create a layout with no interior obstacles
    #[must_use]
    pub fn new(name: impl Into<String>, start: Pose, goal: Vec2) -> Self {
        Self {
            name: name.into(),
            version: 1,
            start,
            goal,
            obstacles: Vec::new(),
        }
    }

    /// Add an obstacle, returning its index
    pub fn add_obstacle(&mut self, obstacle: Obstacle) -> usize {
        let index = self.obstacles.len();
        self.obstacles.push(obstacle);
        index
    }

    /// Builder form of [`ArenaLayout::add_obstacle`]
    #[must_use]
    pub fn with_obstacle(mut self, obstacle: Obstacle) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    /// Built-in layout: ten blocks scattered across a 6 m arena, none within
    /// a meter of the start corner, goal in the far corner.
    #[must_use]
    pub fn demo() -> Self {
        const BLOCKS: [Obstacle; 10] = [
            Obstacle::new(1.8, 2.2, 0.9, 1.3),
            Obstacle::new(3.2, 3.6, 0.6, 1.0),
            Obstacle::new(4.5, 4.9, 1.6, 2.0),
            Obstacle::new(1.0, 1.4, 2.2, 2.6),
            Obstacle::new(2.6, 3.0, 2.0, 2.4),
            Obstacle::new(3.8, 4.2, 3.0, 3.4),
            Obstacle::new(1.6, 2.0, 3.6, 4.0),
            Obstacle::new(2.8, 3.2, 4.4, 4.8),
            Obstacle::new(4.6, 5.0, 4.2, 4.6),
            Obstacle::new(0.7, 1.1, 4.6, 5.0),
        ];

        Self {
            name: "demo".to_string(),
            version: 1,
            start: Pose::new(0.5, 0.5, std::f32::consts::FRAC_PI_4),
            goal: Vec2::new(4.0, 4.8),
            obstacles: BLOCKS.to_vec(),
        }
    }

    /// Build a run over this layout
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or the layout is invalid
    pub fn start_run(&self, config: NavConfig) -> Result<RunState, ConfigError> {
        init_run(self.obstacles.clone(), self.start, self.goal, config)
    }

    /// Save the layout to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), LayoutError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| LayoutError::Serialize(e.to_string()))?;
        fs::write(path, ron_string).map_err(|e| LayoutError::Io(e.to_string()))?;
        Ok(())
    }

    /// Load a layout from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let content = fs::read_to_string(path).map_err(|e| LayoutError::Io(e.to_string()))?;
        ron::from_str(&content).map_err(|e| LayoutError::Deserialize(e.to_string()))
    }

    /// Save the layout to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), LayoutError> {
        let json_string = serde_json::to_string_pretty(self)
            .map_err(|e| LayoutError::Serialize(e.to_string()))?;
        fs::write(path, json_string).map_err(|e| LayoutError::Io(e.to_string()))?;
        Ok(())
    }

    /// Load a layout from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let content = fs::read_to_string(path).map_err(|e| LayoutError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| LayoutError::Deserialize(e.to_string()))
    }

    /// Load a layout, picking the format from the file extension.
    /// Anything other than `.json` is read as RON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::load_json(path),
            _ => Self::load_ron(path),
        }
    }

    #[must_use]
    pub fn obstacle_count(&self) -> usize {
        self.obstacles.len()
    }
}

impl Default for ArenaLayout {
    fn default() -> Self {
        Self::demo()
    }
}

/// Errors that can occur during layout file operations
#[derive(Debug, Clone)]
pub enum LayoutError {
    /// IO error
    Io(String),
    /// Serialization error
    Serialize(String),
    /// Deserialization error
    Deserialize(String),
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Serialize(e) => write!(f, "Serialization error: {e}"),
            Self::Deserialize(e) => write!(f, "Deserialization error: {e}"),
        }
    }
}

impl std::error::Error for LayoutError {}
