//! Arena geometry and the occupancy predicate

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::ConfigError;

/// Number of wall rectangles framing every arena
pub const WALL_COUNT: usize = 4;

/// Arena dimensions and collision margin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Side length of the square arena in meters
    pub size: f32,
    /// Thickness of the four boundary walls in meters
    pub wall_thickness: f32,
    /// Distance by which every rectangle is expanded for collision tests
    pub collision_margin: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            size: 6.0,
            wall_thickness: 0.25,
            collision_margin: 0.01,
        }
    }
}

impl ArenaConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::require_positive("arena.size", self.size)?;
        ConfigError::require_positive("arena.wall_thickness", self.wall_thickness)?;
        ConfigError::require_non_negative("arena.collision_margin", self.collision_margin)?;
        if self.wall_thickness * 2.0 >= self.size {
            return Err(ConfigError::InvalidValue {
                field: "arena.wall_thickness",
                value: self.wall_thickness,
            });
        }
        Ok(())
    }
}

/// Axis-aligned rectangular obstacle in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

impl Obstacle {
    /// Create an obstacle from its bounds
    #[must_use]
    pub const fn new(x_min: f32, x_max: f32, y_min: f32, y_max: f32) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// Create an obstacle from a corner and its size
    #[must_use]
    pub fn from_corner(corner: Vec2, size: Vec2) -> Self {
        Self::new(corner.x, corner.x + size.x, corner.y, corner.y + size.y)
    }

    /// Center point
    #[must_use]
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.x_min + self.x_max) * 0.5,
            (self.y_min + self.y_max) * 0.5,
        )
    }

    /// Width and height
    #[must_use]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.x_max - self.x_min, self.y_max - self.y_min)
    }

    /// Whether `point` lies inside the rectangle expanded by `margin`.
    /// Points on the expanded boundary count as inside.
    #[inline]
    #[must_use]
    pub fn contains(&self, point: Vec2, margin: f32) -> bool {
        point.x >= self.x_min - margin
            && point.x <= self.x_max + margin
            && point.y >= self.y_min - margin
            && point.y <= self.y_max + margin
    }

    /// Whether the interiors of two rectangles intersect. Touching edges do not count.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.x_min < other.x_max
            && other.x_min < self.x_max
            && self.y_min < other.y_max
            && other.y_min < self.y_max
    }

    fn is_well_formed(&self) -> bool {
        let finite = [self.x_min, self.x_max, self.y_min, self.y_max]
            .iter()
            .all(|v| v.is_finite());
        finite && self.x_min < self.x_max && self.y_min < self.y_max
    }
}

/// Static arena: boundary walls plus interior obstacles.
///
/// Immutable once built. Every other component only reads it.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Side length of the arena
    size: f32,
    /// Collision margin applied to every rectangle
    margin: f32,
    /// Walls first, then interior obstacles
    rects: Vec<Obstacle>,
}

impl Environment {
    /// Build an arena from its configuration and interior obstacles.
    ///
    /// # Errors
    ///
    /// Returns an error if the arena configuration is invalid, an obstacle is
    /// degenerate, or two interior obstacles overlap.
    pub fn new(arena: &ArenaConfig, obstacles: Vec<Obstacle>) -> Result<Self, ConfigError> {
        arena.validate()?;

        for (index, obstacle) in obstacles.iter().enumerate() {
            if !obstacle.is_well_formed() {
                return Err(ConfigError::InvalidObstacle { index });
            }
        }
        for (i, a) in obstacles.iter().enumerate() {
            for (j, b) in obstacles.iter().enumerate().skip(i + 1) {
                if a.overlaps(b) {
                    return Err(ConfigError::OverlappingObstacles { first: i, second: j });
                }
            }
        }

        let size = arena.size;
        let t = arena.wall_thickness;
        let mut rects = Vec::with_capacity(WALL_COUNT + obstacles.len());
        rects.push(Obstacle::new(0.0, size, 0.0, t)); // bottom
        rects.push(Obstacle::new(0.0, size, size - t, size)); // top
        rects.push(Obstacle::new(0.0, t, 0.0, size)); // left
        rects.push(Obstacle::new(size - t, size, 0.0, size)); // right
        rects.extend(obstacles);

        log::debug!(
            "Built {}x{} m arena with {} obstacles",
            size,
            size,
            rects.len() - WALL_COUNT
        );

        Ok(Self {
            size,
            margin: arena.collision_margin,
            rects,
        })
    }

    /// Open arena with walls only
    ///
    /// # Errors
    ///
    /// Returns an error if the arena configuration is invalid.
    pub fn open(arena: &ArenaConfig) -> Result<Self, ConfigError> {
        Self::new(arena, Vec::new())
    }

    /// True iff `point` lies inside any wall or obstacle expanded by the margin
    #[must_use]
    pub fn is_occupied(&self, point: Vec2) -> bool {
        self.rects.iter().any(|r| r.contains(point, self.margin))
    }

    /// Arena side length
    #[must_use]
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Collision margin
    #[must_use]
    pub fn margin(&self) -> f32 {
        self.margin
    }

    /// The four boundary walls
    #[must_use]
    pub fn walls(&self) -> &[Obstacle] {
        &self.rects[..WALL_COUNT]
    }

    /// Interior obstacles, excluding walls
    #[must_use]
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.rects[WALL_COUNT..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> ArenaConfig {
        ArenaConfig::default()
    }

    #[test]
    fn test_walls_always_present() {
        let env = Environment::open(&arena()).unwrap();
        assert_eq!(env.walls().len(), WALL_COUNT);
        assert!(env.obstacles().is_empty());

        assert!(env.is_occupied(Vec2::new(0.1, 3.0)));
        assert!(env.is_occupied(Vec2::new(5.9, 3.0)));
        assert!(env.is_occupied(Vec2::new(3.0, 0.1)));
        assert!(env.is_occupied(Vec2::new(3.0, 5.9)));
        assert!(!env.is_occupied(Vec2::new(3.0, 3.0)));
    }

    #[test]
    fn test_expanded_boundary_is_occupied() {
        let block = Obstacle::new(2.0, 3.0, 2.0, 3.0);
        let env = Environment::new(&arena(), vec![block]).unwrap();
        let m = env.margin();

        // On the expanded boundary
        assert!(env.is_occupied(Vec2::new(2.0 - m, 2.5)));
        assert!(env.is_occupied(Vec2::new(3.0 + m, 2.5)));
        assert!(env.is_occupied(Vec2::new(2.5, 2.0 - m)));
        assert!(env.is_occupied(Vec2::new(2.5, 3.0 + m)));
        assert!(env.is_occupied(Vec2::new(2.0 - m, 2.0 - m)));

        // Just past the margin
        let eps = 1e-3;
        assert!(!env.is_occupied(Vec2::new(2.0 - m - eps, 2.5)));
        assert!(!env.is_occupied(Vec2::new(3.0 + m + eps, 2.5)));
        assert!(!env.is_occupied(Vec2::new(2.5, 2.0 - m - eps)));
        assert!(!env.is_occupied(Vec2::new(2.5, 3.0 + m + eps)));
    }

    #[test]
    fn test_rejects_degenerate_obstacle() {
        let result = Environment::new(&arena(), vec![Obstacle::new(2.0, 2.0, 1.0, 2.0)]);
        assert!(matches!(result, Err(ConfigError::InvalidObstacle { index: 0 })));
    }

    #[test]
    fn test_rejects_overlapping_obstacles() {
        let result = Environment::new(
            &arena(),
            vec![
                Obstacle::new(1.0, 2.0, 1.0, 2.0),
                Obstacle::new(3.0, 4.0, 3.0, 4.0),
                Obstacle::new(1.5, 2.5, 1.5, 2.5),
            ],
        );
        assert!(matches!(
            result,
            Err(ConfigError::OverlappingObstacles { first: 0, second: 2 })
        ));
    }

    #[test]
    fn test_touching_obstacles_allowed() {
        let result = Environment::new(
            &arena(),
            vec![
                Obstacle::new(1.0, 2.0, 1.0, 2.0),
                Obstacle::new(2.0, 3.0, 1.0, 2.0),
            ],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_obstacle_geometry() {
        let o = Obstacle::from_corner(Vec2::new(1.0, 2.0), Vec2::new(0.5, 0.25));
        assert!((o.center() - Vec2::new(1.25, 2.125)).length() < 1e-6);
        assert!((o.size() - Vec2::new(0.5, 0.25)).length() < 1e-6);
    }
}
