//! Robot pose and angle helpers
//!
//! Headings grow counter-clockwise from the +X axis. A positive bearing or
//! correction therefore means "to the robot's left".

use std::f32::consts::{PI, TAU};

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Wrap an angle in radians into `(-PI, PI]`.
#[must_use]
pub fn normalize_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}

/// Unit vector pointing along `heading`
#[inline]
#[must_use]
pub fn direction(heading: f32) -> Vec2 {
    Vec2::new(heading.cos(), heading.sin())
}

/// Position and heading of the robot
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Position in meters
    pub position: Vec2,
    /// Heading in radians, not kept in any canonical range
    pub heading: f32,
}

impl Pose {
    /// Create a pose from coordinates and heading
    #[must_use]
    pub fn new(x: f32, y: f32, heading: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            heading,
        }
    }

    /// Point reached by moving `distance` meters along `heading` from here
    #[must_use]
    pub fn project(&self, heading: f32, distance: f32) -> Vec2 {
        self.position + direction(heading) * distance
    }

    /// Same position, different heading
    #[must_use]
    pub fn with_heading(self, heading: f32) -> Self {
        Self { heading, ..self }
    }

    /// Straight-line distance to a point
    #[must_use]
    pub fn distance_to(&self, point: Vec2) -> f32 {
        self.position.distance(point)
    }

    /// Absolute direction from this position to `point`, in radians
    #[must_use]
    pub fn angle_to(&self, point: Vec2) -> f32 {
        let delta = point - self.position;
        delta.y.atan2(delta.x)
    }

    /// Direction of `point` relative to the heading, in `(-PI, PI]`
    #[must_use]
    pub fn bearing_to(&self, point: Vec2) -> f32 {
        normalize_angle(self.angle_to(point) - self.heading)
    }

    /// Relative bearing to `point` in degrees, within `[-180, 180]`
    #[must_use]
    pub fn bearing_degrees_to(&self, point: Vec2) -> f32 {
        self.bearing_to(point).to_degrees().clamp(-180.0, 180.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_angle_range() {
        for i in -40..=40 {
            let angle = i as f32 * 0.5;
            let n = normalize_angle(angle);
            assert!(n > -PI - 1e-5 && n <= PI + 1e-5, "{angle} -> {n}");
            // Same direction after wrapping
            assert!((n.cos() - angle.cos()).abs() < 1e-4);
            assert!((n.sin() - angle.sin()).abs() < 1e-4);
        }
    }

    #[test]
    fn test_normalize_angle_keeps_pi() {
        assert!((normalize_angle(PI) - PI).abs() < 1e-6);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-5);
    }

    #[test]
    fn test_bearing_signs() {
        let pose = Pose::new(0.0, 0.0, 0.0);

        // Target to the left (counter-clockwise) is positive
        assert!(pose.bearing_degrees_to(Vec2::new(1.0, 1.0)) > 0.0);
        assert!(pose.bearing_degrees_to(Vec2::new(1.0, -1.0)) < 0.0);
        assert!((pose.bearing_degrees_to(Vec2::new(1.0, 1.0)) - 45.0).abs() < 1e-3);
    }

    #[test]
    fn test_bearing_wraps_large_heading() {
        let pose = Pose::new(0.0, 0.0, 4.0 * TAU + 0.1);
        let bearing = pose.bearing_to(Vec2::new(1.0, 0.0));
        assert!((bearing + 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_project() {
        let pose = Pose::new(1.0, 1.0, PI / 2.0);
        let p = pose.project(pose.heading, 0.5);
        assert!((p - Vec2::new(1.0, 1.5)).length() < 1e-5);
    }
}
