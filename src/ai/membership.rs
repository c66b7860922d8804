//! Membership functions and sampled universes
//!
//! Closed-form triangular and trapezoidal shapes. A shape whose two adjacent
//! break points coincide has a vertical edge there, so `[0, 0, 10]` is fully
//! true at zero and falls off linearly to ten.

use serde::{Deserialize, Serialize};

use crate::core::ConfigError;

/// Shape of a fuzzy set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Break points `[a, b, c]`: rises from `a` to a peak at `b`, falls to `c`
    Triangular([f32; 3]),
    /// Break points `[a, b, c, d]`: rises from `a` to `b`, flat to `c`, falls to `d`
    Trapezoidal([f32; 4]),
}

impl Shape {
    /// Degree of membership of `x`, in `[0, 1]`
    #[must_use]
    pub fn degree(&self, x: f32) -> f32 {
        match *self {
            Self::Triangular([a, b, c]) => trapezoid(x, a, b, b, c),
            Self::Trapezoidal([a, b, c, d]) => trapezoid(x, a, b, c, d),
        }
    }

    fn points(&self) -> &[f32] {
        match self {
            Self::Triangular(p) => p,
            Self::Trapezoidal(p) => p,
        }
    }

    /// Break points are finite and non-decreasing
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let points = self.points();
        points.iter().all(|p| p.is_finite()) && points.windows(2).all(|w| w[0] <= w[1])
    }
}

#[inline]
fn trapezoid(x: f32, a: f32, b: f32, c: f32, d: f32) -> f32 {
    if x < a || x > d {
        0.0
    } else if x < b {
        (x - a) / (b - a)
    } else if x <= c {
        1.0
    } else {
        (d - x) / (d - c)
    }
}

/// Named fuzzy set
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipFunction {
    name: String,
    shape: Shape,
}

impl MembershipFunction {
    /// Create a membership function, checking its break points
    ///
    /// # Errors
    ///
    /// Returns an error if the break points are not finite and non-decreasing.
    pub fn new(name: impl Into<String>, shape: Shape) -> Result<Self, ConfigError> {
        let name = name.into();
        if !shape.is_valid() {
            return Err(ConfigError::InvalidShape { term: name });
        }
        Ok(Self { name, shape })
    }

    /// Term name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying shape
    #[must_use]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Degree of membership of `x`
    #[inline]
    #[must_use]
    pub fn degree(&self, x: f32) -> f32 {
        self.shape.degree(x)
    }
}

/// Closed interval sampled at a fixed step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Universe {
    /// Create a universe
    #[must_use]
    pub const fn new(min: f32, max: f32, step: f32) -> Self {
        Self { min, max, step }
    }

    pub(crate) fn validate(&self, variable: &'static str) -> Result<(), ConfigError> {
        let finite = self.min.is_finite() && self.max.is_finite() && self.step.is_finite();
        if !finite || self.min >= self.max || self.step <= 0.0 {
            return Err(ConfigError::InvalidUniverse { variable });
        }
        Ok(())
    }

    /// Clamp a value into the universe
    #[must_use]
    pub fn clamp(&self, x: f32) -> f32 {
        x.clamp(self.min, self.max)
    }

    /// Number of sample points, both ends included
    #[must_use]
    pub fn len(&self) -> usize {
        ((self.max - self.min) / self.step).round() as usize + 1
    }

    /// Always false for a validated universe
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample points from `min` to `max`
    pub fn samples(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.len()).map(move |i| (self.min + i as f32 * self.step).min(self.max))
    }
}
