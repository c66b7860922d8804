//! Mamdani inference over a compiled [`RuleBase`]
//!
//! Each rule fires with the minimum of its antecedent memberships, clips its
//! consequent set at that strength, and all clipped sets are merged with max.
//! The crisp output is the centroid of the merged set over the sampled output
//! universe.

use super::rules::{InputVar, RuleBase};

/// Crisp inputs of the fuzzy tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyInputs {
    /// Front distance, centimeters
    pub front: f32,
    /// Left distance, centimeters
    pub left: f32,
    /// Right distance, centimeters
    pub right: f32,
    /// Target bearing, degrees
    pub bearing: f32,
}

impl FuzzyInputs {
    fn get(&self, input: InputVar) -> f32 {
        match input {
            InputVar::Front => self.front,
            InputVar::Left => self.left,
            InputVar::Right => self.right,
            InputVar::Bearing => self.bearing,
        }
    }
}

/// Total membership below which the aggregated set has no usable centroid
const MIN_AREA: f32 = 1e-6;

impl RuleBase {
    /// Degree of membership of an input value in one of its terms,
    /// after clamping the value into the variable's universe
    #[must_use]
    pub fn membership(&self, input: InputVar, term: usize, value: f32) -> f32 {
        let variable = self.variable(input);
        variable.terms()[term].degree(variable.universe().clamp(value))
    }

    /// Firing strength of every rule, in rule order
    #[must_use]
    pub fn firing_strengths(&self, inputs: &FuzzyInputs) -> Vec<f32> {
        self.rules()
            .iter()
            .map(|rule| {
                rule.antecedents
                    .iter()
                    .map(|a| self.membership(a.input, a.term, inputs.get(a.input)))
                    .fold(1.0_f32, f32::min)
            })
            .collect()
    }

    /// Aggregated output set sampled over the output universe
    #[must_use]
    pub fn aggregate(&self, inputs: &FuzzyInputs) -> Vec<f32> {
        let mut aggregated = vec![0.0_f32; self.output_samples.len()];

        // Every rule fires, even at zero strength
        for (rule, strength) in self.rules().iter().zip(self.firing_strengths(inputs)) {
            if strength <= 0.0 {
                continue;
            }
            let curve = &self.consequent_curves[rule.consequent];
            for (acc, &mu) in aggregated.iter_mut().zip(curve) {
                *acc = acc.max(mu.min(strength));
            }
        }

        aggregated
    }

    /// Crisp output by centroid defuzzification.
    ///
    /// Returns `None` when no rule fires with non-zero strength.
    #[must_use]
    pub fn infer(&self, inputs: &FuzzyInputs) -> Option<f32> {
        centroid(&self.output_samples, &self.aggregate(inputs))
    }
}

/// Centroid of a sampled set, or `None` if its total membership vanishes
#[must_use]
pub fn centroid(samples: &[f32], memberships: &[f32]) -> Option<f32> {
    let (moment, area) = samples
        .iter()
        .zip(memberships)
        .fold((0.0_f32, 0.0_f32), |(m, a), (&x, &mu)| (m + x * mu, a + mu));

    if area > MIN_AREA && moment.is_finite() {
        Some(moment / area)
    } else {
        None
    }
}
