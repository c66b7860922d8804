//! Fuzzy rule base
//!
//! The rule base is described by plain, serialisable definitions
//! ([`FuzzyConfig`]) and compiled once into an immutable [`RuleBase`] where
//! every term reference is resolved to an index. A compiled rule base holds
//! no per-run state and can be shared across runs behind an `Arc`.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::membership::{MembershipFunction, Shape, Universe};
use crate::core::ConfigError;

// ============================================================================
// Definitions
// ============================================================================

/// Named term in a variable definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermDef {
    pub name: String,
    pub shape: Shape,
}

impl TermDef {
    fn tri(name: &str, points: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            shape: Shape::Triangular(points),
        }
    }

    fn trap(name: &str, points: [f32; 4]) -> Self {
        Self {
            name: name.to_string(),
            shape: Shape::Trapezoidal(points),
        }
    }
}

/// Universe plus the terms defined over it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub universe: Universe,
    pub terms: Vec<TermDef>,
}

/// One rule: every named antecedent must hold (AND) to imply `then`.
///
/// Unset antecedents are not part of the rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleDef {
    #[serde(default)]
    pub front: Option<String>,
    #[serde(default)]
    pub left: Option<String>,
    #[serde(default)]
    pub right: Option<String>,
    #[serde(default)]
    pub bearing: Option<String>,
    pub then: String,
}

impl RuleDef {
    fn new(then: &str) -> Self {
        Self {
            then: then.to_string(),
            ..Default::default()
        }
    }

    fn front(mut self, term: &str) -> Self {
        self.front = Some(term.to_string());
        self
    }

    fn left(mut self, term: &str) -> Self {
        self.left = Some(term.to_string());
        self
    }

    fn right(mut self, term: &str) -> Self {
        self.right = Some(term.to_string());
        self
    }

    fn bearing(mut self, term: &str) -> Self {
        self.bearing = Some(term.to_string());
        self
    }
}

/// Complete description of the fuzzy tier.
///
/// The left and right distance inputs share one variable definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyConfig {
    pub front: VariableDef,
    pub lateral: VariableDef,
    pub bearing: VariableDef,
    pub output: VariableDef,
    pub rules: Vec<RuleDef>,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self::reactive()
    }
}

impl FuzzyConfig {
    /// Eighteen-rule base tuned to react late and pass close to obstacles
    #[must_use]
    pub fn reactive() -> Self {
        Self {
            front: distance_variable(10.0, [5.0, 15.0, 25.0], [20.0, 35.0, 50.0], [40.0, 60.0]),
            lateral: distance_variable(8.0, [5.0, 15.0, 25.0], [20.0, 35.0, 55.0], [45.0, 60.0]),
            bearing: bearing_variable(),
            output: output_variable(),
            rules: base_rules(),
        }
    }

    /// Wider sets and three extra rules; pairs with inertia blending
    #[must_use]
    pub fn smoothed() -> Self {
        let mut rules = base_rules();
        rules.push(RuleDef::new("right").front("medium").left("very_near"));
        rules.push(RuleDef::new("left").front("medium").right("very_near"));
        rules.push(
            RuleDef::new("hard_left")
                .front("very_near")
                .left("near")
                .right("near"),
        );

        Self {
            front: distance_variable(12.0, [6.0, 18.0, 30.0], [25.0, 40.0, 55.0], [45.0, 65.0]),
            lateral: distance_variable(10.0, [6.0, 16.0, 28.0], [22.0, 38.0, 58.0], [50.0, 65.0]),
            bearing: bearing_variable(),
            output: output_variable(),
            rules,
        }
    }
}

fn distance_variable(very_near: f32, near: [f32; 3], medium: [f32; 3], far: [f32; 2]) -> VariableDef {
    VariableDef {
        universe: Universe::new(0.0, 100.0, 1.0),
        terms: vec![
            TermDef::tri("very_near", [0.0, 0.0, very_near]),
            TermDef::tri("near", near),
            TermDef::tri("medium", medium),
            TermDef::trap("far", [far[0], far[1], 100.0, 100.0]),
        ],
    }
}

fn bearing_variable() -> VariableDef {
    VariableDef {
        universe: Universe::new(-180.0, 180.0, 1.0),
        terms: vec![
            TermDef::tri("hard_right", [-180.0, -135.0, -90.0]),
            TermDef::tri("right", [-90.0, -45.0, 0.0]),
            TermDef::tri("ahead", [-30.0, 0.0, 30.0]),
            TermDef::tri("left", [0.0, 45.0, 90.0]),
            TermDef::tri("hard_left", [90.0, 135.0, 180.0]),
        ],
    }
}

fn output_variable() -> VariableDef {
    VariableDef {
        universe: Universe::new(-90.0, 90.0, 1.0),
        terms: vec![
            TermDef::tri("hard_right", [-90.0, -60.0, -30.0]),
            TermDef::tri("right", [-45.0, -20.0, 0.0]),
            TermDef::tri("straight", [-15.0, 0.0, 15.0]),
            TermDef::tri("left", [0.0, 20.0, 45.0]),
            TermDef::tri("hard_left", [30.0, 60.0, 90.0]),
        ],
    }
}

fn base_rules() -> Vec<RuleDef> {
    let mut rules = vec![
        // Blocked ahead: swing hard toward the open side
        RuleDef::new("hard_left").front("very_near").left("far").right("near"),
        RuleDef::new("hard_right").front("very_near").left("near").right("far"),
        RuleDef::new("left").front("very_near").left("medium").right("medium"),
        // Obstacle approaching
        RuleDef::new("left").front("near").left("far").right("medium"),
        RuleDef::new("right").front("near").left("medium").right("far"),
        RuleDef::new("left").front("near").left("far").right("far"),
    ];

    // Some room ahead: follow the target
    for front in ["medium", "far"] {
        for (bearing, then) in [
            ("ahead", "straight"),
            ("left", "left"),
            ("right", "right"),
            ("hard_left", "hard_left"),
            ("hard_right", "hard_right"),
        ] {
            rules.push(RuleDef::new(then).front(front).bearing(bearing));
        }
    }

    // Side contact only matters when the front is tight
    rules.push(RuleDef::new("right").front("near").left("very_near"));
    rules.push(RuleDef::new("left").front("near").right("very_near"));
    rules
}

// ============================================================================
// Compiled rule base
// ============================================================================

fn resolve(
    terms: &FxHashMap<&str, usize>,
    variable: &'static str,
    name: &str,
) -> Result<usize, ConfigError> {
    terms
        .get(name)
        .copied()
        .ok_or_else(|| ConfigError::UnknownTerm {
            variable,
            term: name.to_string(),
        })
}

/// Input variables of the fuzzy tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputVar {
    Front,
    Left,
    Right,
    Bearing,
}

impl InputVar {
    /// All inputs in evaluation order
    pub const ALL: [Self; 4] = [Self::Front, Self::Left, Self::Right, Self::Bearing];

    /// Variable name for diagnostics
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Left => "left",
            Self::Right => "right",
            Self::Bearing => "bearing",
        }
    }
}

/// Terms over one universe
#[derive(Debug, Clone)]
pub struct LinguisticVariable {
    universe: Universe,
    terms: Vec<MembershipFunction>,
}

impl LinguisticVariable {
    fn compile(name: &'static str, def: &VariableDef) -> Result<Self, ConfigError> {
        def.universe.validate(name)?;
        if def.terms.is_empty() {
            return Err(ConfigError::InvalidUniverse { variable: name });
        }

        let mut seen = FxHashSet::default();
        let mut terms = Vec::with_capacity(def.terms.len());
        for term in &def.terms {
            if !seen.insert(term.name.as_str()) {
                return Err(ConfigError::DuplicateTerm {
                    variable: name,
                    term: term.name.clone(),
                });
            }
            terms.push(MembershipFunction::new(term.name.clone(), term.shape)?);
        }

        Ok(Self {
            universe: def.universe,
            terms,
        })
    }

    fn lookup(&self) -> FxHashMap<&str, usize> {
        self.terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name(), i))
            .collect()
    }

    /// Universe of discourse
    #[must_use]
    pub fn universe(&self) -> Universe {
        self.universe
    }

    /// Terms in definition order
    #[must_use]
    pub fn terms(&self) -> &[MembershipFunction] {
        &self.terms
    }

    /// Index of a term by name
    #[must_use]
    pub fn term_index(&self, name: &str) -> Option<usize> {
        self.terms.iter().position(|t| t.name() == name)
    }
}

/// Reference to one term of one input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Antecedent {
    pub input: InputVar,
    pub term: usize,
}

/// Compiled rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub antecedents: SmallVec<[Antecedent; 4]>,
    pub consequent: usize,
}

/// Immutable, fully resolved rule base
#[derive(Debug, Clone)]
pub struct RuleBase {
    pub(super) front: LinguisticVariable,
    pub(super) lateral: LinguisticVariable,
    pub(super) bearing: LinguisticVariable,
    pub(super) output: LinguisticVariable,
    pub(super) rules: Vec<Rule>,
    /// Output universe sample points
    pub(super) output_samples: Vec<f32>,
    /// Membership of every output term at every sample point
    pub(super) consequent_curves: Vec<Vec<f32>>,
}

impl RuleBase {
    /// Resolve and validate a rule base definition
    ///
    /// # Errors
    ///
    /// Returns an error for invalid universes or shapes, duplicate or unknown
    /// term names, rules without antecedents, or an empty rule list.
    pub fn compile(config: &FuzzyConfig) -> Result<Self, ConfigError> {
        let front = LinguisticVariable::compile("front", &config.front)?;
        let lateral = LinguisticVariable::compile("lateral", &config.lateral)?;
        let bearing = LinguisticVariable::compile("bearing", &config.bearing)?;
        let output = LinguisticVariable::compile("output", &config.output)?;

        if config.rules.is_empty() {
            return Err(ConfigError::EmptyRuleBase);
        }

        let front_terms = front.lookup();
        let lateral_terms = lateral.lookup();
        let bearing_terms = bearing.lookup();
        let output_terms = output.lookup();

        let mut rules = Vec::with_capacity(config.rules.len());
        for (index, def) in config.rules.iter().enumerate() {
            let mut antecedents = SmallVec::new();
            let inputs = [
                (InputVar::Front, &def.front, &front_terms, "front"),
                (InputVar::Left, &def.left, &lateral_terms, "left"),
                (InputVar::Right, &def.right, &lateral_terms, "right"),
                (InputVar::Bearing, &def.bearing, &bearing_terms, "bearing"),
            ];
            for (input, term, table, variable) in inputs {
                if let Some(term) = term {
                    antecedents.push(Antecedent {
                        input,
                        term: resolve(table, variable, term)?,
                    });
                }
            }
            if antecedents.is_empty() {
                return Err(ConfigError::EmptyRule { index });
            }

            rules.push(Rule {
                antecedents,
                consequent: resolve(&output_terms, "output", &def.then)?,
            });
        }

        let output_samples: Vec<f32> = output.universe.samples().collect();
        let consequent_curves = output
            .terms
            .iter()
            .map(|term| output_samples.iter().map(|&x| term.degree(x)).collect())
            .collect();

        log::debug!(
            "Compiled fuzzy rule base: {} rules over {} output samples",
            rules.len(),
            output_samples.len()
        );

        Ok(Self {
            front,
            lateral,
            bearing,
            output,
            rules,
            output_samples,
            consequent_curves,
        })
    }

    /// Variable definition backing an input
    #[must_use]
    pub fn variable(&self, input: InputVar) -> &LinguisticVariable {
        match input {
            InputVar::Front => &self.front,
            InputVar::Left | InputVar::Right => &self.lateral,
            InputVar::Bearing => &self.bearing,
        }
    }

    /// Output variable
    #[must_use]
    pub fn output(&self) -> &LinguisticVariable {
        &self.output
    }

    /// Compiled rules in evaluation order
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Always false for a compiled rule base
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
