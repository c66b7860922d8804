//! Decision module
//!
//! Turns range readings and a target bearing into a heading correction:
//! an ordered heuristic chain backed by Mamdani fuzzy inference.

mod controller;
mod heuristics;
mod inference;
mod membership;
mod rules;

pub use controller::{
    ControllerConfig, CorrectionEngine, Decision, DecisionSource, FallbackConfig, InertiaConfig,
    SafetyClampConfig,
};
pub use heuristics::{Guard, HeuristicChain, HeuristicConfig};
pub use inference::{FuzzyInputs, centroid};
pub use membership::{MembershipFunction, Shape, Universe};
pub use rules::{
    Antecedent, FuzzyConfig, InputVar, LinguisticVariable, Rule, RuleBase, RuleDef, TermDef,
    VariableDef,
};
