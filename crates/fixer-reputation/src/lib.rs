//! # Fixer Reputation
//!
//! Rating metric recomputation, pluggable scoring formulas, and penalty
//! assessment with windowed decay.

pub mod formula;
pub mod metrics;
pub mod penalty;

pub use formula::{FormulaFn, FormulaRegistry, GEOMETRIC_MEAN, THRESHOLD_GATE, WEIGHTED_SUM};
pub use metrics::{compute_metrics, ReputationConfig, ReputationEngine};
pub use penalty::{penalty_rate, PenaltyAssessor, PenaltyConfig};
