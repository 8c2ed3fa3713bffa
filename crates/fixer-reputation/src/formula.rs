//! Named scoring formulas over rating metrics.
//!
//! Every formula is a pure function of the metrics and a parameters map, so
//! a stored `(formula, metrics)` pair can be replayed later to reproduce a
//! score exactly. Unknown formula names are a hard error rather than a
//! silent default, which keeps historical scores auditable.

use std::collections::HashMap;

use fixer_core::{FixerError, RatingMetrics, ReputationFormula, Result};

/// Registry key of the weighted-sum formula.
pub const WEIGHTED_SUM: &str = "weighted_sum";

/// Registry key of the geometric-mean formula.
pub const GEOMETRIC_MEAN: &str = "geometric_mean";

/// Registry key of the threshold-gate formula.
pub const THRESHOLD_GATE: &str = "threshold_gate";

/// A scoring function: pure in its inputs, no hidden state.
pub type FormulaFn = fn(&RatingMetrics, &HashMap<String, f64>) -> Result<f64>;

/// The four metric contributions every built-in formula scores over.
///
/// `penalty_rate` measures badness, so it enters inverted.
fn contributions(metrics: &RatingMetrics) -> [f64; 4] {
    [
        metrics.completion_rate,
        metrics.punctuality,
        1.0 - metrics.penalty_rate,
        metrics.avg_quality,
    ]
}

/// Weighted sum of the four contributions.
///
/// Weights come from `w_completion`, `w_punctuality`, `w_penalty`, and
/// `w_quality` (missing weights count as 0); the result is multiplied by
/// the optional `scale` parameter (default 1.0).
fn weighted_sum(metrics: &RatingMetrics, params: &HashMap<String, f64>) -> Result<f64> {
    let weights = [
        params.get("w_completion").copied().unwrap_or(0.0),
        params.get("w_punctuality").copied().unwrap_or(0.0),
        params.get("w_penalty").copied().unwrap_or(0.0),
        params.get("w_quality").copied().unwrap_or(0.0),
    ];
    let scale = params.get("scale").copied().unwrap_or(1.0);

    let score: f64 = contributions(metrics)
        .iter()
        .zip(weights.iter())
        .map(|(c, w)| c * w)
        .sum();

    Ok(score * scale)
}

/// Fourth root of the product of the four contributions.
///
/// Each contribution is floored at the `epsilon` parameter (default 1e-3)
/// so one zero metric dents the score instead of erasing it; the result is
/// multiplied by `scale`.
fn geometric_mean(metrics: &RatingMetrics, params: &HashMap<String, f64>) -> Result<f64> {
    let epsilon = params.get("epsilon").copied().unwrap_or(1e-3);
    let scale = params.get("scale").copied().unwrap_or(1.0);

    let product: f64 = contributions(metrics).iter().map(|c| c.max(epsilon)).product();

    Ok(product.powf(0.25) * scale)
}

/// Zero unless every metric clears its floor, then a weighted sum.
///
/// Floors come from `min_completion`, `min_punctuality`, `max_penalty`, and
/// `min_quality`; absent floors do not gate. Once through the gate the
/// score delegates to [`weighted_sum`] over the same parameters.
fn threshold_gate(metrics: &RatingMetrics, params: &HashMap<String, f64>) -> Result<f64> {
    let min_completion = params.get("min_completion").copied().unwrap_or(0.0);
    let min_punctuality = params.get("min_punctuality").copied().unwrap_or(0.0);
    let max_penalty = params.get("max_penalty").copied().unwrap_or(1.0);
    let min_quality = params.get("min_quality").copied().unwrap_or(0.0);

    let gated = metrics.completion_rate < min_completion
        || metrics.punctuality < min_punctuality
        || metrics.penalty_rate > max_penalty
        || metrics.avg_quality < min_quality;

    if gated {
        return Ok(0.0);
    }

    weighted_sum(metrics, params)
}

/// Registry of scoring formulas keyed by name.
///
/// Ships with the three built-ins pre-registered. Registering a name that
/// already exists replaces the entry, so startup registration stays
/// idempotent for embedding services.
pub struct FormulaRegistry {
    formulas: HashMap<String, FormulaFn>,
}

impl FormulaRegistry {
    /// Create a registry with the built-in formulas.
    pub fn new() -> Self {
        let mut registry = Self {
            formulas: HashMap::new(),
        };
        registry.register(WEIGHTED_SUM, weighted_sum);
        registry.register(GEOMETRIC_MEAN, geometric_mean);
        registry.register(THRESHOLD_GATE, threshold_gate);
        registry
    }

    /// Register a formula under a name, replacing any existing entry.
    pub fn register(&mut self, name: impl Into<String>, formula: FormulaFn) {
        self.formulas.insert(name.into(), formula);
    }

    /// Whether a formula name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.formulas.contains_key(name)
    }

    /// Evaluate a formula against metrics.
    pub fn evaluate(&self, formula: &ReputationFormula, metrics: &RatingMetrics) -> Result<f64> {
        let f = self
            .formulas
            .get(&formula.formula_type)
            .ok_or_else(|| FixerError::UnsupportedFormula {
                formula_type: formula.formula_type.clone(),
            })?;
        f(metrics, &formula.parameters)
    }
}

impl Default for FormulaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
