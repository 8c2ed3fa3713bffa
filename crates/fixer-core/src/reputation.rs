//! Rating metrics, reputation formulas, and standing tiers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized behavioral metrics for one actor in one role.
///
/// Every rate is clamped to [0, 1]. Metrics are recomputed from the full
/// order and penalty history on each completed, failed, or penalized order;
/// they are never mutated out-of-band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingMetrics {
    /// completed / (completed + failed); 0.0 on empty history.
    pub completion_rate: f64,

    /// Fraction of deadline-bearing completed orders finished on time;
    /// 1.0 when no completed order carried a deadline.
    pub punctuality: f64,

    /// Decayed severity mass of penalties inside the assessment window,
    /// saturated against the configured cap.
    pub penalty_rate: f64,

    /// Mean normalized completion quality; 0.0 on empty history.
    pub avg_quality: f64,

    /// Raw counters behind the rates.
    pub orders_completed: u32,
    pub orders_failed: u32,

    /// When these metrics were computed.
    pub computed_at: DateTime<Utc>,
}

impl RatingMetrics {
    /// Metrics for an actor with no history.
    pub fn empty(as_of: DateTime<Utc>) -> Self {
        Self {
            completion_rate: 0.0,
            punctuality: 1.0,
            penalty_rate: 0.0,
            avg_quality: 0.0,
            orders_completed: 0,
            orders_failed: 0,
            computed_at: as_of,
        }
    }

    /// Clamp every rate into [0, 1].
    pub fn clamped(mut self) -> Self {
        self.completion_rate = self.completion_rate.clamp(0.0, 1.0);
        self.punctuality = self.punctuality.clamp(0.0, 1.0);
        self.penalty_rate = self.penalty_rate.clamp(0.0, 1.0);
        self.avg_quality = self.avg_quality.clamp(0.0, 1.0);
        self
    }
}

/// A named scoring function over a parameters map.
///
/// Evaluation is pure and deterministic given the same metrics and
/// parameters, which keeps scoring replayable for dispute audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationFormula {
    /// Registry key of the scoring function.
    pub formula_type: String,

    /// Free-form numeric parameters consumed by the function.
    #[serde(default)]
    pub parameters: HashMap<String, f64>,
}

impl ReputationFormula {
    /// Create a formula referencing the named registry entry.
    pub fn new(formula_type: impl Into<String>) -> Self {
        Self {
            formula_type: formula_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// Set a parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Look up a parameter.
    pub fn param(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }
}

/// Standing band an actor's scalar score falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationTier {
    Novice,
    Competent,
    Expert,
    Master,
    Legendary,
}

/// Ascending score thresholds separating the tiers.
///
/// Defaults follow the game's historical ladder; embedders running formulas
/// on a different score scale supply their own thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierLadder {
    pub competent: f64,
    pub expert: f64,
    pub master: f64,
    pub legendary: f64,
}

impl Default for TierLadder {
    fn default() -> Self {
        Self {
            competent: 60.0,
            expert: 100.0,
            master: 150.0,
            legendary: 200.0,
        }
    }
}

impl TierLadder {
    /// Map a scalar score onto its tier.
    pub fn tier_for(&self, score: f64) -> ReputationTier {
        match score {
            s if s >= self.legendary => ReputationTier::Legendary,
            s if s >= self.master => ReputationTier::Master,
            s if s >= self.expert => ReputationTier::Expert,
            s if s >= self.competent => ReputationTier::Competent,
            _ => ReputationTier::Novice,
        }
    }

    /// The score at which the ladder tops out.
    pub fn top(&self) -> f64 {
        self.legendary
    }
}
