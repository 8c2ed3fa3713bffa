//! Resonance: the multi-dimensional trust index.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FixerError, Result};

/// Tolerance when checking that dimension weights sum to one.
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// One axis of the trust index. A fixed, closed enumeration: adding a
/// dimension means re-normalizing every weight set, never an implicit edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResonanceDimension {
    /// Executor reputation score, normalized.
    Reputation,
    /// Romance event history.
    Romance,
    /// Social event attendance.
    SocialEvents,
    /// Alliance standing changes.
    Alliance,
    /// Crisis-response history.
    CrisisBuffer,
}

impl ResonanceDimension {
    /// All dimensions, in weight order.
    pub fn all() -> [ResonanceDimension; 5] {
        [
            ResonanceDimension::Reputation,
            ResonanceDimension::Romance,
            ResonanceDimension::SocialEvents,
            ResonanceDimension::Alliance,
            ResonanceDimension::CrisisBuffer,
        ]
    }
}

/// The entity a resonance index is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResonanceSubject {
    Actor { id: Uuid },
    Guild { id: Uuid },
}

impl ResonanceSubject {
    pub fn actor(id: Uuid) -> Self {
        ResonanceSubject::Actor { id }
    }

    pub fn guild(id: Uuid) -> Self {
        ResonanceSubject::Guild { id }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ResonanceSubject::Actor { id } => *id,
            ResonanceSubject::Guild { id } => *id,
        }
    }
}

impl fmt::Display for ResonanceSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResonanceSubject::Actor { id } => write!(f, "actor {}", id),
            ResonanceSubject::Guild { id } => write!(f, "guild {}", id),
        }
    }
}

/// Configured weight of each dimension in the composite index.
///
/// Weights are an external configuration input. A set that does not sum to
/// 1.0 (within [`WEIGHT_EPSILON`]) is rejected at construction, never
/// silently renormalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResonanceWeights {
    pub reputation: f64,
    pub romance: f64,
    pub social_events: f64,
    pub alliance: f64,
    pub crisis_buffer: f64,
}

impl Default for ResonanceWeights {
    /// Uniform weighting across all five dimensions.
    fn default() -> Self {
        Self {
            reputation: 0.2,
            romance: 0.2,
            social_events: 0.2,
            alliance: 0.2,
            crisis_buffer: 0.2,
        }
    }
}

impl ResonanceWeights {
    /// Build a validated weight set.
    pub fn new(
        reputation: f64,
        romance: f64,
        social_events: f64,
        alliance: f64,
        crisis_buffer: f64,
    ) -> Result<Self> {
        let weights = Self {
            reputation,
            romance,
            social_events,
            alliance,
            crisis_buffer,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Check that every weight is non-negative and the sum is 1.0.
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.reputation,
            self.romance,
            self.social_events,
            self.alliance,
            self.crisis_buffer,
        ];

        if values.iter().any(|w| *w < 0.0) {
            return Err(FixerError::InvalidWeights {
                message: "dimension weights must be non-negative".to_string(),
            });
        }

        let sum: f64 = values.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(FixerError::InvalidWeights {
                message: format!("dimension weights must sum to 1.0, got {}", sum),
            });
        }

        Ok(())
    }

    /// Weight of a single dimension.
    pub fn weight(&self, dimension: ResonanceDimension) -> f64 {
        match dimension {
            ResonanceDimension::Reputation => self.reputation,
            ResonanceDimension::Romance => self.romance,
            ResonanceDimension::SocialEvents => self.social_events,
            ResonanceDimension::Alliance => self.alliance,
            ResonanceDimension::CrisisBuffer => self.crisis_buffer,
        }
    }
}

/// The computed trust index for one subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResonanceIndex {
    /// Who this index describes.
    pub subject: ResonanceSubject,

    /// Normalized [0, 1] score per dimension.
    pub scores: HashMap<ResonanceDimension, f64>,

    /// Weighted sum across dimensions.
    pub composite: f64,

    /// When the index was aggregated.
    pub computed_at: DateTime<Utc>,
}

impl ResonanceIndex {
    /// Score for one dimension; 0.0 when absent.
    pub fn score(&self, dimension: ResonanceDimension) -> f64 {
        self.scores.get(&dimension).copied().unwrap_or(0.0)
    }
}
