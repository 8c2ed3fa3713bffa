//! Common enums shared across the Fixer engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Eurodollars;

/// The side of an order an actor played. Metrics are kept per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The actor accepted and carried out the order.
    Executor,
    /// The actor created and paid for the order.
    Client,
}

/// Category of work an order asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Produce or repair an item.
    Crafting,
    /// Collect resources or components.
    Gathering,
    /// Back someone up in a fight.
    CombatAssistance,
    /// Move cargo or people across the city.
    Transportation,
    /// Anything else offered as a service.
    Service,
}

/// Difficulty grade of an order, derived from its minimum level requirement
/// unless the client sets it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    /// Grade an order by its minimum level requirement.
    pub fn from_min_level(min_level: u32) -> Self {
        match min_level {
            l if l >= 70 => Difficulty::Expert,
            l if l >= 50 => Difficulty::Hard,
            l if l >= 30 => Difficulty::Medium,
            _ => Difficulty::Easy,
        }
    }

    /// Risk multiplier applied to the offered payment when estimating cost.
    pub fn risk_multiplier(&self) -> Decimal {
        match self {
            Difficulty::Easy => Decimal::new(8, 1),
            Difficulty::Medium => Decimal::ONE,
            Difficulty::Hard => Decimal::new(13, 1),
            Difficulty::Expert => Decimal::new(18, 1),
        }
    }

    /// Flat bonus paid to the executor on completion.
    pub fn completion_bonus(&self) -> Eurodollars {
        match self {
            Difficulty::Easy => Eurodollars::zero(),
            Difficulty::Medium => Eurodollars::new(10),
            Difficulty::Hard => Eurodollars::new(20),
            Difficulty::Expert => Eurodollars::new(30),
        }
    }
}

/// How well an executed order turned out, as judged at completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionQuality {
    Failed,
    Poor,
    Average,
    Good,
    Excellent,
}

impl CompletionQuality {
    /// Normalized rating in [0, 1].
    pub fn normalized(&self) -> f64 {
        match self {
            CompletionQuality::Failed => 0.0,
            CompletionQuality::Poor => 0.25,
            CompletionQuality::Average => 0.5,
            CompletionQuality::Good => 0.75,
            CompletionQuality::Excellent => 1.0,
        }
    }

    /// Bucket a work-efficiency fraction into a quality grade.
    ///
    /// Used for NPC-proxied executions, where no human judgement is recorded.
    pub fn from_efficiency(efficiency: f64) -> Self {
        match efficiency {
            e if e >= 0.875 => CompletionQuality::Excellent,
            e if e >= 0.625 => CompletionQuality::Good,
            e if e >= 0.375 => CompletionQuality::Average,
            e if e >= 0.125 => CompletionQuality::Poor,
            _ => CompletionQuality::Failed,
        }
    }
}
