//! # Fixer Core
//!
//! Core domain types for the Fixer order-brokering engine.
//!
//! This crate provides the fundamental building blocks:
//! - [`Order`] - A unit of brokered work and its publication state machine
//! - [`NpcContract`] / [`NpcProfile`] - Proxy execution records
//! - [`OrderPenalty`] - Immutable failure records
//! - [`RatingMetrics`] / [`ReputationFormula`] - Scoring primitives
//! - [`ResonanceIndex`] - The multi-dimensional trust index
//! - [`FixerError`] - Engine error taxonomy

pub mod contract;
pub mod error;
pub mod event;
pub mod money;
pub mod order;
pub mod penalty;
pub mod reputation;
pub mod resonance;
pub mod types;

// Re-exports for convenience
pub use contract::{NpcContract, NpcProfile, DEFAULT_NPC_EFFICIENCY};
pub use error::{FixerError, Result};
pub use event::OrderEvent;
pub use money::Eurodollars;
pub use order::{Order, OrderDraft, OrderDraftBuilder, OrderStatus};
pub use penalty::{OrderPenalty, PenaltyReason};
pub use reputation::{RatingMetrics, ReputationFormula, ReputationTier, TierLadder};
pub use resonance::{
    ResonanceDimension, ResonanceIndex, ResonanceSubject, ResonanceWeights, WEIGHT_EPSILON,
};
pub use types::{CompletionQuality, Difficulty, OrderKind, Role};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::contract::{NpcContract, NpcProfile};
    pub use crate::error::{FixerError, Result};
    pub use crate::event::OrderEvent;
    pub use crate::money::Eurodollars;
    pub use crate::order::{Order, OrderDraft, OrderStatus};
    pub use crate::penalty::{OrderPenalty, PenaltyReason};
    pub use crate::reputation::{RatingMetrics, ReputationFormula, ReputationTier};
    pub use crate::resonance::{ResonanceDimension, ResonanceIndex, ResonanceSubject};
    pub use crate::types::{CompletionQuality, Difficulty, OrderKind, Role};
}
