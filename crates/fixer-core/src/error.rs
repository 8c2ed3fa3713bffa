//! Error types for the Fixer engine.

use thiserror::Error;
use uuid::Uuid;

use crate::money::Eurodollars;
use crate::order::OrderStatus;

/// Main error type for Fixer operations.
#[derive(Error, Debug, Clone)]
pub enum FixerError {
    /// The requested transition is not legal from the order's current state.
    #[error("order {order_id} cannot {action} while {status:?}")]
    InvalidState {
        order_id: Uuid,
        status: OrderStatus,
        action: String,
    },

    /// An actor tried to accept their own order.
    #[error("actor {actor_id} cannot accept their own order {order_id}")]
    SelfAcceptance { order_id: Uuid, actor_id: Uuid },

    /// The NPC is unknown or not hirable.
    #[error("NPC {npc_id} is not available for hire")]
    NpcUnavailable { npc_id: Uuid },

    /// The NPC already has an active contract.
    #[error("NPC {npc_id} is already bound to contract {contract_id}")]
    NpcAlreadyContracted { npc_id: Uuid, contract_id: Uuid },

    /// Cancellation was requested after acceptance.
    #[error("order {order_id} is {status:?}; too late to cancel")]
    TooLateToCancel { order_id: Uuid, status: OrderStatus },

    /// The wallet declined a charge, credit, or refund.
    #[error("payment of {amount} failed for actor {actor_id}: {message}")]
    PaymentFailed {
        actor_id: Uuid,
        amount: Eurodollars,
        message: String,
    },

    /// No formula is registered under the requested name.
    #[error("unsupported reputation formula: {formula_type}")]
    UnsupportedFormula { formula_type: String },

    /// An accepted order never started executing within the grace period.
    #[error("order {order_id} timed out waiting for execution to start")]
    AcceptanceTimeout { order_id: Uuid },

    /// Draft or game-rule validation failed.
    #[error("order validation failed: {message}")]
    ValidationFailed {
        order_id: Option<Uuid>,
        message: String,
    },

    /// Resonance dimension weights do not form a valid distribution.
    #[error("invalid resonance weights: {message}")]
    InvalidWeights { message: String },

    /// Resource not found.
    #[error("resource not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Transient storage or collaborator failure; callers may retry.
    #[error("transient failure: {message}")]
    TransientFailure { message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl FixerError {
    /// Returns true if the caller may retry the operation with backoff.
    ///
    /// Everything except `TransientFailure` is a definitive rejection.
    pub fn is_transient(&self) -> bool {
        matches!(self, FixerError::TransientFailure { .. })
    }

    /// Returns the order ID if the error concerns a specific order.
    pub fn order_id(&self) -> Option<Uuid> {
        match self {
            FixerError::InvalidState { order_id, .. } => Some(*order_id),
            FixerError::SelfAcceptance { order_id, .. } => Some(*order_id),
            FixerError::TooLateToCancel { order_id, .. } => Some(*order_id),
            FixerError::AcceptanceTimeout { order_id } => Some(*order_id),
            FixerError::ValidationFailed { order_id, .. } => *order_id,
            _ => None,
        }
    }
}

/// Convenience Result type for Fixer operations.
pub type Result<T> = std::result::Result<T, FixerError>;

impl From<serde_json::Error> for FixerError {
    fn from(err: serde_json::Error) -> Self {
        FixerError::SerializationError(err.to_string())
    }
}
