//! Lifecycle events emitted to the notification bus.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Eurodollars;
use crate::penalty::PenaltyReason;
use crate::types::CompletionQuality;

/// Events that downstream consumers (news highlights, chat broadcasts)
/// receive as orders move through their lifecycle. Delivery is
/// fire-and-forget; the state machine never depends on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    /// Order went live on the market.
    Published {
        order_id: Uuid,
        client_id: Uuid,
        payment: Eurodollars,
    },
    /// An executor claimed the order.
    Accepted { order_id: Uuid, executor_id: Uuid },
    /// Execution began, directly or via NPC proxy.
    ExecutionStarted {
        order_id: Uuid,
        executor_id: Uuid,
        npc_id: Option<Uuid>,
    },
    /// Execution finished successfully.
    Completed {
        order_id: Uuid,
        executor_id: Uuid,
        quality: CompletionQuality,
    },
    /// Execution failed or timed out.
    Failed {
        order_id: Uuid,
        reason: PenaltyReason,
    },
    /// The client withdrew the order before acceptance.
    Cancelled { order_id: Uuid, refunded: bool },
    /// A penalty was assessed against an executor.
    PenaltyApplied {
        order_id: Uuid,
        executor_id: Uuid,
        reason: PenaltyReason,
        severity: u8,
    },
    /// An NPC was hired for an order.
    ContractHired {
        order_id: Uuid,
        contract_id: Uuid,
        npc_id: Uuid,
        total_cost: Eurodollars,
    },
    /// An NPC contract was released.
    ContractReleased {
        order_id: Uuid,
        contract_id: Uuid,
        npc_id: Uuid,
    },
}

impl OrderEvent {
    /// The order this event concerns.
    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::Published { order_id, .. } => *order_id,
            OrderEvent::Accepted { order_id, .. } => *order_id,
            OrderEvent::ExecutionStarted { order_id, .. } => *order_id,
            OrderEvent::Completed { order_id, .. } => *order_id,
            OrderEvent::Failed { order_id, .. } => *order_id,
            OrderEvent::Cancelled { order_id, .. } => *order_id,
            OrderEvent::PenaltyApplied { order_id, .. } => *order_id,
            OrderEvent::ContractHired { order_id, .. } => *order_id,
            OrderEvent::ContractReleased { order_id, .. } => *order_id,
        }
    }

    /// Stable name used for filtering and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderEvent::Published { .. } => "published",
            OrderEvent::Accepted { .. } => "accepted",
            OrderEvent::ExecutionStarted { .. } => "execution_started",
            OrderEvent::Completed { .. } => "completed",
            OrderEvent::Failed { .. } => "failed",
            OrderEvent::Cancelled { .. } => "cancelled",
            OrderEvent::PenaltyApplied { .. } => "penalty_applied",
            OrderEvent::ContractHired { .. } => "contract_hired",
            OrderEvent::ContractReleased { .. } => "contract_released",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let order_id = Uuid::new_v4();
        let event = OrderEvent::Accepted {
            order_id,
            executor_id: Uuid::new_v4(),
        };
        assert_eq!(event.order_id(), order_id);
        assert_eq!(event.kind(), "accepted");
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = OrderEvent::Failed {
            order_id: Uuid::new_v4(),
            reason: PenaltyReason::ExecutionTimeout,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "failed");
        assert_eq!(json["reason"], "execution_timeout");
    }
}
