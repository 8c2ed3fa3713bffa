//! Penalty records for failed or abandoned executions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why an execution went bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyReason {
    /// Accepted but never started executing within the grace period.
    AcceptanceTimeout,
    /// Execution ran past its limits.
    ExecutionTimeout,
    /// The executor walked away mid-execution.
    Abandonment,
    /// The client forced cancellation after acceptance.
    LateCancellation,
    /// A hired NPC's contract lapsed before the work finished.
    ContractLapse,
}

impl PenaltyReason {
    /// Base severity ordinal before history escalation.
    pub fn base_severity(&self) -> u8 {
        match self {
            PenaltyReason::AcceptanceTimeout => 1,
            PenaltyReason::ExecutionTimeout => 2,
            PenaltyReason::ContractLapse => 2,
            PenaltyReason::LateCancellation => 2,
            PenaltyReason::Abandonment => 3,
        }
    }
}

/// A penalty attached to an order/executor pair.
///
/// Created once per failure event and immutable thereafter; never deleted,
/// only superseded by later penalties for the same actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPenalty {
    /// Unique penalty identifier.
    pub id: Uuid,

    /// The order whose execution failed.
    pub order_id: Uuid,

    /// The actor held responsible.
    pub executor_id: Uuid,

    /// Failure taxonomy entry.
    pub reason: PenaltyReason,

    /// Severity ordinal after history escalation.
    pub severity: u8,

    /// When the penalty was assessed.
    pub applied_at: DateTime<Utc>,
}

impl OrderPenalty {
    pub fn new(
        order_id: Uuid,
        executor_id: Uuid,
        reason: PenaltyReason,
        severity: u8,
        applied_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            executor_id,
            reason,
            severity,
            applied_at,
        }
    }

    /// Age of the penalty in fractional days at `as_of`.
    pub fn age_days(&self, as_of: DateTime<Utc>) -> f64 {
        (as_of - self.applied_at).num_seconds().max(0) as f64 / 86_400.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_severity_ordering() {
        assert!(PenaltyReason::Abandonment.base_severity() > PenaltyReason::ExecutionTimeout.base_severity());
        assert!(PenaltyReason::ExecutionTimeout.base_severity() > PenaltyReason::AcceptanceTimeout.base_severity());

        // The mid-tier offences share one severity.
        assert_eq!(PenaltyReason::ContractLapse.base_severity(), 2);
        assert_eq!(PenaltyReason::LateCancellation.base_severity(), 2);
        assert_eq!(PenaltyReason::ExecutionTimeout.base_severity(), 2);
    }

    #[test]
    fn test_age_days() {
        let applied = Utc::now();
        let penalty = OrderPenalty::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            PenaltyReason::Abandonment,
            3,
            applied,
        );
        let age = penalty.age_days(applied + Duration::hours(36));
        assert!((age - 1.5).abs() < 1e-9);

        // Clock skew never yields a negative age.
        assert_eq!(penalty.age_days(applied - Duration::hours(1)), 0.0);
    }
}
