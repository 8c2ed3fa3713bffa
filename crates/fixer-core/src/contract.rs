//! NPC profiles and hire contracts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Eurodollars;
use crate::types::OrderKind;

/// Default work efficiency for a freshly rostered NPC.
pub const DEFAULT_NPC_EFFICIENCY: f64 = 0.85;

/// A time-boxed binding of a hired NPC to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcContract {
    /// Unique contract identifier.
    pub id: Uuid,

    /// The hired NPC.
    pub npc_id: Uuid,

    /// The order the NPC executes by proxy.
    pub order_id: Uuid,

    /// Contract length in days.
    pub days: u32,

    /// Cost per day of work.
    pub daily_cost: Eurodollars,

    /// Total contract cost (`daily_cost * days`), charged up front.
    pub total_cost: Eurodollars,

    /// When the contract started.
    pub started_at: DateTime<Utc>,

    /// When the contract lapses regardless of release.
    pub expires_at: DateTime<Utc>,

    /// When the contract was explicitly released, if it was.
    pub released_at: Option<DateTime<Utc>>,
}

impl NpcContract {
    /// Create a contract starting at `started_at` and running for `days`.
    pub fn new(
        npc_id: Uuid,
        order_id: Uuid,
        days: u32,
        daily_cost: Eurodollars,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            npc_id,
            order_id,
            days,
            daily_cost,
            total_cost: daily_cost.times(days),
            started_at,
            expires_at: started_at + Duration::days(i64::from(days)),
            released_at: None,
        }
    }

    /// Whether the contract still binds the NPC at `now`.
    ///
    /// A contract past `expires_at` counts as released even if `release`
    /// was never called; expiry is checked lazily on every hire attempt.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.released_at.is_none() && now < self.expires_at
    }

    /// Whether the contract was explicitly released.
    pub fn is_released(&self) -> bool {
        self.released_at.is_some()
    }
}

/// A hirable proxy executor on the NPC roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcProfile {
    /// Unique NPC identifier.
    pub npc_id: Uuid,

    /// Street name.
    pub name: String,

    /// The kind of work this NPC is best at.
    pub specialty: OrderKind,

    /// Hire cost per day.
    pub daily_cost: Eurodollars,

    /// Fraction of nominal work quality the NPC delivers, in [0, 1].
    ///
    /// Seeds suitability scoring and the recorded completion quality for
    /// proxied orders.
    pub efficiency: f64,

    /// Lifetime counters, updated by the contract executor.
    pub jobs_completed: u32,
    pub jobs_failed: u32,
}

impl NpcProfile {
    /// Roster a new NPC with the default efficiency.
    pub fn new(name: impl Into<String>, specialty: OrderKind, daily_cost: Eurodollars) -> Self {
        Self {
            npc_id: Uuid::new_v4(),
            name: name.into(),
            specialty,
            daily_cost,
            efficiency: DEFAULT_NPC_EFFICIENCY,
            jobs_completed: 0,
            jobs_failed: 0,
        }
    }

    /// Override the efficiency, clamped to [0, 1].
    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_cost_and_expiry() {
        let start = Utc::now();
        let contract = NpcContract::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            2,
            Eurodollars::new(20),
            start,
        );

        assert_eq!(contract.total_cost, Eurodollars::new(40));
        assert_eq!(contract.expires_at, start + Duration::days(2));
        assert!(contract.is_active(start));
        assert!(contract.is_active(start + Duration::hours(47)));
        assert!(!contract.is_active(start + Duration::days(2)));
    }

    #[test]
    fn test_release_ends_contract() {
        let start = Utc::now();
        let mut contract = NpcContract::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            5,
            Eurodollars::new(10),
            start,
        );
        contract.released_at = Some(start + Duration::hours(1));
        assert!(!contract.is_active(start + Duration::hours(2)));
        assert!(contract.is_released());
    }

    #[test]
    fn test_profile_defaults() {
        let npc = NpcProfile::new("Dex", OrderKind::Transportation, Eurodollars::new(20));
        assert_eq!(npc.efficiency, DEFAULT_NPC_EFFICIENCY);
        assert_eq!(npc.jobs_completed, 0);

        let sharp = npc.with_efficiency(1.4);
        assert_eq!(sharp.efficiency, 1.0);
    }
}
