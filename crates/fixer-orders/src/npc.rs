//! NPC contract execution.
//!
//! NPCs are hirable proxy executors. The contract executor enforces the
//! one-active-contract-per-NPC rule, accrues daily costs, and ranks
//! candidates for an order by suitability.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use fixer_core::{FixerError, NpcContract, NpcProfile, Order, ReputationFormula, Result, Role};
use fixer_reputation::{ReputationEngine, WEIGHTED_SUM};
use fixer_store::{ContractStore, NpcStore};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

/// Configuration for NPC suitability scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcExecutorConfig {
    /// Formula scoring an NPC's executor history on a [0, 1] scale.
    pub formula: ReputationFormula,

    /// Share of the suitability score carried by rated history; the rest
    /// falls to the profile's base efficiency. NPCs with no history score
    /// on efficiency alone.
    pub history_weight: f64,

    /// Flat suitability bonus when the NPC's specialty matches the order.
    pub specialty_bonus: f64,
}

impl Default for NpcExecutorConfig {
    fn default() -> Self {
        Self {
            formula: ReputationFormula::new(WEIGHTED_SUM)
                .with_param("w_completion", 0.4)
                .with_param("w_punctuality", 0.3)
                .with_param("w_penalty", 0.2)
                .with_param("w_quality", 0.1),
            history_weight: 0.5,
            specialty_bonus: 0.15,
        }
    }
}

/// Manages NPC availability, hire contracts, and suitability ranking.
pub struct NpcContractExecutor {
    npcs: Arc<dyn NpcStore>,
    contracts: Arc<dyn ContractStore>,
    reputation: Arc<ReputationEngine>,
    config: NpcExecutorConfig,

    /// Per-NPC hire locks; the check-then-create in `hire` must be atomic
    /// per NPC so concurrent hires yield exactly one contract.
    hire_locks: Arc<RwLock<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl NpcContractExecutor {
    /// Create a contract executor over the NPC roster and contract store.
    pub fn new(
        npcs: Arc<dyn NpcStore>,
        contracts: Arc<dyn ContractStore>,
        reputation: Arc<ReputationEngine>,
        config: NpcExecutorConfig,
    ) -> Self {
        Self {
            npcs,
            contracts,
            reputation,
            config,
            hire_locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Look up an NPC profile, failing if the NPC is not rostered.
    pub async fn profile(&self, npc_id: Uuid) -> Result<NpcProfile> {
        self.npcs
            .get(npc_id)
            .await?
            .ok_or(FixerError::NpcUnavailable { npc_id })
    }

    /// Hire an NPC for an order.
    ///
    /// Fails with `NpcAlreadyContracted` if the NPC is bound to an active
    /// contract. Contracts past expiry count as released here, so an NPC
    /// whose last hirer never called `release` is still hirable.
    pub async fn hire(&self, npc_id: Uuid, order_id: Uuid, days: u32) -> Result<NpcContract> {
        if days == 0 {
            return Err(FixerError::ValidationFailed {
                order_id: Some(order_id),
                message: "a contract must run for at least one day".to_string(),
            });
        }

        let lock = self.hire_lock(npc_id).await;
        let _guard = lock.lock().await;
        let now = Utc::now();

        let profile = self.profile(npc_id).await?;
        if let Some(existing) = self.contracts.active_for_npc(npc_id, now).await? {
            return Err(FixerError::NpcAlreadyContracted {
                npc_id,
                contract_id: existing.id,
            });
        }

        let contract = NpcContract::new(npc_id, order_id, days, profile.daily_cost, now);
        self.contracts.insert(contract.clone()).await?;
        info!(
            "hired NPC {} for order {}: {} days at {} ({})",
            npc_id, order_id, days, profile.daily_cost, contract.total_cost
        );
        Ok(contract)
    }

    /// Release a contract, freeing the NPC for rehire. Idempotent.
    pub async fn release(&self, contract_id: Uuid) -> Result<()> {
        self.contracts.release(contract_id, Utc::now()).await?;
        info!("released contract {}", contract_id);
        Ok(())
    }

    /// Release whatever contract is bound to an order, if any.
    pub async fn release_for_order(&self, order_id: Uuid) -> Result<Option<NpcContract>> {
        let now = Utc::now();
        match self.contracts.active_for_order(order_id, now).await? {
            Some(contract) => {
                self.contracts.release(contract.id, now).await?;
                info!(
                    "released contract {} (NPC {}) for order {}",
                    contract.id, contract.npc_id, order_id
                );
                Ok(Some(contract))
            }
            None => Ok(None),
        }
    }

    /// Bump an NPC's lifetime job counters after an outcome.
    pub async fn record_outcome(&self, npc_id: Uuid, completed: bool) -> Result<()> {
        self.npcs.record_job(npc_id, completed).await
    }

    /// Suitability of one NPC for an order.
    pub async fn suitability(&self, npc_id: Uuid, order: &Order) -> Result<f64> {
        let profile = self.profile(npc_id).await?;
        self.suitability_for(&profile, order).await
    }

    /// Available NPCs ranked by descending suitability for an order.
    ///
    /// NPCs bound to an active contract are excluded.
    pub async fn rank_candidates(&self, order: &Order) -> Result<Vec<(NpcProfile, f64)>> {
        let now = Utc::now();
        let mut ranked = Vec::new();

        for profile in self.npcs.list().await? {
            if self
                .contracts
                .active_for_npc(profile.npc_id, now)
                .await?
                .is_some()
            {
                continue;
            }
            let score = self.suitability_for(&profile, order).await?;
            ranked.push((profile, score));
        }

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        Ok(ranked)
    }

    async fn suitability_for(&self, profile: &NpcProfile, order: &Order) -> Result<f64> {
        let base = match self
            .reputation
            .metrics(profile.npc_id, Role::Executor)
            .await?
        {
            Some(metrics) => {
                let history = self.reputation.evaluate(&self.config.formula, &metrics)?;
                self.config.history_weight * history
                    + (1.0 - self.config.history_weight) * profile.efficiency
            }
            None => profile.efficiency,
        };

        let bonus = if profile.specialty == order.kind {
            self.config.specialty_bonus
        } else {
            0.0
        };
        Ok(base + bonus)
    }

    async fn hire_lock(&self, npc_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.hire_locks.write().await;
        locks
            .entry(npc_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixer_core::{Eurodollars, OrderDraft, OrderKind, RatingMetrics};
    use fixer_reputation::ReputationConfig;
    use fixer_store::{
        InMemoryContractStore, InMemoryMetricsStore, InMemoryNpcStore, InMemoryOrderStore,
        InMemoryPenaltyStore, MetricsStore,
    };
    use futures::future::join_all;

    fn executor() -> (NpcContractExecutor, Arc<InMemoryNpcStore>) {
        let npcs = Arc::new(InMemoryNpcStore::new());
        let contracts = Arc::new(InMemoryContractStore::new());
        let reputation = Arc::new(ReputationEngine::new(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryPenaltyStore::new()),
            Arc::new(InMemoryMetricsStore::new()),
            ReputationConfig::default(),
        ));
        let executor = NpcContractExecutor::new(
            npcs.clone(),
            contracts,
            reputation,
            NpcExecutorConfig::default(),
        );
        (executor, npcs)
    }

    fn transport_order() -> Order {
        let draft = OrderDraft::builder()
            .kind(OrderKind::Transportation)
            .title("Run a package to the docks")
            .payment(Eurodollars::new(60))
            .build()
            .unwrap();
        Order::new(Uuid::new_v4(), draft)
    }

    #[tokio::test]
    async fn test_hire_unknown_npc() {
        let (executor, _npcs) = executor();
        let result = executor.hire(Uuid::new_v4(), Uuid::new_v4(), 2).await;
        assert!(matches!(result, Err(FixerError::NpcUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_double_booking_rejected() {
        let (executor, npcs) = executor();
        let npc = NpcProfile::new("Jackie", OrderKind::Transportation, Eurodollars::new(20));
        let npc_id = npc.npc_id;
        npcs.upsert(npc).await.unwrap();

        let first = executor.hire(npc_id, Uuid::new_v4(), 2).await.unwrap();
        assert_eq!(first.total_cost, Eurodollars::new(40));

        let second = executor.hire(npc_id, Uuid::new_v4(), 1).await;
        assert!(matches!(
            second,
            Err(FixerError::NpcAlreadyContracted { .. })
        ));

        // Released, the NPC is hirable again.
        executor.release(first.id).await.unwrap();
        executor.hire(npc_id, Uuid::new_v4(), 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_day_contract_rejected() {
        let (executor, npcs) = executor();
        let npc = NpcProfile::new("Viktor", OrderKind::Service, Eurodollars::new(30));
        let npc_id = npc.npc_id;
        npcs.upsert(npc).await.unwrap();

        let result = executor.hire(npc_id, Uuid::new_v4(), 0).await;
        assert!(matches!(result, Err(FixerError::ValidationFailed { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_hires_yield_one_winner() {
        let (executor, npcs) = executor();
        let npc = NpcProfile::new("Panam", OrderKind::Transportation, Eurodollars::new(25));
        let npc_id = npc.npc_id;
        npcs.upsert(npc).await.unwrap();

        let executor = Arc::new(executor);
        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let executor = executor.clone();
                async move { executor.hire(npc_id, Uuid::new_v4(), 1).await }
            })
            .collect();

        let results = join_all(attempts).await;
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(FixerError::NpcAlreadyContracted { .. }))));
    }

    #[tokio::test]
    async fn test_ranking_prefers_specialty_and_efficiency() {
        let (executor, npcs) = executor();
        let order = transport_order();

        let driver = NpcProfile::new("Claire", OrderKind::Transportation, Eurodollars::new(20))
            .with_efficiency(0.7);
        let crafter = NpcProfile::new("Bug", OrderKind::Crafting, Eurodollars::new(20))
            .with_efficiency(0.7);
        let ace = NpcProfile::new("Delamain", OrderKind::Transportation, Eurodollars::new(50))
            .with_efficiency(0.95);
        npcs.upsert(driver.clone()).await.unwrap();
        npcs.upsert(crafter.clone()).await.unwrap();
        npcs.upsert(ace.clone()).await.unwrap();

        let ranked = executor.rank_candidates(&order).await.unwrap();
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].0.npc_id, ace.npc_id);
        assert_eq!(ranked[1].0.npc_id, driver.npc_id);
        assert_eq!(ranked[2].0.npc_id, crafter.npc_id);

        // The specialty bonus is what separates the two 0.7s.
        assert!((ranked[1].1 - (0.7 + 0.15)).abs() < 1e-9);
        assert!((ranked[2].1 - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_history_blends_into_suitability() {
        let npcs = Arc::new(InMemoryNpcStore::new());
        let metrics = Arc::new(InMemoryMetricsStore::new());
        let reputation = Arc::new(ReputationEngine::new(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryPenaltyStore::new()),
            metrics.clone(),
            ReputationConfig::default(),
        ));
        let executor = NpcContractExecutor::new(
            npcs.clone(),
            Arc::new(InMemoryContractStore::new()),
            reputation,
            NpcExecutorConfig::default(),
        );

        let npc = NpcProfile::new("Judy", OrderKind::Transportation, Eurodollars::new(20))
            .with_efficiency(0.6);
        let npc_id = npc.npc_id;
        npcs.upsert(npc).await.unwrap();
        let order = transport_order();

        // No rated history: base efficiency plus the specialty match.
        let cold = executor.suitability(npc_id, &order).await.unwrap();
        assert!((cold - (0.6 + 0.15)).abs() < 1e-9);

        let mut flawless = RatingMetrics::empty(Utc::now());
        flawless.completion_rate = 1.0;
        flawless.punctuality = 1.0;
        flawless.avg_quality = 1.0;
        metrics.put(npc_id, Role::Executor, flawless).await.unwrap();

        // Half the score now rides on the flawless record.
        let seasoned = executor.suitability(npc_id, &order).await.unwrap();
        assert!((seasoned - (0.5 + 0.5 * 0.6 + 0.15)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_contracted_npcs_excluded_from_ranking() {
        let (executor, npcs) = executor();
        let order = transport_order();

        let npc = NpcProfile::new("Rogue", OrderKind::Transportation, Eurodollars::new(40));
        let npc_id = npc.npc_id;
        npcs.upsert(npc).await.unwrap();

        executor.hire(npc_id, Uuid::new_v4(), 3).await.unwrap();
        let ranked = executor.rank_candidates(&order).await.unwrap();
        assert!(ranked.is_empty());
    }
}
