//! The order lifecycle state machine.
//!
//! `OrderLifecycle` owns every order and contract mutation: it consults the
//! status transition graph before each write, holds a per-order lock across
//! each read-modify-write, and emits a lifecycle event after the store write
//! commits. Rejected transitions leave the order untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use fixer_core::{
    CompletionQuality, Eurodollars, FixerError, Order, OrderDraft, OrderEvent, OrderStatus,
    PenaltyReason, Result, Role,
};
use fixer_reputation::{PenaltyAssessor, ReputationEngine};
use fixer_store::{OrderEventBus, OrderStore};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::estimate::CostEstimator;
use crate::npc::NpcContractExecutor;
use crate::wallet::Wallet;

/// Configuration for lifecycle rules and completion bonuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Minimum title length accepted at validation.
    pub min_title_len: usize,

    /// Floor of the payment-proportional completion bonus.
    pub bonus_floor: Eurodollars,

    /// Divisor turning the payment into its bonus share.
    pub bonus_payment_divisor: u32,

    /// Extra completion bonus on premium listings.
    pub premium_bonus: Eurodollars,

    /// Hours of lead on the deadline required for the early bonus.
    pub early_completion_lead_hours: i64,

    /// Bonus for completing well ahead of the deadline.
    pub early_completion_bonus: Eurodollars,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            min_title_len: 5,
            bonus_floor: Eurodollars::new(10),
            bonus_payment_divisor: 50,
            premium_bonus: Eurodollars::new(10),
            early_completion_lead_hours: 24,
            early_completion_bonus: Eurodollars::new(15),
        }
    }
}

/// Orchestrates order state transitions and their side effects.
pub struct OrderLifecycle {
    orders: Arc<dyn OrderStore>,
    wallet: Arc<dyn Wallet>,
    estimator: CostEstimator,
    npc_executor: Arc<NpcContractExecutor>,
    reputation: Arc<ReputationEngine>,
    assessor: Arc<PenaltyAssessor>,
    events: Arc<OrderEventBus>,
    config: LifecycleConfig,

    /// Per-order locks serializing each order's read-modify-write cycles.
    order_locks: Arc<RwLock<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl OrderLifecycle {
    /// Create a lifecycle manager over its collaborators.
    pub fn new(
        orders: Arc<dyn OrderStore>,
        wallet: Arc<dyn Wallet>,
        npc_executor: Arc<NpcContractExecutor>,
        reputation: Arc<ReputationEngine>,
        assessor: Arc<PenaltyAssessor>,
        events: Arc<OrderEventBus>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            orders,
            wallet,
            estimator: CostEstimator::new(),
            npc_executor,
            reputation,
            assessor,
            events,
            config,
            order_locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Replace the default cost estimator.
    pub fn with_estimator(mut self, estimator: CostEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Create a draft order for a client.
    pub async fn create(&self, client_id: Uuid, draft: OrderDraft) -> Result<Order> {
        let order = Order::new(client_id, draft);
        self.orders.insert(order.clone()).await?;
        info!("order {} created by client {}", order.id, client_id);
        Ok(order)
    }

    /// Fetch an order.
    pub async fn order(&self, order_id: Uuid) -> Result<Order> {
        self.load(order_id).await
    }

    /// Submit a draft for estimation.
    pub async fn submit(&self, order_id: Uuid) -> Result<Order> {
        let lock = self.order_lock(order_id).await;
        let _guard = lock.lock().await;

        let order = self.load(order_id).await?;
        Self::ensure_transition(&order, OrderStatus::PendingEstimate, "submit")?;

        let mut updated = order.clone();
        updated.status = OrderStatus::PendingEstimate;
        let stored = self.orders.update(updated, order.version).await?;
        info!("order {} submitted for estimation", order_id);
        Ok(stored)
    }

    /// Compute the cost estimate and queue the order for validation.
    pub async fn estimate(&self, order_id: Uuid) -> Result<Order> {
        let lock = self.order_lock(order_id).await;
        let _guard = lock.lock().await;

        let order = self.load(order_id).await?;
        Self::ensure_transition(&order, OrderStatus::PendingValidation, "estimate")?;

        let estimate = self.estimator.estimate(&order);
        let mut updated = order.clone();
        updated.cost_estimate = Some(estimate);
        updated.status = OrderStatus::PendingValidation;
        let stored = self.orders.update(updated, order.version).await?;
        info!("order {} estimated at {}", order_id, estimate);
        Ok(stored)
    }

    /// Run game-rule validation.
    ///
    /// A passing order becomes publishable; a failing one is cancelled
    /// (terminal) and the violation is returned to the caller.
    pub async fn validate(&self, order_id: Uuid) -> Result<Order> {
        let lock = self.order_lock(order_id).await;
        let _guard = lock.lock().await;

        let order = self.load(order_id).await?;
        Self::ensure_transition(&order, OrderStatus::ReadyToPublish, "validate")?;

        if let Err(violation) = self.check_rules(&order) {
            let mut updated = order.clone();
            updated.status = OrderStatus::Cancelled;
            self.orders.update(updated, order.version).await?;
            warn!("order {} cancelled at validation: {}", order_id, violation);
            self.events
                .publish(OrderEvent::Cancelled {
                    order_id,
                    refunded: false,
                })
                .await;
            return Err(violation);
        }

        let mut updated = order.clone();
        updated.status = OrderStatus::ReadyToPublish;
        let stored = self.orders.update(updated, order.version).await?;
        info!("order {} validated", order_id);
        Ok(stored)
    }

    /// Publish a validated order, escrowing the estimate from the client.
    ///
    /// A wallet failure surfaces as `PaymentFailed` and leaves the order
    /// publishable.
    pub async fn publish(&self, order_id: Uuid) -> Result<Order> {
        let lock = self.order_lock(order_id).await;
        let _guard = lock.lock().await;

        let order = self.load(order_id).await?;
        Self::ensure_transition(&order, OrderStatus::Published, "publish")?;
        let estimate = order.cost_estimate.ok_or_else(|| {
            FixerError::Internal(format!("order {} reached publish without an estimate", order_id))
        })?;

        self.wallet
            .charge(order.client_id, estimate, "order escrow")
            .await?;

        let mut updated = order.clone();
        updated.status = OrderStatus::Published;
        updated.published_at = Some(Utc::now());
        let stored = match self.orders.update(updated, order.version).await {
            Ok(stored) => stored,
            Err(err) => {
                // Undo the escrow if the write lost; nothing else happened.
                self.wallet
                    .refund(order.client_id, estimate, "order escrow reversal")
                    .await?;
                return Err(err);
            }
        };

        info!("order {} published with {} escrowed", order_id, estimate);
        self.events
            .publish(OrderEvent::Published {
                order_id,
                client_id: stored.client_id,
                payment: stored.payment,
            })
            .await;
        Ok(stored)
    }

    /// Accept a published order.
    ///
    /// Exactly one acceptance can succeed per order: the winner moves it to
    /// `Accepted`, everyone else finds the order no longer `Published`.
    pub async fn accept(&self, order_id: Uuid, executor_id: Uuid) -> Result<Order> {
        let lock = self.order_lock(order_id).await;
        let _guard = lock.lock().await;

        let order = self.load(order_id).await?;
        Self::ensure_transition(&order, OrderStatus::Accepted, "accept")?;
        if executor_id == order.client_id {
            return Err(FixerError::SelfAcceptance {
                order_id,
                actor_id: executor_id,
            });
        }

        let mut updated = order.clone();
        updated.executor_id = Some(executor_id);
        updated.accepted_at = Some(Utc::now());
        updated.status = OrderStatus::Accepted;
        let stored = self.orders.update(updated, order.version).await?;

        info!("order {} accepted by {}", order_id, executor_id);
        self.events
            .publish(OrderEvent::Accepted {
                order_id,
                executor_id,
            })
            .await;
        Ok(stored)
    }

    /// Start direct (non-proxy) execution.
    pub async fn start_execution(&self, order_id: Uuid, executor_id: Uuid) -> Result<Order> {
        let lock = self.order_lock(order_id).await;
        let _guard = lock.lock().await;

        let order = self.load(order_id).await?;
        Self::ensure_not_timed_out(&order)?;
        Self::ensure_transition(&order, OrderStatus::Executing, "start execution")?;
        Self::ensure_executor(&order, executor_id, "start execution")?;

        let mut updated = order.clone();
        updated.status = OrderStatus::Executing;
        let stored = self.orders.update(updated, order.version).await?;

        info!("order {} execution started by {}", order_id, executor_id);
        self.events
            .publish(OrderEvent::ExecutionStarted {
                order_id,
                executor_id,
                npc_id: None,
            })
            .await;
        Ok(stored)
    }

    /// Hire an NPC to execute an accepted order by proxy.
    ///
    /// The contract cost is charged to the hiring executor's wallet; a
    /// declined charge rolls the hire back.
    pub async fn execute_via_npc(
        &self,
        order_id: Uuid,
        executor_id: Uuid,
        npc_id: Uuid,
        days: u32,
    ) -> Result<Order> {
        let lock = self.order_lock(order_id).await;
        let _guard = lock.lock().await;

        let order = self.load(order_id).await?;
        Self::ensure_not_timed_out(&order)?;
        Self::ensure_transition(&order, OrderStatus::Executing, "execute via NPC")?;
        Self::ensure_executor(&order, executor_id, "execute via NPC")?;

        let contract = self.npc_executor.hire(npc_id, order_id, days).await?;
        if let Err(err) = self
            .wallet
            .charge(executor_id, contract.total_cost, "npc contract")
            .await
        {
            self.npc_executor.release(contract.id).await?;
            return Err(err);
        }

        let mut updated = order.clone();
        updated.hired_npc_id = Some(npc_id);
        updated.status = OrderStatus::Executing;
        let stored = match self.orders.update(updated, order.version).await {
            Ok(stored) => stored,
            Err(err) => {
                self.npc_executor.release(contract.id).await?;
                self.wallet
                    .refund(executor_id, contract.total_cost, "npc contract reversal")
                    .await?;
                return Err(err);
            }
        };

        info!(
            "order {} executing via NPC {} under contract {}",
            order_id, npc_id, contract.id
        );
        self.events
            .publish(OrderEvent::ContractHired {
                order_id,
                contract_id: contract.id,
                npc_id,
                total_cost: contract.total_cost,
            })
            .await;
        self.events
            .publish(OrderEvent::ExecutionStarted {
                order_id,
                executor_id,
                npc_id: Some(npc_id),
            })
            .await;
        Ok(stored)
    }

    /// Complete an executing order.
    ///
    /// Records quality (derived from the NPC's efficiency for proxied
    /// orders when the caller passes none), releases any NPC contract,
    /// credits the executor with the payment plus the completion bonus,
    /// and recomputes metrics for everyone involved.
    pub async fn complete(
        &self,
        order_id: Uuid,
        quality: Option<CompletionQuality>,
    ) -> Result<Order> {
        let lock = self.order_lock(order_id).await;
        let _guard = lock.lock().await;

        let order = self.load(order_id).await?;
        Self::ensure_transition(&order, OrderStatus::Completed, "complete")?;
        let executor_id = order.executor_id.ok_or_else(|| {
            FixerError::Internal(format!("order {} is executing without an executor", order_id))
        })?;

        let quality = match quality {
            Some(quality) => quality,
            None => match order.hired_npc_id {
                Some(npc_id) => {
                    let profile = self.npc_executor.profile(npc_id).await?;
                    CompletionQuality::from_efficiency(profile.efficiency)
                }
                None => CompletionQuality::Average,
            },
        };
        let now = Utc::now();

        let mut updated = order.clone();
        updated.status = OrderStatus::Completed;
        updated.completed_at = Some(now);
        updated.quality = Some(quality);
        let stored = self.orders.update(updated, order.version).await?;

        let contract = self.npc_executor.release_for_order(order_id).await?;
        let payout = stored.payment + self.completion_bonus(&stored);
        self.wallet
            .credit(executor_id, payout, "order payout")
            .await?;
        if let Some(npc_id) = stored.hired_npc_id {
            self.npc_executor.record_outcome(npc_id, true).await?;
        }

        info!(
            "order {} completed with {:?} quality, {} paid out",
            order_id, quality, payout
        );
        self.events
            .publish(OrderEvent::Completed {
                order_id,
                executor_id,
                quality,
            })
            .await;
        if let Some(contract) = &contract {
            self.events
                .publish(OrderEvent::ContractReleased {
                    order_id,
                    contract_id: contract.id,
                    npc_id: contract.npc_id,
                })
                .await;
        }

        self.reputation
            .recompute_metrics(executor_id, Role::Executor, now)
            .await?;
        self.reputation
            .recompute_metrics(stored.client_id, Role::Client, now)
            .await?;
        if let Some(npc_id) = stored.hired_npc_id {
            self.reputation
                .recompute_metrics(npc_id, Role::Executor, now)
                .await?;
        }
        Ok(stored)
    }

    /// Fail an accepted or executing order.
    ///
    /// Releases any NPC contract, refunds the client's escrow, and routes
    /// the failure through the penalty assessor.
    pub async fn fail(&self, order_id: Uuid, reason: PenaltyReason) -> Result<Order> {
        let lock = self.order_lock(order_id).await;
        let _guard = lock.lock().await;

        let order = self.load(order_id).await?;
        Self::ensure_transition(&order, OrderStatus::Failed, "fail")?;
        let now = Utc::now();

        let mut updated = order.clone();
        updated.status = OrderStatus::Failed;
        updated.failure_reason = Some(reason);
        let stored = self.orders.update(updated, order.version).await?;

        let contract = self.npc_executor.release_for_order(order_id).await?;
        if let Some(estimate) = stored.cost_estimate {
            self.wallet
                .refund(stored.client_id, estimate, "order escrow refund")
                .await?;
        }
        if let Some(npc_id) = stored.hired_npc_id {
            self.npc_executor.record_outcome(npc_id, false).await?;
        }

        warn!("order {} failed: {:?}", order_id, reason);
        self.events
            .publish(OrderEvent::Failed { order_id, reason })
            .await;
        if let Some(contract) = &contract {
            self.events
                .publish(OrderEvent::ContractReleased {
                    order_id,
                    contract_id: contract.id,
                    npc_id: contract.npc_id,
                })
                .await;
        }

        // Assessing the penalty also recomputes the executor's metrics.
        let penalty = self.assessor.assess(&stored, reason).await?;
        self.events
            .publish(OrderEvent::PenaltyApplied {
                order_id,
                executor_id: penalty.executor_id,
                reason,
                severity: penalty.severity,
            })
            .await;

        self.reputation
            .recompute_metrics(stored.client_id, Role::Client, now)
            .await?;
        if let Some(npc_id) = stored.hired_npc_id {
            self.reputation
                .recompute_metrics(npc_id, Role::Executor, now)
                .await?;
        }
        Ok(stored)
    }

    /// Cancel an order. Clients only, and only before acceptance.
    ///
    /// Refunds the escrowed estimate when the order was already published.
    pub async fn cancel(&self, order_id: Uuid, caller: Uuid) -> Result<Order> {
        let lock = self.order_lock(order_id).await;
        let _guard = lock.lock().await;

        let order = self.load(order_id).await?;
        if !order.is_client(caller) {
            return Err(FixerError::ValidationFailed {
                order_id: Some(order_id),
                message: "only the client may cancel an order".to_string(),
            });
        }
        if order.status.is_terminal() {
            return Err(FixerError::InvalidState {
                order_id,
                status: order.status,
                action: "cancel".to_string(),
            });
        }
        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(FixerError::TooLateToCancel {
                order_id,
                status: order.status,
            });
        }

        let escrow = match (order.status, order.cost_estimate) {
            (OrderStatus::Published, Some(estimate)) => Some(estimate),
            _ => None,
        };

        let mut updated = order.clone();
        updated.status = OrderStatus::Cancelled;
        let stored = self.orders.update(updated, order.version).await?;

        if let Some(estimate) = escrow {
            self.wallet
                .refund(stored.client_id, estimate, "order escrow refund")
                .await?;
        }

        info!(
            "order {} cancelled by client{}",
            order_id,
            if escrow.is_some() { ", escrow refunded" } else { "" }
        );
        self.events
            .publish(OrderEvent::Cancelled {
                order_id,
                refunded: escrow.is_some(),
            })
            .await;
        Ok(stored)
    }

    /// Completion bonus credited on top of the payment.
    fn completion_bonus(&self, order: &Order) -> Eurodollars {
        let share = order.payment.divided_by(self.config.bonus_payment_divisor);
        let mut bonus = share.max(self.config.bonus_floor);

        if order.premium {
            bonus = bonus + self.config.premium_bonus;
        }
        bonus = bonus + order.difficulty.completion_bonus();

        if let (Some(done), Some(due)) = (order.completed_at, order.deadline) {
            if due - done >= Duration::hours(self.config.early_completion_lead_hours) {
                bonus = bonus + self.config.early_completion_bonus;
            }
        }
        bonus
    }

    fn check_rules(&self, order: &Order) -> Result<()> {
        if order.title.chars().count() < self.config.min_title_len {
            return Err(FixerError::ValidationFailed {
                order_id: Some(order.id),
                message: format!(
                    "title must be at least {} characters",
                    self.config.min_title_len
                ),
            });
        }
        if !order.payment.is_positive() {
            return Err(FixerError::ValidationFailed {
                order_id: Some(order.id),
                message: "payment must be positive".to_string(),
            });
        }
        if let Some(deadline) = order.deadline {
            if deadline <= Utc::now() {
                return Err(FixerError::ValidationFailed {
                    order_id: Some(order.id),
                    message: "deadline is already past".to_string(),
                });
            }
        }
        Ok(())
    }

    async fn load(&self, order_id: Uuid) -> Result<Order> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| FixerError::NotFound {
                resource: "order".to_string(),
                id: order_id.to_string(),
            })
    }

    fn ensure_transition(order: &Order, next: OrderStatus, action: &str) -> Result<()> {
        if !order.status.can_transition_to(next) {
            return Err(FixerError::InvalidState {
                order_id: order.id,
                status: order.status,
                action: action.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_executor(order: &Order, executor_id: Uuid, action: &str) -> Result<()> {
        if order.executor_id != Some(executor_id) {
            return Err(FixerError::InvalidState {
                order_id: order.id,
                status: order.status,
                action: format!("{} as a non-accepted actor", action),
            });
        }
        Ok(())
    }

    /// A lapsed executor gets the specific timeout error instead of a
    /// generic state complaint.
    fn ensure_not_timed_out(order: &Order) -> Result<()> {
        if order.status == OrderStatus::Failed
            && order.failure_reason == Some(PenaltyReason::AcceptanceTimeout)
        {
            return Err(FixerError::AcceptanceTimeout { order_id: order.id });
        }
        Ok(())
    }

    async fn order_lock(&self, order_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.order_locks.write().await;
        locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::EstimatorConfig;
    use crate::npc::NpcExecutorConfig;
    use crate::wallet::InMemoryWallet;
    use fixer_core::{NpcProfile, OrderKind};
    use fixer_reputation::{PenaltyConfig, ReputationConfig};
    use fixer_store::{
        ContractStore, EventFilter, InMemoryContractStore, InMemoryMetricsStore,
        InMemoryNpcStore, InMemoryOrderStore, InMemoryPenaltyStore, NpcStore, PenaltyStore,
    };
    use futures::future::join_all;

    struct Rig {
        lifecycle: Arc<OrderLifecycle>,
        wallet: Arc<InMemoryWallet>,
        npcs: Arc<InMemoryNpcStore>,
        contracts: Arc<InMemoryContractStore>,
        penalties: Arc<InMemoryPenaltyStore>,
        reputation: Arc<ReputationEngine>,
        events: Arc<OrderEventBus>,
    }

    fn rig() -> Rig {
        rig_with(CostEstimator::new())
    }

    fn rig_with(estimator: CostEstimator) -> Rig {
        let orders = Arc::new(InMemoryOrderStore::new());
        let penalties = Arc::new(InMemoryPenaltyStore::new());
        let metrics = Arc::new(InMemoryMetricsStore::new());
        let npcs = Arc::new(InMemoryNpcStore::new());
        let contracts = Arc::new(InMemoryContractStore::new());
        let wallet = Arc::new(InMemoryWallet::new());
        let events = Arc::new(OrderEventBus::new());

        let reputation = Arc::new(ReputationEngine::new(
            orders.clone(),
            penalties.clone(),
            metrics,
            ReputationConfig::default(),
        ));
        let assessor = Arc::new(PenaltyAssessor::new(
            penalties.clone(),
            reputation.clone(),
            PenaltyConfig::default(),
        ));
        let npc_executor = Arc::new(NpcContractExecutor::new(
            npcs.clone(),
            contracts.clone(),
            reputation.clone(),
            NpcExecutorConfig::default(),
        ));
        let lifecycle = Arc::new(
            OrderLifecycle::new(
                orders,
                wallet.clone(),
                npc_executor,
                reputation.clone(),
                assessor,
                events.clone(),
                LifecycleConfig::default(),
            )
            .with_estimator(estimator),
        );

        Rig {
            lifecycle,
            wallet,
            npcs,
            contracts,
            penalties,
            reputation,
            events,
        }
    }

    fn transport_draft(payment: i64) -> OrderDraft {
        OrderDraft::builder()
            .kind(OrderKind::Transportation)
            .title("Escort a client out of Japantown")
            .payment(Eurodollars::new(payment))
            .min_level(35)
            .build()
            .unwrap()
    }

    /// Drive a draft through to `Published` for a funded client.
    async fn published_order(rig: &Rig, client: Uuid, draft: OrderDraft) -> Order {
        rig.wallet.deposit(client, Eurodollars::new(1_000)).await;
        let order = rig.lifecycle.create(client, draft).await.unwrap();
        rig.lifecycle.submit(order.id).await.unwrap();
        rig.lifecycle.estimate(order.id).await.unwrap();
        rig.lifecycle.validate(order.id).await.unwrap();
        rig.lifecycle.publish(order.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_npc_mediated_walkthrough() {
        let rig = rig();
        let client = Uuid::new_v4();
        let broker = Uuid::new_v4();
        rig.wallet.deposit(client, Eurodollars::new(500)).await;
        rig.wallet.deposit(broker, Eurodollars::new(100)).await;

        let npc = NpcProfile::new("Takemura", OrderKind::Transportation, Eurodollars::new(20));
        let npc_id = npc.npc_id;
        rig.npcs.upsert(npc).await.unwrap();

        let order = rig
            .lifecycle
            .create(client, transport_draft(150))
            .await
            .unwrap();
        assert!(order.cost_estimate.is_none());

        rig.lifecycle.submit(order.id).await.unwrap();
        let estimated = rig.lifecycle.estimate(order.id).await.unwrap();
        assert_eq!(estimated.cost_estimate, Some(Eurodollars::new(150)));

        rig.lifecycle.validate(order.id).await.unwrap();
        rig.lifecycle.publish(order.id).await.unwrap();
        assert_eq!(rig.wallet.balance(client).await, Eurodollars::new(350));

        rig.lifecycle.accept(order.id, broker).await.unwrap();
        let executing = rig
            .lifecycle
            .execute_via_npc(order.id, broker, npc_id, 2)
            .await
            .unwrap();
        assert_eq!(executing.status, OrderStatus::Executing);
        assert_eq!(executing.hired_npc_id, Some(npc_id));
        assert!(executing.is_via_npc());
        // 2 days at 20 eb/day came out of the broker's pocket.
        assert_eq!(rig.wallet.balance(broker).await, Eurodollars::new(60));

        let completed = rig.lifecycle.complete(order.id, None).await.unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
        assert_eq!(completed.quality, Some(CompletionQuality::Good));

        let freed = rig
            .contracts
            .active_for_npc(npc_id, Utc::now())
            .await
            .unwrap();
        assert!(freed.is_none());

        // Payment 150 plus bonus: floor 10 + medium difficulty 10.
        assert_eq!(rig.wallet.balance(broker).await, Eurodollars::new(230));

        let metrics = rig
            .reputation
            .metrics(broker, Role::Executor)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(metrics.completion_rate, 1.0);
        assert_eq!(metrics.orders_completed, 1);

        // The NPC built executor history off the proxied order too.
        let npc_metrics = rig
            .reputation
            .metrics(npc_id, Role::Executor)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(npc_metrics.completion_rate, 1.0);
        let profile = rig.npcs.get(npc_id).await.unwrap().unwrap();
        assert_eq!(profile.jobs_completed, 1);
    }

    #[tokio::test]
    async fn test_accepting_a_draft_is_invalid() {
        let rig = rig();
        let order = rig
            .lifecycle
            .create(Uuid::new_v4(), transport_draft(50))
            .await
            .unwrap();

        let result = rig.lifecycle.accept(order.id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(FixerError::InvalidState { .. })));
        // The rejection left the order untouched.
        let unchanged = rig.lifecycle.order(order.id).await.unwrap();
        assert_eq!(unchanged.status, OrderStatus::Draft);
        assert_eq!(unchanged.version, 0);
    }

    #[tokio::test]
    async fn test_concurrent_accepts_yield_one_winner() {
        let rig = rig();
        let order = published_order(&rig, Uuid::new_v4(), transport_draft(80)).await;

        let attempts: Vec<_> = (0..6)
            .map(|_| {
                let lifecycle = rig.lifecycle.clone();
                let order_id = order.id;
                async move { lifecycle.accept(order_id, Uuid::new_v4()).await }
            })
            .collect();
        let results = join_all(attempts).await;

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(FixerError::InvalidState { .. }))));
    }

    #[tokio::test]
    async fn test_self_acceptance_rejected() {
        let rig = rig();
        let client = Uuid::new_v4();
        let order = published_order(&rig, client, transport_draft(80)).await;

        let result = rig.lifecycle.accept(order.id, client).await;
        assert!(matches!(result, Err(FixerError::SelfAcceptance { .. })));
    }

    #[tokio::test]
    async fn test_validation_failures_cancel() {
        let rig = rig();
        let client = Uuid::new_v4();

        let cases = [
            OrderDraft::builder()
                .kind(OrderKind::Service)
                .title("Run")
                .payment(Eurodollars::new(50))
                .build()
                .unwrap(),
            OrderDraft::builder()
                .kind(OrderKind::Service)
                .title("Water a rooftop garden")
                .payment(Eurodollars::zero())
                .build()
                .unwrap(),
            OrderDraft::builder()
                .kind(OrderKind::Service)
                .title("Water a rooftop garden")
                .payment(Eurodollars::new(50))
                .deadline(Utc::now() - Duration::hours(2))
                .build()
                .unwrap(),
        ];

        for draft in cases {
            let order = rig.lifecycle.create(client, draft).await.unwrap();
            rig.lifecycle.submit(order.id).await.unwrap();
            rig.lifecycle.estimate(order.id).await.unwrap();

            let result = rig.lifecycle.validate(order.id).await;
            assert!(matches!(result, Err(FixerError::ValidationFailed { .. })));
            let cancelled = rig.lifecycle.order(order.id).await.unwrap();
            assert_eq!(cancelled.status, OrderStatus::Cancelled);
        }
    }

    #[tokio::test]
    async fn test_publish_with_empty_wallet_stays_publishable() {
        let rig = rig();
        let client = Uuid::new_v4();

        let order = rig
            .lifecycle
            .create(client, transport_draft(100))
            .await
            .unwrap();
        rig.lifecycle.submit(order.id).await.unwrap();
        rig.lifecycle.estimate(order.id).await.unwrap();
        rig.lifecycle.validate(order.id).await.unwrap();

        let broke = rig.lifecycle.publish(order.id).await;
        assert!(matches!(broke, Err(FixerError::PaymentFailed { .. })));
        let parked = rig.lifecycle.order(order.id).await.unwrap();
        assert_eq!(parked.status, OrderStatus::ReadyToPublish);

        // Funded, the same publish goes through.
        rig.wallet.deposit(client, Eurodollars::new(200)).await;
        let published = rig.lifecycle.publish(order.id).await.unwrap();
        assert_eq!(published.status, OrderStatus::Published);
    }

    #[tokio::test]
    async fn test_custom_estimator_prices_escrow() {
        let rig = rig_with(CostEstimator::with_config(EstimatorConfig {
            premium_surcharge: Eurodollars::new(40),
        }));
        let client = Uuid::new_v4();
        rig.wallet.deposit(client, Eurodollars::new(500)).await;

        let draft = OrderDraft::builder()
            .kind(OrderKind::Transportation)
            .title("Escort a client out of Japantown")
            .payment(Eurodollars::new(150))
            .min_level(35)
            .premium(true)
            .build()
            .unwrap();
        let order = rig.lifecycle.create(client, draft).await.unwrap();
        rig.lifecycle.submit(order.id).await.unwrap();

        let estimated = rig.lifecycle.estimate(order.id).await.unwrap();
        assert_eq!(estimated.cost_estimate, Some(Eurodollars::new(190)));

        rig.lifecycle.validate(order.id).await.unwrap();
        rig.lifecycle.publish(order.id).await.unwrap();
        assert_eq!(rig.wallet.balance(client).await, Eurodollars::new(310));
    }

    #[tokio::test]
    async fn test_cancel_refunds_published_escrow() {
        let rig = rig();
        let client = Uuid::new_v4();
        let order = published_order(&rig, client, transport_draft(150)).await;
        assert_eq!(rig.wallet.balance(client).await, Eurodollars::new(850));

        let outsider = rig.lifecycle.cancel(order.id, Uuid::new_v4()).await;
        assert!(matches!(outsider, Err(FixerError::ValidationFailed { .. })));

        let cancelled = rig.lifecycle.cancel(order.id, client).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(rig.wallet.balance(client).await, Eurodollars::new(1_000));
    }

    #[tokio::test]
    async fn test_cancel_after_acceptance_too_late() {
        let rig = rig();
        let client = Uuid::new_v4();
        let order = published_order(&rig, client, transport_draft(100)).await;
        rig.lifecycle.accept(order.id, Uuid::new_v4()).await.unwrap();

        let result = rig.lifecycle.cancel(order.id, client).await;
        assert!(matches!(result, Err(FixerError::TooLateToCancel { .. })));

        let complete_first = rig.lifecycle.order(order.id).await.unwrap();
        assert_eq!(complete_first.status, OrderStatus::Accepted);
    }

    #[tokio::test]
    async fn test_fail_refunds_client_and_penalizes_executor() {
        let rig = rig();
        let client = Uuid::new_v4();
        let executor = Uuid::new_v4();
        let order = published_order(&rig, client, transport_draft(100)).await;
        let escrowed = rig.wallet.balance(client).await;

        rig.lifecycle.accept(order.id, executor).await.unwrap();
        rig.lifecycle
            .start_execution(order.id, executor)
            .await
            .unwrap();
        let failed = rig
            .lifecycle
            .fail(order.id, PenaltyReason::Abandonment)
            .await
            .unwrap();
        assert_eq!(failed.status, OrderStatus::Failed);
        assert_eq!(failed.failure_reason, Some(PenaltyReason::Abandonment));

        // Escrow went back to the client.
        assert_eq!(
            rig.wallet.balance(client).await,
            escrowed + Eurodollars::new(100)
        );

        let log = rig.penalties.for_executor(executor).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].severity, 3);

        let metrics = rig
            .reputation
            .metrics(executor, Role::Executor)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(metrics.completion_rate, 0.0);
        assert!(metrics.penalty_rate > 0.0);
    }

    #[tokio::test]
    async fn test_wrong_executor_cannot_start() {
        let rig = rig();
        let order = published_order(&rig, Uuid::new_v4(), transport_draft(60)).await;
        let executor = Uuid::new_v4();
        rig.lifecycle.accept(order.id, executor).await.unwrap();

        let impostor = rig
            .lifecycle
            .start_execution(order.id, Uuid::new_v4())
            .await;
        assert!(matches!(impostor, Err(FixerError::InvalidState { .. })));

        rig.lifecycle
            .start_execution(order.id, executor)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_early_completion_bonus() {
        let rig = rig();
        let client = Uuid::new_v4();
        let executor = Uuid::new_v4();

        let draft = OrderDraft::builder()
            .kind(OrderKind::Transportation)
            .title("Escort a client out of Japantown")
            .payment(Eurodollars::new(150))
            .min_level(35)
            .deadline(Utc::now() + Duration::days(3))
            .build()
            .unwrap();
        let order = published_order(&rig, client, draft).await;

        rig.lifecycle.accept(order.id, executor).await.unwrap();
        rig.lifecycle
            .start_execution(order.id, executor)
            .await
            .unwrap();
        rig.lifecycle
            .complete(order.id, Some(CompletionQuality::Excellent))
            .await
            .unwrap();

        // Payment 150 + floor 10 + medium 10 + early 15.
        assert_eq!(rig.wallet.balance(executor).await, Eurodollars::new(185));
    }

    #[tokio::test]
    async fn test_lifecycle_events_reach_subscribers() {
        let rig = rig();
        let client = Uuid::new_v4();
        rig.wallet.deposit(client, Eurodollars::new(500)).await;

        let order = rig
            .lifecycle
            .create(client, transport_draft(100))
            .await
            .unwrap();
        let mut sub = rig.events.subscribe(EventFilter::order(order.id)).await;

        rig.lifecycle.submit(order.id).await.unwrap();
        rig.lifecycle.estimate(order.id).await.unwrap();
        rig.lifecycle.validate(order.id).await.unwrap();
        rig.lifecycle.publish(order.id).await.unwrap();
        rig.lifecycle.accept(order.id, Uuid::new_v4()).await.unwrap();

        let first = sub.receiver.recv().await.unwrap();
        assert_eq!(first.kind(), "published");
        let second = sub.receiver.recv().await.unwrap();
        assert_eq!(second.kind(), "accepted");
    }
}
