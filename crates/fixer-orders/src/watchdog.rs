//! Background sweeper for executors who accept an order and never start.
//!
//! Expiry is lazy: an accepted order only turns `Failed` when a sweep
//! visits it, not the instant its grace window lapses.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use fixer_core::{OrderStatus, PenaltyReason};
use fixer_store::OrderStore;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::lifecycle::OrderLifecycle;

/// Configuration for the acceptance watchdog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Minutes an executor gets between accepting and starting execution.
    pub grace_minutes: i64,

    /// Seconds between sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            grace_minutes: 30,
            sweep_interval_secs: 60,
        }
    }
}

/// Periodically fails accepted orders whose grace window has lapsed.
pub struct AcceptanceWatchdog {
    lifecycle: Arc<OrderLifecycle>,
    orders: Arc<dyn OrderStore>,
    config: WatchdogConfig,
    shutdown: watch::Receiver<bool>,
}

impl AcceptanceWatchdog {
    pub fn new(
        lifecycle: Arc<OrderLifecycle>,
        orders: Arc<dyn OrderStore>,
        config: WatchdogConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            lifecycle,
            orders,
            config,
            shutdown,
        }
    }

    /// Sweep until shutdown is signalled.
    pub async fn run(self: Arc<Self>) {
        info!(
            "acceptance watchdog started: {}m grace, sweeping every {}s",
            self.config.grace_minutes, self.config.sweep_interval_secs
        );
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = tokio::time::sleep(StdDuration::from_secs(self.config.sweep_interval_secs)) => {
                    self.sweep().await;
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!("acceptance watchdog stopped");
                        return;
                    }
                }
            }
        }
    }

    /// Fail every accepted order older than the grace window.
    ///
    /// Individual failures are logged and skipped so one bad order cannot
    /// stall the sweep.
    pub async fn sweep(&self) {
        let accepted = match self.orders.list_by_status(OrderStatus::Accepted).await {
            Ok(orders) => orders,
            Err(err) => {
                warn!("acceptance sweep could not list orders: {}", err);
                return;
            }
        };

        let cutoff = Utc::now() - Duration::minutes(self.config.grace_minutes);
        for order in accepted {
            let accepted_at = match order.accepted_at {
                Some(at) => at,
                None => continue,
            };
            if accepted_at > cutoff {
                continue;
            }

            match self
                .lifecycle
                .fail(order.id, PenaltyReason::AcceptanceTimeout)
                .await
            {
                Ok(_) => info!("order {} failed after acceptance timeout", order.id),
                Err(err) => warn!("order {} timeout sweep error: {}", order.id, err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleConfig;
    use crate::npc::{NpcContractExecutor, NpcExecutorConfig};
    use crate::wallet::InMemoryWallet;
    use fixer_core::{Eurodollars, FixerError, OrderDraft, OrderKind, Role};
    use fixer_reputation::{
        PenaltyAssessor, PenaltyConfig, ReputationConfig, ReputationEngine,
    };
    use fixer_store::{
        InMemoryContractStore, InMemoryMetricsStore, InMemoryNpcStore, InMemoryOrderStore,
        InMemoryPenaltyStore, OrderEventBus, PenaltyStore,
    };
    use uuid::Uuid;

    struct Rig {
        lifecycle: Arc<OrderLifecycle>,
        orders: Arc<InMemoryOrderStore>,
        wallet: Arc<InMemoryWallet>,
        penalties: Arc<InMemoryPenaltyStore>,
        reputation: Arc<ReputationEngine>,
    }

    fn rig() -> Rig {
        let orders = Arc::new(InMemoryOrderStore::new());
        let penalties = Arc::new(InMemoryPenaltyStore::new());
        let reputation = Arc::new(ReputationEngine::new(
            orders.clone(),
            penalties.clone(),
            Arc::new(InMemoryMetricsStore::new()),
            ReputationConfig::default(),
        ));
        let assessor = Arc::new(PenaltyAssessor::new(
            penalties.clone(),
            reputation.clone(),
            PenaltyConfig::default(),
        ));
        let npc_executor = Arc::new(NpcContractExecutor::new(
            Arc::new(InMemoryNpcStore::new()),
            Arc::new(InMemoryContractStore::new()),
            reputation.clone(),
            NpcExecutorConfig::default(),
        ));
        let wallet = Arc::new(InMemoryWallet::new());
        let lifecycle = Arc::new(OrderLifecycle::new(
            orders.clone(),
            wallet.clone(),
            npc_executor,
            reputation.clone(),
            assessor,
            Arc::new(OrderEventBus::new()),
            LifecycleConfig::default(),
        ));

        Rig {
            lifecycle,
            orders,
            wallet,
            penalties,
            reputation,
        }
    }

    async fn accepted_order(rig: &Rig, client: Uuid, executor: Uuid) -> Uuid {
        rig.wallet.deposit(client, Eurodollars::new(500)).await;
        let draft = OrderDraft::builder()
            .kind(OrderKind::Transportation)
            .title("Move a crate across Watson")
            .payment(Eurodollars::new(80))
            .build()
            .unwrap();
        let order = rig.lifecycle.create(client, draft).await.unwrap();
        rig.lifecycle.submit(order.id).await.unwrap();
        rig.lifecycle.estimate(order.id).await.unwrap();
        rig.lifecycle.validate(order.id).await.unwrap();
        rig.lifecycle.publish(order.id).await.unwrap();
        rig.lifecycle.accept(order.id, executor).await.unwrap();
        order.id
    }

    /// Push an order's acceptance timestamp into the past.
    async fn rewind_acceptance(rig: &Rig, order_id: Uuid, minutes: i64) {
        use fixer_store::OrderStore;
        let mut order = rig.orders.get(order_id).await.unwrap().unwrap();
        order.accepted_at = Some(Utc::now() - Duration::minutes(minutes));
        let version = order.version;
        rig.orders.update(order, version).await.unwrap();
    }

    fn watchdog(rig: &Rig) -> Arc<AcceptanceWatchdog> {
        let (_tx, rx) = watch::channel(false);
        Arc::new(AcceptanceWatchdog::new(
            rig.lifecycle.clone(),
            rig.orders.clone(),
            WatchdogConfig::default(),
            rx,
        ))
    }

    #[tokio::test]
    async fn test_sweep_fails_stale_accepted_orders() {
        let rig = rig();
        let client = Uuid::new_v4();
        let executor = Uuid::new_v4();
        let order_id = accepted_order(&rig, client, executor).await;
        rewind_acceptance(&rig, order_id, 45).await;

        watchdog(&rig).sweep().await;

        let failed = rig.lifecycle.order(order_id).await.unwrap();
        assert_eq!(failed.status, OrderStatus::Failed);
        assert_eq!(
            failed.failure_reason,
            Some(PenaltyReason::AcceptanceTimeout)
        );

        // Escrow went home and the executor picked up a light penalty.
        assert_eq!(rig.wallet.balance(client).await, Eurodollars::new(500));
        let log = rig.penalties.for_executor(executor).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].severity, 1);

        // A late start attempt gets the timeout error, not a state error.
        let late = rig.lifecycle.start_execution(order_id, executor).await;
        assert!(matches!(late, Err(FixerError::AcceptanceTimeout { .. })));
    }

    #[tokio::test]
    async fn test_sweep_spares_fresh_orders() {
        let rig = rig();
        let order_id = accepted_order(&rig, Uuid::new_v4(), Uuid::new_v4()).await;

        watchdog(&rig).sweep().await;

        let untouched = rig.lifecycle.order(order_id).await.unwrap();
        assert_eq!(untouched.status, OrderStatus::Accepted);
        assert!(untouched.failure_reason.is_none());
    }

    #[tokio::test]
    async fn test_sweep_only_times_out_lapsed_orders() {
        let rig = rig();
        let stale = accepted_order(&rig, Uuid::new_v4(), Uuid::new_v4()).await;
        let fresh = accepted_order(&rig, Uuid::new_v4(), Uuid::new_v4()).await;
        rewind_acceptance(&rig, stale, 31).await;

        watchdog(&rig).sweep().await;

        assert_eq!(
            rig.lifecycle.order(stale).await.unwrap().status,
            OrderStatus::Failed
        );
        assert_eq!(
            rig.lifecycle.order(fresh).await.unwrap().status,
            OrderStatus::Accepted
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let rig = rig();
        let (tx, rx) = watch::channel(false);
        let watchdog = Arc::new(AcceptanceWatchdog::new(
            rig.lifecycle.clone(),
            rig.orders.clone(),
            WatchdogConfig::default(),
            rx,
        ));

        let handle = tokio::spawn(watchdog.run());
        tx.send(true).unwrap();

        tokio::time::timeout(StdDuration::from_secs(1), handle)
            .await
            .expect("watchdog did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_reputation_reflects_timeout() {
        let rig = rig();
        let executor = Uuid::new_v4();
        let order_id = accepted_order(&rig, Uuid::new_v4(), executor).await;
        rewind_acceptance(&rig, order_id, 90).await;

        watchdog(&rig).sweep().await;

        let metrics = rig
            .reputation
            .metrics(executor, Role::Executor)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(metrics.completion_rate, 0.0);
        assert!(metrics.penalty_rate > 0.0);
    }
}
