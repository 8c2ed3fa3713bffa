//! Metric recomputation and reputation scoring.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fixer_core::{
    Order, OrderPenalty, OrderStatus, RatingMetrics, ReputationFormula, ReputationTier, Result,
    Role, TierLadder,
};
use fixer_store::{MetricsStore, OrderStore, PenaltyStore};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::formula::{FormulaFn, FormulaRegistry};
use crate::penalty::{penalty_rate, PenaltyConfig};

/// Configuration for the reputation engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReputationConfig {
    /// Penalty windowing and decay feeding `penalty_rate`.
    pub penalty: PenaltyConfig,

    /// Score thresholds separating the standing tiers.
    pub ladder: TierLadder,
}

/// Compute rating metrics from one actor's order and penalty history.
///
/// `orders` is the actor's history in the role being rated; `penalties`
/// the actor's penalty log (empty for client-role ratings, since penalties
/// attach to executors). Pure in its inputs, which keeps scoring
/// replayable; [`ReputationEngine::recompute_metrics`] wraps it with store
/// reads and persists the result.
pub fn compute_metrics(
    orders: &[Order],
    penalties: &[OrderPenalty],
    as_of: DateTime<Utc>,
    config: &PenaltyConfig,
) -> RatingMetrics {
    let completed: Vec<&Order> = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Completed)
        .collect();
    let failed = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Failed)
        .count();

    let finished = completed.len() + failed;
    let completion_rate = if finished == 0 {
        0.0
    } else {
        completed.len() as f64 / finished as f64
    };

    // Punctuality only judges completed orders that carried a deadline.
    let timed: Vec<bool> = completed.iter().filter_map(|o| o.completed_on_time()).collect();
    let punctuality = if timed.is_empty() {
        1.0
    } else {
        timed.iter().filter(|on_time| **on_time).count() as f64 / timed.len() as f64
    };

    let qualities: Vec<f64> = completed
        .iter()
        .filter_map(|o| o.quality)
        .map(|q| q.normalized())
        .collect();
    let avg_quality = if qualities.is_empty() {
        0.0
    } else {
        qualities.iter().sum::<f64>() / qualities.len() as f64
    };

    RatingMetrics {
        completion_rate,
        punctuality,
        penalty_rate: penalty_rate(penalties, as_of, config),
        avg_quality,
        orders_completed: completed.len() as u32,
        orders_failed: failed as u32,
        computed_at: as_of,
    }
    .clamped()
}

/// Recomputes per-actor metrics and evaluates reputation formulas.
pub struct ReputationEngine {
    orders: Arc<dyn OrderStore>,
    penalties: Arc<dyn PenaltyStore>,
    metrics: Arc<dyn MetricsStore>,
    registry: FormulaRegistry,
    config: ReputationConfig,

    /// Per-actor recomputation locks; serializes metric writes for one
    /// actor without coupling unrelated actors.
    recompute_locks: Arc<RwLock<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl ReputationEngine {
    /// Create an engine over the given stores, with the built-in formulas.
    pub fn new(
        orders: Arc<dyn OrderStore>,
        penalties: Arc<dyn PenaltyStore>,
        metrics: Arc<dyn MetricsStore>,
        config: ReputationConfig,
    ) -> Self {
        Self {
            orders,
            penalties,
            metrics,
            registry: FormulaRegistry::new(),
            config,
            recompute_locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a custom scoring formula, replacing any existing entry
    /// under the same name.
    pub fn register_formula(&mut self, name: impl Into<String>, formula: FormulaFn) {
        self.registry.register(name, formula);
    }

    /// Recompute and persist `RatingMetrics` for an actor in a role.
    ///
    /// Serialized per actor, so concurrent completion and penalty triggers
    /// cannot interleave partial updates for the same actor.
    pub async fn recompute_metrics(
        &self,
        actor_id: Uuid,
        role: Role,
        as_of: DateTime<Utc>,
    ) -> Result<RatingMetrics> {
        let lock = self.actor_lock(actor_id).await;
        let _guard = lock.lock().await;

        let history = self.orders.history_for(actor_id, role).await?;
        // Penalties attach to executors; a client-role rating carries none.
        let penalties = match role {
            Role::Executor => self.penalties.for_executor(actor_id).await?,
            Role::Client => Vec::new(),
        };

        let metrics = compute_metrics(&history, &penalties, as_of, &self.config.penalty);
        debug!(
            "recomputed {:?} metrics for actor {}: completion {:.3}, punctuality {:.3}, penalty {:.3}, quality {:.3}",
            role, actor_id, metrics.completion_rate, metrics.punctuality, metrics.penalty_rate,
            metrics.avg_quality
        );

        self.metrics.put(actor_id, role, metrics.clone()).await?;
        Ok(metrics)
    }

    /// Stored metrics for an actor in a role, if any were ever computed.
    pub async fn metrics(&self, actor_id: Uuid, role: Role) -> Result<Option<RatingMetrics>> {
        self.metrics.get(actor_id, role).await
    }

    /// Evaluate a formula against explicit metrics.
    pub fn evaluate(&self, formula: &ReputationFormula, metrics: &RatingMetrics) -> Result<f64> {
        self.registry.evaluate(formula, metrics)
    }

    /// Score an actor by evaluating `formula` over their stored metrics.
    ///
    /// An actor with no stored metrics scores as an empty history.
    pub async fn score(&self, actor_id: Uuid, role: Role, formula: &ReputationFormula) -> Result<f64> {
        let metrics = self
            .metrics
            .get(actor_id, role)
            .await?
            .unwrap_or_else(|| RatingMetrics::empty(Utc::now()));
        self.registry.evaluate(formula, &metrics)
    }

    /// Map a scalar score onto the configured tier ladder.
    pub fn tier(&self, score: f64) -> ReputationTier {
        self.config.ladder.tier_for(score)
    }

    async fn actor_lock(&self, actor_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.recompute_locks.write().await;
        locks
            .entry(actor_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
