//! Penalty assessment and decay.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fixer_core::{FixerError, Order, OrderPenalty, PenaltyReason, Result, Role};
use fixer_store::PenaltyStore;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::metrics::ReputationEngine;

/// Configuration for penalty windowing, decay, and escalation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyConfig {
    /// Rolling window, in days, inside which penalties count.
    pub window_days: u32,

    /// Per-day multiplier applied to a penalty's severity as it ages.
    pub decay_per_day: f64,

    /// Severity mass at which `penalty_rate` saturates to 1.0.
    pub rate_cap: f64,

    /// Most severity steps repeat offences can add inside the window.
    pub repeat_step_cap: u8,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            decay_per_day: 0.9,
            rate_cap: 10.0,
            repeat_step_cap: 2,
        }
    }
}

/// Decayed severity mass of a penalty history at `as_of`.
///
/// Penalties older than the window contribute nothing; younger ones
/// contribute `severity * decay_per_day^age_days`. The sum is divided by
/// the cap and clamped to [0, 1]. Pure in its inputs.
pub fn penalty_rate(history: &[OrderPenalty], as_of: DateTime<Utc>, config: &PenaltyConfig) -> f64 {
    let window = f64::from(config.window_days);
    let mass: f64 = history
        .iter()
        .map(|p| (f64::from(p.severity), p.age_days(as_of)))
        .filter(|(_, age)| *age < window)
        .map(|(severity, age)| severity * config.decay_per_day.powf(age))
        .sum();

    if config.rate_cap <= 0.0 {
        return if mass > 0.0 { 1.0 } else { 0.0 };
    }
    (mass / config.rate_cap).clamp(0.0, 1.0)
}

/// Assesses penalties against executors and feeds them back into metrics.
pub struct PenaltyAssessor {
    penalties: Arc<dyn PenaltyStore>,
    engine: Arc<ReputationEngine>,
    config: PenaltyConfig,
}

impl PenaltyAssessor {
    /// Create an assessor over a penalty log and the reputation engine.
    pub fn new(
        penalties: Arc<dyn PenaltyStore>,
        engine: Arc<ReputationEngine>,
        config: PenaltyConfig,
    ) -> Self {
        Self {
            penalties,
            engine,
            config,
        }
    }

    /// Record a penalty for a failure on `order` and recompute the
    /// executor's metrics.
    ///
    /// Severity starts at the reason's base ordinal; every prior penalty
    /// still inside the window adds one step, up to the configured cap.
    pub async fn assess(&self, order: &Order, reason: PenaltyReason) -> Result<OrderPenalty> {
        let executor_id = order.executor_id.ok_or_else(|| {
            FixerError::Internal(format!("order {} has no executor to penalize", order.id))
        })?;
        let now = Utc::now();

        let repeats = self.repeat_offences(executor_id, now).await?;
        let step = u8::try_from(repeats)
            .unwrap_or(u8::MAX)
            .min(self.config.repeat_step_cap);
        let severity = reason.base_severity().saturating_add(step);

        let penalty = OrderPenalty::new(order.id, executor_id, reason, severity, now);
        self.penalties.append(penalty.clone()).await?;
        warn!(
            "penalty {:?} (severity {}) assessed against executor {} for order {}",
            reason, severity, executor_id, order.id
        );

        self.engine
            .recompute_metrics(executor_id, Role::Executor, now)
            .await?;

        Ok(penalty)
    }

    /// Prior penalties of an executor still inside the window at `now`.
    async fn repeat_offences(&self, executor_id: Uuid, now: DateTime<Utc>) -> Result<usize> {
        let window = Duration::days(i64::from(self.config.window_days));
        let history = self.penalties.for_executor(executor_id).await?;
        Ok(history
            .iter()
            .filter(|p| now - p.applied_at < window)
            .count())
    }
}
