//! Resonance aggregation.
//!
//! Folds reputation and social signal counters into a weighted index per
//! actor or guild. Aggregation is read-only over its sources; the only
//! write is the finished index going into the resonance store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use fixer_core::{
    ReputationFormula, ResonanceDimension, ResonanceIndex, ResonanceSubject, ResonanceWeights,
    Result, Role, TierLadder,
};
use fixer_reputation::{ReputationEngine, WEIGHTED_SUM};
use fixer_store::{ResonanceStore, SignalStore};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::guild::GuildDirectory;

/// Configuration for resonance aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResonanceConfig {
    /// Dimension weights; must sum to 1.0.
    pub weights: ResonanceWeights,

    /// Half-way point of the signal saturation curve `n / (n + k)`.
    pub saturation_k: f64,

    /// Reputation score treated as a full 1.0 reputation dimension.
    pub reputation_ceiling: f64,

    /// Formula evaluating the executor reputation score.
    pub formula: ReputationFormula,

    /// Seconds between background refresh cycles.
    pub refresh_interval_secs: u64,
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        let ladder = TierLadder::default();
        Self {
            weights: ResonanceWeights::default(),
            saturation_k: 10.0,
            reputation_ceiling: ladder.top(),
            formula: ReputationFormula::new(WEIGHTED_SUM)
                .with_param("w_completion", 0.4)
                .with_param("w_punctuality", 0.3)
                .with_param("w_penalty", 0.2)
                .with_param("w_quality", 0.1)
                .with_param("scale", ladder.top()),
            refresh_interval_secs: 300,
        }
    }
}

/// Computes and persists resonance indexes.
pub struct ResonanceAggregator {
    reputation: Arc<ReputationEngine>,
    signals: Arc<dyn SignalStore>,
    store: Arc<dyn ResonanceStore>,
    guilds: Arc<dyn GuildDirectory>,
    config: ResonanceConfig,

    /// Subjects the background refresher re-aggregates.
    tracked: Arc<RwLock<HashSet<ResonanceSubject>>>,
}

impl ResonanceAggregator {
    /// Create an aggregator. Rejects weight sets that do not sum to one.
    pub fn new(
        reputation: Arc<ReputationEngine>,
        signals: Arc<dyn SignalStore>,
        store: Arc<dyn ResonanceStore>,
        guilds: Arc<dyn GuildDirectory>,
        config: ResonanceConfig,
    ) -> Result<Self> {
        config.weights.validate()?;
        Ok(Self {
            reputation,
            signals,
            store,
            guilds,
            config,
            tracked: Arc::new(RwLock::new(HashSet::new())),
        })
    }

    /// Register a subject for background refresh without aggregating now.
    pub async fn track(&self, subject: ResonanceSubject) {
        self.tracked.write().await.insert(subject);
    }

    /// Compute, persist, and return the index for a subject.
    pub async fn aggregate(&self, subject: ResonanceSubject) -> Result<ResonanceIndex> {
        let index = self.compute(subject).await?;
        self.store.put(index.clone()).await?;
        self.tracked.write().await.insert(subject);
        debug!("resonance for {} is {:.3}", subject, index.composite);
        Ok(index)
    }

    /// Latest persisted index for a subject, if any.
    pub async fn cached(&self, subject: ResonanceSubject) -> Result<Option<ResonanceIndex>> {
        self.store.get(subject).await
    }

    /// Re-aggregate tracked subjects until shutdown.
    ///
    /// A cycle is all-or-nothing: indexes are computed for every tracked
    /// subject first and written only once the whole batch is done, so a
    /// shutdown mid-cycle persists nothing from that cycle.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "resonance refresher started, {}s interval",
            self.config.refresh_interval_secs
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(StdDuration::from_secs(self.config.refresh_interval_secs)) => {}
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!("resonance refresher stopped");
                        return;
                    }
                    continue;
                }
            }

            let batch = tokio::select! {
                batch = self.compute_tracked() => batch,
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!("resonance refresher stopped mid-cycle, discarding partial results");
                        return;
                    }
                    continue;
                }
            };

            for index in batch {
                let subject = index.subject;
                if let Err(err) = self.store.put(index).await {
                    warn!("resonance refresh write for {} failed: {}", subject, err);
                }
            }
        }
    }

    /// Compute fresh indexes for every tracked subject.
    async fn compute_tracked(&self) -> Vec<ResonanceIndex> {
        let subjects: Vec<ResonanceSubject> = self.tracked.read().await.iter().copied().collect();
        let mut batch = Vec::with_capacity(subjects.len());
        for subject in subjects {
            match self.compute(subject).await {
                Ok(index) => batch.push(index),
                Err(err) => warn!("resonance refresh skipped {}: {}", subject, err),
            }
        }
        batch
    }

    async fn compute(&self, subject: ResonanceSubject) -> Result<ResonanceIndex> {
        match subject {
            ResonanceSubject::Actor { id } => self.compute_actor(id).await,
            ResonanceSubject::Guild { id } => self.compute_guild(id).await,
        }
    }

    async fn compute_actor(&self, actor_id: Uuid) -> Result<ResonanceIndex> {
        let mut scores = HashMap::new();
        for dimension in ResonanceDimension::all() {
            let score = match dimension {
                ResonanceDimension::Reputation => self.reputation_score(actor_id).await?,
                _ => self.signal_score(actor_id, dimension).await?,
            };
            scores.insert(dimension, score);
        }
        Ok(self.index_for(ResonanceSubject::actor(actor_id), scores))
    }

    /// A guild's dimension scores are the plain average over its roster.
    /// An empty roster yields an all-zero index.
    async fn compute_guild(&self, guild_id: Uuid) -> Result<ResonanceIndex> {
        let members = self.guilds.members(guild_id).await?;
        let mut scores: HashMap<ResonanceDimension, f64> = ResonanceDimension::all()
            .into_iter()
            .map(|dimension| (dimension, 0.0))
            .collect();

        if !members.is_empty() {
            for member in &members {
                let index = self.compute_actor(*member).await?;
                for dimension in ResonanceDimension::all() {
                    *scores.entry(dimension).or_insert(0.0) += index.score(dimension);
                }
            }
            let count = members.len() as f64;
            for score in scores.values_mut() {
                *score /= count;
            }
        }

        Ok(self.index_for(ResonanceSubject::guild(guild_id), scores))
    }

    fn index_for(
        &self,
        subject: ResonanceSubject,
        scores: HashMap<ResonanceDimension, f64>,
    ) -> ResonanceIndex {
        let composite = ResonanceDimension::all()
            .into_iter()
            .map(|dimension| {
                self.config.weights.weight(dimension)
                    * scores.get(&dimension).copied().unwrap_or(0.0)
            })
            .sum();

        ResonanceIndex {
            subject,
            scores,
            composite,
            computed_at: Utc::now(),
        }
    }

    /// Executor reputation normalized against the configured ceiling.
    async fn reputation_score(&self, actor_id: Uuid) -> Result<f64> {
        let score = self
            .reputation
            .score(actor_id, Role::Executor, &self.config.formula)
            .await?;
        Ok((score / self.config.reputation_ceiling).clamp(0.0, 1.0))
    }

    /// Saturating count score `n / (n + k)`: early events move the needle,
    /// later ones less, and the score stays below 1.0.
    async fn signal_score(&self, actor_id: Uuid, dimension: ResonanceDimension) -> Result<f64> {
        let n = self.signals.count(actor_id, dimension).await? as f64;
        if n == 0.0 {
            return Ok(0.0);
        }
        Ok(n / (n + self.config.saturation_k))
    }
}
