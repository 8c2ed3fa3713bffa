//! Penalty, metrics, signal, and resonance index stores.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fixer_core::{
    OrderPenalty, RatingMetrics, ResonanceDimension, ResonanceIndex, ResonanceSubject, Result,
    Role,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Trait for the append-only penalty log.
#[async_trait]
pub trait PenaltyStore: Send + Sync {
    /// Append a penalty record. Records are immutable once written.
    async fn append(&self, penalty: OrderPenalty) -> Result<()>;

    /// All penalties ever assessed against an executor, oldest first.
    async fn for_executor(&self, executor_id: Uuid) -> Result<Vec<OrderPenalty>>;
}

/// In-memory implementation of PenaltyStore.
pub struct InMemoryPenaltyStore {
    penalties: Arc<RwLock<Vec<OrderPenalty>>>,
}

impl InMemoryPenaltyStore {
    /// Create a new in-memory penalty log.
    pub fn new() -> Self {
        Self {
            penalties: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryPenaltyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PenaltyStore for InMemoryPenaltyStore {
    async fn append(&self, penalty: OrderPenalty) -> Result<()> {
        let mut penalties = self.penalties.write().await;
        penalties.push(penalty);
        Ok(())
    }

    async fn for_executor(&self, executor_id: Uuid) -> Result<Vec<OrderPenalty>> {
        let penalties = self.penalties.read().await;
        let mut matching: Vec<OrderPenalty> = penalties
            .iter()
            .filter(|p| p.executor_id == executor_id)
            .cloned()
            .collect();
        matching.sort_by_key(|p| p.applied_at);
        Ok(matching)
    }
}

/// Trait for per-(actor, role) rating metrics.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Store recomputed metrics for an actor in a role.
    async fn put(&self, actor_id: Uuid, role: Role, metrics: RatingMetrics) -> Result<()>;

    /// Current metrics for an actor in a role.
    async fn get(&self, actor_id: Uuid, role: Role) -> Result<Option<RatingMetrics>>;
}

/// In-memory implementation of MetricsStore.
pub struct InMemoryMetricsStore {
    metrics: Arc<RwLock<HashMap<(Uuid, Role), RatingMetrics>>>,
}

impl InMemoryMetricsStore {
    /// Create a new in-memory metrics store.
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryMetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsStore for InMemoryMetricsStore {
    async fn put(&self, actor_id: Uuid, role: Role, metrics: RatingMetrics) -> Result<()> {
        let mut map = self.metrics.write().await;
        map.insert((actor_id, role), metrics);
        Ok(())
    }

    async fn get(&self, actor_id: Uuid, role: Role) -> Result<Option<RatingMetrics>> {
        let map = self.metrics.read().await;
        Ok(map.get(&(actor_id, role)).cloned())
    }
}

/// Trait for per-actor, per-dimension social signal counters.
///
/// External systems (romance arcs, event attendance, alliance changes,
/// crisis responses) record here; the resonance aggregator only reads.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Increment a counter and return the new count.
    async fn record(&self, actor_id: Uuid, dimension: ResonanceDimension) -> Result<u64>;

    /// Current count for an actor and dimension.
    async fn count(&self, actor_id: Uuid, dimension: ResonanceDimension) -> Result<u64>;
}

/// In-memory implementation of SignalStore.
pub struct InMemorySignalStore {
    counters: Arc<RwLock<HashMap<(Uuid, ResonanceDimension), u64>>>,
}

impl InMemorySignalStore {
    /// Create a new in-memory signal store.
    pub fn new() -> Self {
        Self {
            counters: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySignalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalStore for InMemorySignalStore {
    async fn record(&self, actor_id: Uuid, dimension: ResonanceDimension) -> Result<u64> {
        let mut counters = self.counters.write().await;
        let count = counters.entry((actor_id, dimension)).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn count(&self, actor_id: Uuid, dimension: ResonanceDimension) -> Result<u64> {
        let counters = self.counters.read().await;
        Ok(counters.get(&(actor_id, dimension)).copied().unwrap_or(0))
    }
}

/// Trait for computed resonance indices.
#[async_trait]
pub trait ResonanceStore: Send + Sync {
    /// Store a freshly aggregated index.
    async fn put(&self, index: ResonanceIndex) -> Result<()>;

    /// Latest index for a subject.
    async fn get(&self, subject: ResonanceSubject) -> Result<Option<ResonanceIndex>>;
}

/// In-memory implementation of ResonanceStore.
pub struct InMemoryResonanceStore {
    indices: Arc<RwLock<HashMap<ResonanceSubject, ResonanceIndex>>>,
}

impl InMemoryResonanceStore {
    /// Create a new in-memory resonance store.
    pub fn new() -> Self {
        Self {
            indices: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryResonanceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResonanceStore for InMemoryResonanceStore {
    async fn put(&self, index: ResonanceIndex) -> Result<()> {
        let mut indices = self.indices.write().await;
        indices.insert(index.subject, index);
        Ok(())
    }

    async fn get(&self, subject: ResonanceSubject) -> Result<Option<ResonanceIndex>> {
        let indices = self.indices.read().await;
        Ok(indices.get(&subject).cloned())
    }
}
