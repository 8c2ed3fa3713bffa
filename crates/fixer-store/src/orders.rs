//! Order, contract, and NPC roster stores.
//!
//! Every store trait assumes per-entity atomic compare-and-set where
//! mutation is possible: `update` takes the version the caller read, and a
//! moved version surfaces as a transient failure the caller may retry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fixer_core::{FixerError, NpcContract, NpcProfile, Order, OrderStatus, Result, Role};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// Trait for order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order. The id must be unused.
    async fn insert(&self, order: Order) -> Result<()>;

    /// Get an order by id.
    async fn get(&self, id: Uuid) -> Result<Option<Order>>;

    /// Compare-and-set update. `expected_version` is the version the caller
    /// read; the stored copy comes back with the version bumped.
    async fn update(&self, order: Order, expected_version: u64) -> Result<Order>;

    /// All orders currently in `status`.
    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>>;

    /// Full order history of an actor in one role.
    ///
    /// Executor history covers orders the actor executed directly and
    /// orders it worked as a hired NPC proxy, so NPCs accrue a rateable
    /// history like any other actor.
    async fn history_for(&self, actor_id: Uuid, role: Role) -> Result<Vec<Order>>;
}

/// In-memory implementation of OrderStore.
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
}

impl InMemoryOrderStore {
    /// Create a new in-memory order store.
    pub fn new() -> Self {
        Self {
            orders: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(FixerError::Internal(format!(
                "order {} already exists",
                order.id
            )));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id).cloned())
    }

    async fn update(&self, mut order: Order, expected_version: u64) -> Result<Order> {
        let mut orders = self.orders.write().await;

        let current = orders.get(&order.id).ok_or_else(|| FixerError::NotFound {
            resource: "order".to_string(),
            id: order.id.to_string(),
        })?;

        if current.version != expected_version {
            warn!(
                "order {} version conflict: expected {}, found {}",
                order.id, expected_version, current.version
            );
            return Err(FixerError::TransientFailure {
                message: format!(
                    "order {} version conflict: expected {}, found {}",
                    order.id, expected_version, current.version
                ),
            });
        }

        order.version = expected_version + 1;
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect())
    }

    async fn history_for(&self, actor_id: Uuid, role: Role) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let matches = orders.values().filter(|o| match role {
            Role::Executor => {
                o.executor_id == Some(actor_id) || o.hired_npc_id == Some(actor_id)
            }
            Role::Client => o.client_id == actor_id,
        });
        Ok(matches.cloned().collect())
    }
}

/// Trait for NPC contract persistence.
#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Insert a new contract.
    async fn insert(&self, contract: NpcContract) -> Result<()>;

    /// Get a contract by id.
    async fn get(&self, id: Uuid) -> Result<Option<NpcContract>>;

    /// The contract currently binding an NPC, if any. Expired or released
    /// contracts are filtered out here, which is what makes lazy expiry
    /// safe: nothing ever has to sweep them.
    async fn active_for_npc(&self, npc_id: Uuid, now: DateTime<Utc>) -> Result<Option<NpcContract>>;

    /// The active contract bound to an order, if any.
    async fn active_for_order(&self, order_id: Uuid, now: DateTime<Utc>)
        -> Result<Option<NpcContract>>;

    /// Release a contract. Releasing an already-released contract is a
    /// no-op, not an error.
    async fn release(&self, contract_id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

/// In-memory implementation of ContractStore.
pub struct InMemoryContractStore {
    contracts: Arc<RwLock<HashMap<Uuid, NpcContract>>>,
}

impl InMemoryContractStore {
    /// Create a new in-memory contract store.
    pub fn new() -> Self {
        Self {
            contracts: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryContractStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContractStore for InMemoryContractStore {
    async fn insert(&self, contract: NpcContract) -> Result<()> {
        let mut contracts = self.contracts.write().await;
        if contracts.contains_key(&contract.id) {
            return Err(FixerError::Internal(format!(
                "contract {} already exists",
                contract.id
            )));
        }
        contracts.insert(contract.id, contract);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<NpcContract>> {
        let contracts = self.contracts.read().await;
        Ok(contracts.get(&id).cloned())
    }

    async fn active_for_npc(
        &self,
        npc_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<NpcContract>> {
        let contracts = self.contracts.read().await;
        Ok(contracts
            .values()
            .find(|c| c.npc_id == npc_id && c.is_active(now))
            .cloned())
    }

    async fn active_for_order(
        &self,
        order_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<NpcContract>> {
        let contracts = self.contracts.read().await;
        Ok(contracts
            .values()
            .find(|c| c.order_id == order_id && c.is_active(now))
            .cloned())
    }

    async fn release(&self, contract_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut contracts = self.contracts.write().await;

        let contract = contracts
            .get_mut(&contract_id)
            .ok_or_else(|| FixerError::NotFound {
                resource: "contract".to_string(),
                id: contract_id.to_string(),
            })?;

        if contract.released_at.is_none() {
            contract.released_at = Some(at);
        }
        Ok(())
    }
}

/// Trait for the NPC roster.
#[async_trait]
pub trait NpcStore: Send + Sync {
    /// Add or replace an NPC profile.
    async fn upsert(&self, profile: NpcProfile) -> Result<()>;

    /// Get a profile by NPC id.
    async fn get(&self, npc_id: Uuid) -> Result<Option<NpcProfile>>;

    /// The full roster.
    async fn list(&self) -> Result<Vec<NpcProfile>>;

    /// Bump the NPC's lifetime job counters.
    async fn record_job(&self, npc_id: Uuid, completed: bool) -> Result<()>;
}

/// In-memory implementation of NpcStore.
pub struct InMemoryNpcStore {
    profiles: Arc<RwLock<HashMap<Uuid, NpcProfile>>>,
}

impl InMemoryNpcStore {
    /// Create a new in-memory NPC roster.
    pub fn new() -> Self {
        Self {
            profiles: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryNpcStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NpcStore for InMemoryNpcStore {
    async fn upsert(&self, profile: NpcProfile) -> Result<()> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.npc_id, profile);
        Ok(())
    }

    async fn get(&self, npc_id: Uuid) -> Result<Option<NpcProfile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(&npc_id).cloned())
    }

    async fn list(&self) -> Result<Vec<NpcProfile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.values().cloned().collect())
    }

    async fn record_job(&self, npc_id: Uuid, completed: bool) -> Result<()> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(&npc_id)
            .ok_or_else(|| FixerError::NotFound {
                resource: "npc".to_string(),
                id: npc_id.to_string(),
            })?;

        if completed {
            profile.jobs_completed += 1;
        } else {
            profile.jobs_failed += 1;
        }
        Ok(())
    }
}
