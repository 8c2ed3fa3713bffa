//! Wallet boundary to the economy service.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fixer_core::{Eurodollars, FixerError, Result};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Trait for the external economy service.
///
/// Every call is a fallible remote operation; a failure aborts the
/// lifecycle transition that triggered it.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Deduct an amount from an actor's balance.
    async fn charge(&self, actor_id: Uuid, amount: Eurodollars, memo: &str) -> Result<()>;

    /// Add an amount to an actor's balance.
    async fn credit(&self, actor_id: Uuid, amount: Eurodollars, memo: &str) -> Result<()>;

    /// Return previously charged funds to an actor.
    async fn refund(&self, actor_id: Uuid, amount: Eurodollars, memo: &str) -> Result<()>;
}

/// In-memory balance-keeping wallet for tests and local runs.
pub struct InMemoryWallet {
    balances: Arc<RwLock<HashMap<Uuid, Eurodollars>>>,
}

impl InMemoryWallet {
    /// Create a wallet with no balances.
    pub fn new() -> Self {
        Self {
            balances: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seed an actor's balance.
    pub async fn deposit(&self, actor_id: Uuid, amount: Eurodollars) {
        let mut balances = self.balances.write().await;
        let balance = balances.entry(actor_id).or_insert_with(Eurodollars::zero);
        *balance = *balance + amount;
    }

    /// Current balance of an actor.
    pub async fn balance(&self, actor_id: Uuid) -> Eurodollars {
        let balances = self.balances.read().await;
        balances.get(&actor_id).copied().unwrap_or_else(Eurodollars::zero)
    }
}

impl Default for InMemoryWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Wallet for InMemoryWallet {
    async fn charge(&self, actor_id: Uuid, amount: Eurodollars, memo: &str) -> Result<()> {
        let mut balances = self.balances.write().await;
        let balance = balances.entry(actor_id).or_insert_with(Eurodollars::zero);

        if *balance < amount {
            return Err(FixerError::PaymentFailed {
                actor_id,
                amount,
                message: format!("insufficient funds, balance {}", balance),
            });
        }

        *balance = *balance - amount;
        debug!("charged {} from actor {} ({})", amount, actor_id, memo);
        Ok(())
    }

    async fn credit(&self, actor_id: Uuid, amount: Eurodollars, memo: &str) -> Result<()> {
        let mut balances = self.balances.write().await;
        let balance = balances.entry(actor_id).or_insert_with(Eurodollars::zero);
        *balance = *balance + amount;
        debug!("credited {} to actor {} ({})", amount, actor_id, memo);
        Ok(())
    }

    async fn refund(&self, actor_id: Uuid, amount: Eurodollars, memo: &str) -> Result<()> {
        self.credit(actor_id, amount, memo).await
    }
}
