//! Order lifecycle for fixer.
//!
//! Drives orders from draft through estimation, validation, publication,
//! acceptance, and execution (direct or via a hired NPC) to a terminal
//! state, with escrow, completion bonuses, and penalty hooks along the way.

pub mod estimate;
pub mod lifecycle;
pub mod npc;
pub mod wallet;
pub mod watchdog;

pub use estimate::{CostEstimator, EstimatorConfig};
pub use lifecycle::{LifecycleConfig, OrderLifecycle};
pub use npc::{NpcContractExecutor, NpcExecutorConfig};
pub use wallet::{InMemoryWallet, Wallet};
pub use watchdog::{AcceptanceWatchdog, WatchdogConfig};

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::estimate::CostEstimator;
    pub use crate::lifecycle::OrderLifecycle;
    pub use crate::npc::NpcContractExecutor;
    pub use crate::wallet::{InMemoryWallet, Wallet};
    pub use crate::watchdog::AcceptanceWatchdog;
    pub use fixer_core::prelude::*;
}
