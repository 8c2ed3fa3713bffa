//! # Fixer Store
//!
//! Storage traits and in-memory backends for orders, contracts,
//! scoring data, and the order event bus.

pub mod events;
pub mod orders;
pub mod scoring;

pub use events::{EventFilter, EventSubscription, OrderEventBus};
pub use orders::{
    ContractStore, InMemoryContractStore, InMemoryNpcStore, InMemoryOrderStore, NpcStore,
    OrderStore,
};
pub use scoring::{
    InMemoryMetricsStore, InMemoryPenaltyStore, InMemoryResonanceStore, InMemorySignalStore,
    MetricsStore, PenaltyStore, ResonanceStore, SignalStore,
};
