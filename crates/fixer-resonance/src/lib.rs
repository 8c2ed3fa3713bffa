//! Resonance for fixer.
//!
//! Aggregates executor reputation and social signal counters into the
//! weighted multi-dimensional trust index, for single actors and for
//! guilds as roster averages, with an optional background refresher.

pub mod aggregator;
pub mod guild;

pub use aggregator::{ResonanceAggregator, ResonanceConfig};
pub use guild::{GuildDirectory, InMemoryGuildDirectory};
