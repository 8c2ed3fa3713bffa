//! Guild membership lookups.
//!
//! Guild internals (creation, ranks, treasury) live elsewhere; resonance
//! only needs to resolve membership, so this trait is the whole surface.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fixer_core::Result;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Read-only view of guild membership.
#[async_trait]
pub trait GuildDirectory: Send + Sync {
    /// Guild the actor belongs to, if any.
    async fn guild_of(&self, actor_id: Uuid) -> Result<Option<Uuid>>;

    /// Roster of a guild. Unknown guilds resolve to an empty roster.
    async fn members(&self, guild_id: Uuid) -> Result<Vec<Uuid>>;
}

/// In-memory implementation of GuildDirectory.
pub struct InMemoryGuildDirectory {
    rosters: Arc<RwLock<HashMap<Uuid, Vec<Uuid>>>>,
    by_actor: Arc<RwLock<HashMap<Uuid, Uuid>>>,
}

impl InMemoryGuildDirectory {
    pub fn new() -> Self {
        Self {
            rosters: Arc::new(RwLock::new(HashMap::new())),
            by_actor: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add an actor to a guild, replacing any previous membership.
    pub async fn enroll(&self, guild_id: Uuid, actor_id: Uuid) {
        let mut by_actor = self.by_actor.write().await;
        let mut rosters = self.rosters.write().await;

        if let Some(previous) = by_actor.insert(actor_id, guild_id) {
            if let Some(roster) = rosters.get_mut(&previous) {
                roster.retain(|member| *member != actor_id);
            }
        }
        rosters.entry(guild_id).or_default().push(actor_id);
    }
}

impl Default for InMemoryGuildDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GuildDirectory for InMemoryGuildDirectory {
    async fn guild_of(&self, actor_id: Uuid) -> Result<Option<Uuid>> {
        let by_actor = self.by_actor.read().await;
        Ok(by_actor.get(&actor_id).copied())
    }

    async fn members(&self, guild_id: Uuid) -> Result<Vec<Uuid>> {
        let rosters = self.rosters.read().await;
        Ok(rosters.get(&guild_id).cloned().unwrap_or_default())
    }
}
