pub mod keys;
#[cfg(test)]
pub mod memory;
pub mod redis_cache;

use crate::errors::EngagementError;
use crate::models::interaction::{InteractionKey, InteractionKind};
use async_trait::async_trait;
use charybdis::types::Uuid;
use std::collections::HashSet;

/// Dirty marker as observed by a reconciliation snapshot.
///
/// `generation` is taken from a per-domain monotonic sequence on every toggle, so a
/// marker can only be cleared by the run that observed its latest generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyEntry {
    pub key: InteractionKey,
    pub generation: u64,
}

/// Cache side of the interaction protocol.
///
/// Every method is a single atomic round trip against the cache; implementations must
/// never emulate them with read-then-write sequences in process.
#[async_trait]
pub trait InteractionCache: Send + Sync {
    /// Adds (`active = true`) or removes the user from the membership set and marks the key
    /// dirty. Returns whether membership changed.
    async fn toggle(&self, key: &InteractionKey, user_id: Uuid, active: bool) -> Result<bool, EngagementError>;

    async fn count(&self, key: &InteractionKey) -> Result<u64, EngagementError>;

    /// Counts for all keys, in order. Either every count is returned or the call fails.
    async fn counts(&self, keys: &[InteractionKey]) -> Result<Vec<u64>, EngagementError>;

    async fn is_member(&self, key: &InteractionKey, user_id: Uuid) -> Result<bool, EngagementError>;

    async fn members(&self, key: &InteractionKey) -> Result<HashSet<Uuid>, EngagementError>;

    /// Users removed from the set since its marker was last cleared. Reconciliation
    /// cancels them even if they never reached the ledger as active.
    async fn departed(&self, key: &InteractionKey) -> Result<HashSet<Uuid>, EngagementError>;

    async fn dirty_count(&self, kind: InteractionKind) -> Result<u64, EngagementError>;

    /// Up to `limit` dirty markers of the domain with their current generations.
    async fn dirty_snapshot(&self, kind: InteractionKind, limit: usize) -> Result<Vec<DirtyEntry>, EngagementError>;

    /// Removes the marker, together with the departed set of its key, only if it still
    /// carries `entry.generation`.
    async fn clear_dirty(&self, entry: &DirtyEntry) -> Result<bool, EngagementError>;
}
