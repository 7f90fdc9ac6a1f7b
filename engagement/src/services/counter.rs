use crate::cache::InteractionCache;
use crate::errors::EngagementError;
use crate::models::interaction::{InteractionKey, InteractionKind, TargetKind};
use crate::services::retry::{with_retry, with_timeout, RetryPolicy};
use charybdis::types::Uuid;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Real-time interaction state, served straight from the cache.
///
/// Toggles are bounded by the request timeout but never retried: a retry after an
/// ambiguous failure could report `false` for a change the first attempt applied.
/// Reads are idempotent and go through [`with_retry`].
#[derive(Clone)]
pub struct CounterEngine {
    cache: Arc<dyn InteractionCache>,
    policy: RetryPolicy,
}

impl CounterEngine {
    pub fn new(cache: Arc<dyn InteractionCache>, policy: RetryPolicy) -> Self {
        Self { cache, policy }
    }

    /// Returns `true` if the user was not active before this call.
    pub async fn toggle_on(&self, key: &InteractionKey, user_id: Uuid) -> Result<bool, EngagementError> {
        let changed = with_timeout(self.policy.timeout, "toggle_on", self.cache.toggle(key, user_id, true)).await?;
        debug!("[toggle_on] {} {}:{} by {} changed={}", key.kind, key.target_kind, key.target_id, user_id, changed);

        Ok(changed)
    }

    /// Returns `true` if the user was active before this call.
    pub async fn toggle_off(&self, key: &InteractionKey, user_id: Uuid) -> Result<bool, EngagementError> {
        let changed = with_timeout(self.policy.timeout, "toggle_off", self.cache.toggle(key, user_id, false)).await?;
        debug!("[toggle_off] {} {}:{} by {} changed={}", key.kind, key.target_kind, key.target_id, user_id, changed);

        Ok(changed)
    }

    pub async fn count(&self, key: &InteractionKey) -> Result<u64, EngagementError> {
        let cache = &self.cache;

        with_retry(&self.policy, "count", || cache.count(key)).await
    }

    pub async fn is_active(&self, key: &InteractionKey, user_id: Uuid) -> Result<bool, EngagementError> {
        let cache = &self.cache;

        with_retry(&self.policy, "is_active", || cache.is_member(key, user_id)).await
    }

    pub async fn members(&self, key: &InteractionKey) -> Result<HashSet<Uuid>, EngagementError> {
        let cache = &self.cache;

        with_retry(&self.policy, "members", || cache.members(key)).await
    }

    /// Counts for every requested target in one round trip. Fails as a whole rather than
    /// returning a partial map.
    pub async fn count_batch(
        &self,
        kind: InteractionKind,
        target_kind: TargetKind,
        target_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, u64>, EngagementError> {
        let mut seen = HashSet::with_capacity(target_ids.len());
        let keys = target_ids
            .iter()
            .filter(|id| seen.insert(**id))
            .map(|id| InteractionKey::new(kind, target_kind, *id))
            .collect::<Result<Vec<_>, _>>()?;

        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let cache = &self.cache;
        let keys_ref = &keys;
        let counts = with_retry(&self.policy, "count_batch", || cache.counts(keys_ref)).await?;

        Ok(keys.iter().map(|key| key.target_id).zip(counts).collect())
    }

    /// Dirty keys of the domain still waiting for reconciliation.
    pub async fn pending(&self, kind: InteractionKind) -> Result<u64, EngagementError> {
        let cache = &self.cache;

        with_retry(&self.policy, "pending", || cache.dirty_count(kind)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryCache;
    use std::time::Duration;

    fn engine() -> (CounterEngine, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::default());
        let policy = RetryPolicy {
            timeout: Duration::from_millis(100),
            attempts: 1,
            delay: Duration::from_millis(1),
            exponential_backoff: false,
        };

        (CounterEngine::new(cache.clone(), policy), cache)
    }

    fn video_like() -> InteractionKey {
        InteractionKey::new(InteractionKind::Like, TargetKind::Video, Uuid::new_v4()).unwrap()
    }

    #[tokio::test]
    async fn toggles_are_idempotent() {
        let (engine, _) = engine();
        let key = video_like();
        let user = Uuid::new_v4();

        assert!(engine.toggle_on(&key, user).await.unwrap());
        assert!(!engine.toggle_on(&key, user).await.unwrap());
        assert!(engine.toggle_off(&key, user).await.unwrap());
        assert!(!engine.toggle_off(&key, user).await.unwrap());
    }

    #[tokio::test]
    async fn count_follows_membership() {
        let (engine, _) = engine();
        let key = video_like();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(engine.count(&key).await.unwrap(), 0);

        assert!(engine.toggle_on(&key, a).await.unwrap());
        assert!(engine.toggle_on(&key, b).await.unwrap());
        assert!(!engine.toggle_on(&key, a).await.unwrap());
        assert_eq!(engine.count(&key).await.unwrap(), 2);

        assert!(engine.toggle_off(&key, a).await.unwrap());
        assert_eq!(engine.count(&key).await.unwrap(), 1);

        assert!(!engine.is_active(&key, a).await.unwrap());
        assert!(engine.is_active(&key, b).await.unwrap());
        assert_eq!(engine.members(&key).await.unwrap(), HashSet::from([b]));
    }

    #[tokio::test]
    async fn every_toggle_marks_the_key_dirty() {
        let (engine, cache) = engine();
        let key = video_like();
        let user = Uuid::new_v4();

        assert!(!engine.toggle_off(&key, user).await.unwrap());
        assert!(cache.is_dirty(&key));
        assert_eq!(engine.pending(InteractionKind::Like).await.unwrap(), 1);
        assert_eq!(engine.pending(InteractionKind::Follow).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn batch_counts_cover_every_requested_target() {
        let (engine, _) = engine();
        let liked = video_like();
        let untouched = Uuid::new_v4();

        engine.toggle_on(&liked, Uuid::new_v4()).await.unwrap();
        engine.toggle_on(&liked, Uuid::new_v4()).await.unwrap();

        let counts = engine
            .count_batch(
                InteractionKind::Like,
                TargetKind::Video,
                &[liked.target_id, untouched, liked.target_id],
            )
            .await
            .unwrap();

        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&liked.target_id], 2);
        assert_eq!(counts[&untouched], 0);
    }

    #[tokio::test]
    async fn unavailable_cache_fails_instead_of_reporting_zero() {
        let (engine, cache) = engine();
        let key = video_like();
        engine.toggle_on(&key, Uuid::new_v4()).await.unwrap();

        cache.set_unavailable(true);

        let count = engine.count(&key).await;
        assert!(matches!(&count, Err(e) if e.is_retryable()));

        let batch = engine
            .count_batch(InteractionKind::Like, TargetKind::Video, &[key.target_id, Uuid::new_v4()])
            .await;
        assert!(batch.is_err());

        assert!(engine.toggle_on(&key, Uuid::new_v4()).await.is_err());

        cache.set_unavailable(false);
        assert_eq!(engine.count(&key).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn batch_rejects_invalid_target_kind() {
        let (engine, _) = engine();

        let res = engine
            .count_batch(InteractionKind::Follow, TargetKind::Note, &[Uuid::new_v4()])
            .await;

        assert!(matches!(res, Err(EngagementError::ValidationError(_))));
    }
}
