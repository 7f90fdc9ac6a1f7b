use crate::cache::{DirtyEntry, InteractionCache};
use crate::errors::EngagementError;
use crate::models::interaction::{InteractionKey, InteractionKind};
use async_trait::async_trait;
use charybdis::types::Uuid;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct State {
    members: HashMap<InteractionKey, HashSet<Uuid>>,
    departed: HashMap<InteractionKey, HashSet<Uuid>>,
    dirty: HashMap<InteractionKey, u64>,
    generation: u64,
}

/// In-process stand-in for Redis with the same atomicity: every operation holds the lock
/// for its whole duration.
#[derive(Default)]
pub struct MemoryCache {
    state: Mutex<State>,
    unavailable: AtomicBool,
    snapshot_delay: Mutex<Option<Duration>>,
}

impl MemoryCache {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every dirty snapshot sleeps for `delay` before reading.
    pub fn slow_snapshot(&self, delay: Duration) {
        *self.snapshot_delay.lock().unwrap() = Some(delay);
    }

    /// Synchronous toggle, used by test hooks that fire in the middle of a reconciliation.
    pub fn toggle_now(&self, key: &InteractionKey, user_id: Uuid, active: bool) -> bool {
        let mut state = self.state.lock().unwrap();
        let changed = if active {
            state.departed.entry(*key).or_default().remove(&user_id);
            state.members.entry(*key).or_default().insert(user_id)
        } else {
            let removed = state.members.entry(*key).or_default().remove(&user_id);

            if removed {
                state.departed.entry(*key).or_default().insert(user_id);
            }

            removed
        };

        state.generation += 1;
        let generation = state.generation;
        state.dirty.insert(*key, generation);

        changed
    }

    pub fn is_dirty(&self, key: &InteractionKey) -> bool {
        self.state.lock().unwrap().dirty.contains_key(key)
    }

    fn check(&self) -> Result<(), EngagementError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EngagementError::RedisError(crate::errors::RedisError::RedisError(
                redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")),
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl InteractionCache for MemoryCache {
    async fn toggle(&self, key: &InteractionKey, user_id: Uuid, active: bool) -> Result<bool, EngagementError> {
        self.check()?;

        Ok(self.toggle_now(key, user_id, active))
    }

    async fn count(&self, key: &InteractionKey) -> Result<u64, EngagementError> {
        self.check()?;
        let state = self.state.lock().unwrap();

        Ok(state.members.get(key).map_or(0, |m| m.len() as u64))
    }

    async fn counts(&self, keys: &[InteractionKey]) -> Result<Vec<u64>, EngagementError> {
        self.check()?;
        let state = self.state.lock().unwrap();

        Ok(keys
            .iter()
            .map(|key| state.members.get(key).map_or(0, |m| m.len() as u64))
            .collect())
    }

    async fn is_member(&self, key: &InteractionKey, user_id: Uuid) -> Result<bool, EngagementError> {
        self.check()?;
        let state = self.state.lock().unwrap();

        Ok(state.members.get(key).is_some_and(|m| m.contains(&user_id)))
    }

    async fn members(&self, key: &InteractionKey) -> Result<HashSet<Uuid>, EngagementError> {
        self.check()?;
        let state = self.state.lock().unwrap();

        Ok(state.members.get(key).cloned().unwrap_or_default())
    }

    async fn departed(&self, key: &InteractionKey) -> Result<HashSet<Uuid>, EngagementError> {
        self.check()?;
        let state = self.state.lock().unwrap();

        Ok(state.departed.get(key).cloned().unwrap_or_default())
    }

    async fn dirty_count(&self, kind: InteractionKind) -> Result<u64, EngagementError> {
        self.check()?;
        let state = self.state.lock().unwrap();

        Ok(state.dirty.keys().filter(|key| key.kind == kind).count() as u64)
    }

    async fn dirty_snapshot(&self, kind: InteractionKind, limit: usize) -> Result<Vec<DirtyEntry>, EngagementError> {
        let delay = *self.snapshot_delay.lock().unwrap();

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.check()?;
        let state = self.state.lock().unwrap();

        Ok(state
            .dirty
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .take(limit)
            .map(|(key, generation)| DirtyEntry {
                key: *key,
                generation: *generation,
            })
            .collect())
    }

    async fn clear_dirty(&self, entry: &DirtyEntry) -> Result<bool, EngagementError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();

        if state.dirty.get(&entry.key) == Some(&entry.generation) {
            state.dirty.remove(&entry.key);
            state.departed.remove(&entry.key);
            return Ok(true);
        }

        Ok(false)
    }
}
