use crate::cache::keys::KeySpace;
use crate::cache::{DirtyEntry, InteractionCache};
use crate::errors::EngagementError;
use crate::models::interaction::{InteractionKey, InteractionKind};
use crate::resources::resource::RedisPool;
use async_trait::async_trait;
use charybdis::types::Uuid;
use log::warn;
use redis::{AsyncCommands, Script};
use std::collections::{HashMap, HashSet};

// KEYS[1] membership set, KEYS[2] departed set, KEYS[3] dirty hash, KEYS[4] generation sequence
// ARGV[1] user id, ARGV[2] "1" to add / "0" to remove, ARGV[3] dirty field
const TOGGLE_SCRIPT: &str = r#"
local changed
if ARGV[2] == '1' then
    changed = redis.call('SADD', KEYS[1], ARGV[1])
    redis.call('SREM', KEYS[2], ARGV[1])
else
    changed = redis.call('SREM', KEYS[1], ARGV[1])
    if changed == 1 then
        redis.call('SADD', KEYS[2], ARGV[1])
    end
end
local generation = redis.call('INCR', KEYS[4])
redis.call('HSET', KEYS[3], ARGV[3], generation)
return changed
"#;

// KEYS[1] dirty hash, KEYS[2] departed set
// ARGV[1] dirty field, ARGV[2] generation seen by the snapshot
const CLEAR_DIRTY_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[1], ARGV[1]) == ARGV[2] then
    redis.call('DEL', KEYS[2])
    return redis.call('HDEL', KEYS[1], ARGV[1])
end
return 0
"#;

/// [`InteractionCache`] over Redis. Toggles and compare-and-clear run as Lua scripts so
/// membership, departed users, dirty marker and generation change together.
pub struct RedisInteractionCache {
    pool: RedisPool,
    keys: KeySpace,
    toggle_script: Script,
    clear_dirty_script: Script,
}

impl RedisInteractionCache {
    pub fn new(pool: &RedisPool, keys: KeySpace) -> Self {
        Self {
            pool: pool.clone(),
            keys,
            toggle_script: Script::new(TOGGLE_SCRIPT),
            clear_dirty_script: Script::new(CLEAR_DIRTY_SCRIPT),
        }
    }

    async fn user_set(&self, set_key: String) -> Result<HashSet<Uuid>, EngagementError> {
        let mut connection = self.pool.get().await?;
        let raw: HashSet<String> = connection.smembers(&set_key).await?;

        raw.iter()
            .map(|member| {
                Uuid::parse_str(member).map_err(|e| {
                    EngagementError::InternalServerError(format!("Invalid member {} in {}: {}", member, set_key, e))
                })
            })
            .collect()
    }
}

#[async_trait]
impl InteractionCache for RedisInteractionCache {
    async fn toggle(&self, key: &InteractionKey, user_id: Uuid, active: bool) -> Result<bool, EngagementError> {
        let mut connection = self.pool.get().await?;

        let changed: i64 = self
            .toggle_script
            .key(self.keys.membership(key))
            .key(self.keys.departed(key))
            .key(self.keys.dirty(key.kind))
            .key(self.keys.generation(key.kind))
            .arg(user_id.to_string())
            .arg(if active { "1" } else { "0" })
            .arg(KeySpace::dirty_field(key))
            .invoke_async(&mut *connection)
            .await?;

        Ok(changed == 1)
    }

    async fn count(&self, key: &InteractionKey) -> Result<u64, EngagementError> {
        let mut connection = self.pool.get().await?;
        let count: u64 = connection.scard(self.keys.membership(key)).await?;

        Ok(count)
    }

    async fn counts(&self, keys: &[InteractionKey]) -> Result<Vec<u64>, EngagementError> {
        if keys.is_empty() {
            return Ok(vec![]);
        }

        let mut connection = self.pool.get().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();

        for key in keys {
            pipe.scard(self.keys.membership(key));
        }

        let counts: Vec<u64> = pipe.query_async(&mut *connection).await?;

        if counts.len() != keys.len() {
            return Err(EngagementError::InternalServerError(format!(
                "Batch count returned {} results for {} keys",
                counts.len(),
                keys.len()
            )));
        }

        Ok(counts)
    }

    async fn is_member(&self, key: &InteractionKey, user_id: Uuid) -> Result<bool, EngagementError> {
        let mut connection = self.pool.get().await?;
        let is_member: bool = connection
            .sismember(self.keys.membership(key), user_id.to_string())
            .await?;

        Ok(is_member)
    }

    async fn members(&self, key: &InteractionKey) -> Result<HashSet<Uuid>, EngagementError> {
        self.user_set(self.keys.membership(key)).await
    }

    async fn departed(&self, key: &InteractionKey) -> Result<HashSet<Uuid>, EngagementError> {
        self.user_set(self.keys.departed(key)).await
    }

    async fn dirty_count(&self, kind: InteractionKind) -> Result<u64, EngagementError> {
        let mut connection = self.pool.get().await?;
        let count: u64 = connection.hlen(self.keys.dirty(kind)).await?;

        Ok(count)
    }

    async fn dirty_snapshot(&self, kind: InteractionKind, limit: usize) -> Result<Vec<DirtyEntry>, EngagementError> {
        let mut connection = self.pool.get().await?;
        let dirty_key = self.keys.dirty(kind);
        let cursor_key = self.keys.scan_cursor(kind);
        let mut snapshot: HashMap<InteractionKey, u64> = HashMap::new();

        let start: Option<u64> = connection.get(&cursor_key).await?;
        let mut scan = ScanCursor::resume(start.unwrap_or(0));

        loop {
            let (next, flat): (u64, Vec<String>) = redis::cmd("HSCAN")
                .arg(&dirty_key)
                .arg(scan.position())
                .arg("COUNT")
                .arg(limit)
                .query_async(&mut *connection)
                .await?;

            for pair in flat.chunks(2) {
                let [field, generation] = pair else { continue };

                match (KeySpace::parse_dirty_field(kind, field), generation.parse::<u64>()) {
                    (Some(key), Ok(generation)) => {
                        snapshot.insert(key, generation);
                    }
                    _ => warn!("[dirty_snapshot::{}] skipping malformed marker {}={}", kind, field, generation),
                }
            }

            if !scan.advance(next) || snapshot.len() >= limit {
                break;
            }
        }

        let _: () = connection.set(&cursor_key, scan.position()).await?;

        Ok(snapshot
            .into_iter()
            .take(limit)
            .map(|(key, generation)| DirtyEntry { key, generation })
            .collect())
    }

    async fn clear_dirty(&self, entry: &DirtyEntry) -> Result<bool, EngagementError> {
        let mut connection = self.pool.get().await?;

        let cleared: i64 = self
            .clear_dirty_script
            .key(self.keys.dirty(entry.key.kind))
            .key(self.keys.departed(&entry.key))
            .arg(KeySpace::dirty_field(&entry.key))
            .arg(entry.generation.to_string())
            .invoke_async(&mut *connection)
            .await?;

        Ok(cleared == 1)
    }
}

/// HSCAN position carried across runs, so a run that stops at the batch limit leaves
/// the next run to pick up the rest of the hash instead of rescanning its head.
#[derive(Debug)]
struct ScanCursor {
    position: u64,
    wrapped: bool,
}

impl ScanCursor {
    fn resume(position: u64) -> Self {
        Self {
            position,
            wrapped: position == 0,
        }
    }

    fn position(&self) -> u64 {
        self.position
    }

    /// Moves to the cursor HSCAN returned. A scan resumed mid-hash wraps to the head once;
    /// returns false when the hash has been walked to the end after that.
    fn advance(&mut self, next: u64) -> bool {
        self.position = next;

        if next != 0 {
            return true;
        }

        if self.wrapped {
            return false;
        }

        self.wrapped = true;
        true
    }
}
