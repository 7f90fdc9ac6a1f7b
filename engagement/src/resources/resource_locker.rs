use crate::cache::keys::KeySpace;
use crate::errors::EngagementError;
use crate::resources::resource::RedisPool;
use async_trait::async_trait;
use charybdis::types::Uuid;
use log::warn;
use redis::Script;
use std::time::Duration;
use tokio::time::Instant;

// KEYS[1] lock key, ARGV[1] owner token
const UNLOCK_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Proof of ownership returned by a successful acquire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockToken(pub String);

/// Cross-instance mutual exclusion keyed by resource name.
#[async_trait]
pub trait DomainLock: Send + Sync {
    /// Tries to take the lock until `wait` elapses. `None` means another holder kept it.
    async fn acquire(&self, resource: &str, ttl: Duration, wait: Duration) -> Result<Option<LockToken>, EngagementError>;

    /// Releases the lock if `token` still owns it. Returns whether it did.
    async fn release(&self, resource: &str, token: &LockToken) -> Result<bool, EngagementError>;
}

/// Resource Locker uses redis to lock resources
pub struct ResourceLocker {
    pool: RedisPool,
    keys: KeySpace,
    replicas: u8,
    unlock_script: Script,
}

impl ResourceLocker {
    const RETRY_LOCK_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new(pool: &RedisPool, key_prefix: &str, replicas: u8) -> Self {
        Self {
            pool: pool.clone(),
            keys: KeySpace::new(key_prefix),
            replicas,
            unlock_script: Script::new(UNLOCK_SCRIPT),
        }
    }

    async fn try_lock(&self, resource: &str, token: &LockToken, ttl: Duration) -> Result<bool, EngagementError> {
        let mut connection = self.pool.get().await?;

        let res: Option<String> = redis::cmd("SET")
            .arg(self.keys.lock(resource))
            .arg(&token.0)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut *connection)
            .await
            .map_err(|e| EngagementError::LockerError(format!("Failed to lock resource: {}! Error: {:?}", resource, e)))?;

        Ok(res.is_some())
    }

    /// Only relevant once redis runs with replicas; a lock that did not reach them could be
    /// lost on failover.
    async fn wait_for_write_replication(&self) -> Result<(), EngagementError> {
        if self.replicas == 0 {
            return Ok(());
        }

        let mut connection = self.pool.get().await?;

        let wait_result: redis::RedisResult<usize> = redis::cmd("WAIT")
            .arg(self.replicas) // Number of replicas to acknowledge the write.
            .arg(1000) // Timeout in milliseconds.
            .query_async(&mut *connection)
            .await;

        match wait_result {
            Ok(replicas) if replicas >= self.replicas as usize => Ok(()),
            Ok(replicas) => Err(EngagementError::LockerError(format!(
                "Lock not sufficiently replicated! Replicas: {}",
                replicas
            ))),
            Err(e) => Err(EngagementError::LockerError(format!(
                "WAIT command failed! Error: {:?}",
                e
            ))),
        }
    }
}

/// Logs a failed release and keeps the error that triggered it. An unreleased lock still
/// expires with its TTL.
fn keep_original_error(
    resource: &str,
    original: EngagementError,
    released: Result<bool, EngagementError>,
) -> EngagementError {
    if let Err(e) = released {
        warn!("[acquire::{}] release after failed replication also failed: {}", resource, e);
    }

    original
}

#[async_trait]
impl DomainLock for ResourceLocker {
    async fn acquire(&self, resource: &str, ttl: Duration, wait: Duration) -> Result<Option<LockToken>, EngagementError> {
        let token = LockToken(Uuid::new_v4().to_string());
        let deadline = Instant::now() + wait;

        loop {
            if self.try_lock(resource, &token, ttl).await? {
                if let Err(e) = self.wait_for_write_replication().await {
                    let released = self.release(resource, &token).await;

                    return Err(keep_original_error(resource, e, released));
                }

                return Ok(Some(token));
            }

            if Instant::now() + Self::RETRY_LOCK_INTERVAL > deadline {
                return Ok(None);
            }

            tokio::time::sleep(Self::RETRY_LOCK_INTERVAL).await;
        }
    }

    async fn release(&self, resource: &str, token: &LockToken) -> Result<bool, EngagementError> {
        let mut connection = self.pool.get().await?;

        let released: i64 = self
            .unlock_script
            .key(self.keys.lock(resource))
            .arg(&token.0)
            .invoke_async(&mut *connection)
            .await
            .map_err(|e| EngagementError::LockerError(format!("Failed to unlock resource: {}! Error: {:?}", resource, e)))?;

        Ok(released == 1)
    }
}
