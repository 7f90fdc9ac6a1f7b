use crate::errors::EngagementError;
use crate::resources::resource_locker::{DomainLock, LockToken};
use async_trait::async_trait;
use charybdis::types::Uuid;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
pub struct MemoryLock {
    held: Mutex<HashMap<String, (LockToken, Instant)>>,
}

impl MemoryLock {
    fn try_lock(&self, resource: &str, ttl: Duration) -> Option<LockToken> {
        let mut held = self.held.lock().unwrap();
        let now = Instant::now();

        match held.get(resource) {
            Some((_, expires_at)) if *expires_at > now => None,
            _ => {
                let token = LockToken(Uuid::new_v4().to_string());
                held.insert(resource.to_string(), (token.clone(), now + ttl));

                Some(token)
            }
        }
    }
}

#[async_trait]
impl DomainLock for MemoryLock {
    async fn acquire(&self, resource: &str, ttl: Duration, wait: Duration) -> Result<Option<LockToken>, EngagementError> {
        let deadline = Instant::now() + wait;

        loop {
            if let Some(token) = self.try_lock(resource, ttl) {
                return Ok(Some(token));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn release(&self, resource: &str, token: &LockToken) -> Result<bool, EngagementError> {
        let mut held = self.held.lock().unwrap();

        if held.get(resource).is_some_and(|(owner, _)| owner == token) {
            held.remove(resource);
            return Ok(true);
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_holder_waits_then_gives_up() {
        let lock = MemoryLock::default();
        let ttl = Duration::from_secs(60);

        let first = lock.acquire("reconcile:like", ttl, Duration::ZERO).await.unwrap();
        assert!(first.is_some());

        let second = lock
            .acquire("reconcile:like", ttl, Duration::from_millis(30))
            .await
            .unwrap();
        assert!(second.is_none());

        assert!(lock.release("reconcile:like", &first.unwrap()).await.unwrap());
        assert!(lock.acquire("reconcile:like", ttl, Duration::ZERO).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stale_token_cannot_release_a_newer_holder() {
        let lock = MemoryLock::default();

        let stale = lock
            .acquire("reconcile:follow", Duration::from_millis(1), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let current = lock
            .acquire("reconcile:follow", Duration::from_secs(60), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();

        assert!(!lock.release("reconcile:follow", &stale).await.unwrap());
        assert!(lock.release("reconcile:follow", &current).await.unwrap());
    }
}
