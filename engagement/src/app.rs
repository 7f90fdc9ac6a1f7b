use crate::cache::keys::KeySpace;
use crate::cache::redis_cache::RedisInteractionCache;
use crate::config::Config;
use crate::errors::EngagementError;
use crate::ledger::scylla_ledger::ScyllaLedger;
use crate::resources::resource::{RedisPool, Resource};
use crate::resources::resource_locker::ResourceLocker;
use crate::services::counter::CounterEngine;
use crate::services::reconciler::Reconciler;
use crate::services::retry::RetryPolicy;
use scylla::client::caching_session::CachingSession;
use std::sync::Arc;

pub struct App {
    pub config: Config,
    pub counter: CounterEngine,
    pub reconciler: Arc<Reconciler>,
}

impl App {
    pub async fn new() -> Result<Self, EngagementError> {
        let config = Config::load()?;

        let db_session = Arc::new(CachingSession::init_resource(&config.scylla).await?);
        let redis_pool = RedisPool::init_resource(&config.redis).await?;
        let resource_locker = Arc::new(ResourceLocker::init_resource((&redis_pool, &config.redis)).await?);

        let cache = Arc::new(RedisInteractionCache::new(
            &redis_pool,
            KeySpace::new(config.redis.key_prefix.clone()),
        ));
        let ledger = Arc::new(ScyllaLedger::new(db_session));

        let counter = CounterEngine::new(cache.clone(), RetryPolicy::from(&config.counter));
        let reconciler = Arc::new(Reconciler::new(
            cache,
            ledger,
            resource_locker,
            config.reconcile.clone(),
        ));

        Ok(Self {
            config,
            counter,
            reconciler,
        })
    }

    /// Init processes that need to be run on startup
    pub fn init(&self) {
        // init logger
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }
}

#[cfg(test)]
impl App {
    /// App over in-process cache, ledger and lock, for exercising the HTTP layer.
    pub fn in_memory() -> (
        Self,
        Arc<crate::cache::memory::MemoryCache>,
        Arc<crate::ledger::memory::MemoryLedger>,
    ) {
        let config = Config::from_toml(
            r#"
            port = 3000

            [redis]
            url = "redis://127.0.0.1:6379"

            [scylla]
            hosts = ["127.0.0.1:9042"]
            keyspace = "engagement"

            [reconcile]
            enabled = false
            lock_wait_ms = 20
            "#,
        )
        .expect("test config");

        let cache = Arc::new(crate::cache::memory::MemoryCache::default());
        let ledger = Arc::new(crate::ledger::memory::MemoryLedger::default());
        let locker = Arc::new(crate::resources::memory_lock::MemoryLock::default());

        let counter = CounterEngine::new(cache.clone(), RetryPolicy::from(&config.counter));
        let reconciler = Arc::new(Reconciler::new(
            cache.clone(),
            ledger.clone(),
            locker,
            config.reconcile.clone(),
        ));

        (
            Self {
                config,
                counter,
                reconciler,
            },
            cache,
            ledger,
        )
    }
}
