use std::time::Duration;

use deadpool::managed::{Manager, Metrics, Pool, RecycleError, RecycleResult};
use deadpool::Runtime;
use redis::aio::MultiplexedConnection;
use scylla::client::caching_session::CachingSession;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;

use crate::config::{RedisCfg, ScyllaCfg};
use crate::errors::EngagementError;
use crate::resources::resource_locker::ResourceLocker;

pub type RedisPool = Pool<RedisManager>;

/// Resource's should be alive during application runtime.
/// It's usually related to external services like db clients,
/// redis, etc.
#[allow(async_fn_in_trait)]
pub trait Resource<'a>: Sized {
    type Cfg;

    async fn init_resource(config: Self::Cfg) -> Result<Self, EngagementError>;
}

/// Hands out multiplexed connections. A connection is recycled only if it still answers
/// `PING`.
pub struct RedisManager {
    client: redis::Client,
}

impl RedisManager {
    pub fn new(url: &str) -> Result<Self, EngagementError> {
        let client = redis::Client::open(url)
            .map_err(|e| EngagementError::ConfigError(format!("Invalid redis url: {}. Error: {}", url, e)))?;

        Ok(Self { client })
    }
}

impl Manager for RedisManager {
    type Type = MultiplexedConnection;
    type Error = redis::RedisError;

    async fn create(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    async fn recycle(&self, connection: &mut MultiplexedConnection, _: &Metrics) -> RecycleResult<redis::RedisError> {
        redis::cmd("PING")
            .query_async::<()>(connection)
            .await
            .map_err(RecycleError::Backend)
    }
}

impl<'a> Resource<'a> for RedisPool {
    type Cfg = &'a RedisCfg;

    async fn init_resource(config: Self::Cfg) -> Result<Self, EngagementError> {
        let manager = RedisManager::new(&config.url)?;
        let wait_timeout = Duration::from_millis(config.wait_timeout_ms);

        Pool::builder(manager)
            .max_size(config.pool_size)
            .wait_timeout(Some(wait_timeout))
            .create_timeout(Some(wait_timeout))
            .recycle_timeout(Some(wait_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| EngagementError::ConfigError(format!("Failed to create redis pool: {}", e)))
    }
}

impl<'a> Resource<'a> for CachingSession {
    type Cfg = &'a ScyllaCfg;

    async fn init_resource(config: Self::Cfg) -> Result<Self, EngagementError> {
        let db_session: Session = SessionBuilder::new()
            .known_nodes(&config.hosts)
            .connection_timeout(Duration::from_secs(3))
            .use_keyspace(&config.keyspace, false)
            .build()
            .await
            .map_err(|e| {
                EngagementError::ConfigError(format!(
                    "Unable to connect to scylla hosts: {:?}. \nError: {}",
                    config.hosts, e
                ))
            })?;

        Ok(CachingSession::from(db_session, 1000))
    }
}

impl<'a> Resource<'a> for ResourceLocker {
    type Cfg = (&'a RedisPool, &'a RedisCfg);

    async fn init_resource((pool, config): Self::Cfg) -> Result<Self, EngagementError> {
        Ok(ResourceLocker::new(pool, &config.key_prefix, config.replicas))
    }
}
