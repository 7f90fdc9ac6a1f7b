use crate::constants::MAX_PARALLEL_REQUESTS;
use crate::errors::EngagementError;
use serde::Deserialize;
use std::time::Duration;
use std::{env, fs};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub port: u16,
    pub redis: RedisCfg,
    pub scylla: ScyllaCfg,
    #[serde(default)]
    pub counter: CounterCfg,
    #[serde(default)]
    pub reconcile: ReconcileCfg,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RedisCfg {
    pub url: String,
    #[serde(default = "RedisCfg::default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "RedisCfg::default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "RedisCfg::default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    /// Replicas that must acknowledge a lock write. Zero skips `WAIT`.
    #[serde(default)]
    pub replicas: u8,
}

impl RedisCfg {
    fn default_key_prefix() -> String {
        "engagement".to_string()
    }

    fn default_pool_size() -> usize {
        32
    }

    fn default_wait_timeout_ms() -> u64 {
        1000
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScyllaCfg {
    pub hosts: Vec<String>,
    pub keyspace: String,
}

/// Request path settings for toggles and queries.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CounterCfg {
    pub request_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub exponential_backoff: bool,
}

impl Default for CounterCfg {
    fn default() -> Self {
        Self {
            request_timeout_ms: 500,
            retry_attempts: 2,
            retry_delay_ms: 50,
            exponential_backoff: true,
        }
    }
}

impl CounterCfg {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ReconcileCfg {
    /// Run the in-process interval task. Disable when an external scheduler calls the
    /// job handlers instead.
    pub enabled: bool,
    pub interval_secs: u64,
    pub lock_ttl_ms: u64,
    pub lock_wait_ms: u64,
    pub batch_size: usize,
    pub parallelism: usize,
    pub run_timeout_ms: u64,
}

impl Default for ReconcileCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5 * 60,
            lock_ttl_ms: 1000 * 60 * 5,
            lock_wait_ms: 2000,
            batch_size: 1000,
            parallelism: MAX_PARALLEL_REQUESTS,
            run_timeout_ms: 1000 * 60 * 4,
        }
    }
}

impl ReconcileCfg {
    /// Headroom between the end of a run's deadline and the lock expiry, covering the
    /// release round trip and writes still in flight when the deadline hits.
    pub const LOCK_TTL_MARGIN: Duration = Duration::from_secs(5);

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}

impl Config {
    /// Reads `config.{ENV}.toml` from the working directory.
    pub fn load() -> Result<Self, EngagementError> {
        dotenv::dotenv().ok();

        let env = env::var("ENV").map_err(|_| EngagementError::ConfigError("ENV must be set".to_string()))?;
        let config_file = format!("config.{}.toml", env);
        let contents = fs::read_to_string(&config_file)
            .map_err(|e| EngagementError::ConfigError(format!("Unable to read {}: {}", config_file, e)))?;

        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, EngagementError> {
        let config: Config = toml::from_str(contents)?;

        if config.reconcile.lock_ttl() < config.reconcile.run_timeout() + ReconcileCfg::LOCK_TTL_MARGIN {
            return Err(EngagementError::ConfigError(format!(
                "reconcile.lock_ttl_ms must exceed reconcile.run_timeout_ms by at least {:?}",
                ReconcileCfg::LOCK_TTL_MARGIN
            )));
        }

        if config.reconcile.batch_size == 0 {
            return Err(EngagementError::ConfigError(
                "reconcile.batch_size must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}
