//! Scheduler configuration.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StokerError, StokerResult};

/// Top-level configuration mapping (see EXTERNAL INTERFACES).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StokerConfig {
    /// Namespace segment in all keys.
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Cap on concurrent units per master. Clamped to the default when `<= 0`.
    #[serde(default = "default_max_fork")]
    pub max_fork: i64,

    /// Jobs handled by one unit before voluntary exit. Clamped to the default
    /// when `<= 0`.
    #[serde(default = "default_max_exec")]
    pub max_exec: i64,

    /// Length bound on the success log. Clamped to the default when `<= 0`.
    #[serde(default = "default_max_hist")]
    pub max_hist: i64,

    /// Redis connection settings.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Liveness TTL for the master and worker keys, in seconds.
    #[serde(default = "default_wait_scan_secs")]
    pub wait_scan_secs: u64,

    /// Master's sleep between empty polls, in seconds.
    #[serde(default = "default_wait_idle_secs")]
    pub wait_idle_secs: u64,
}

impl Default for StokerConfig {
    fn default() -> Self {
        Self {
            queue_name: default_queue_name(),
            max_fork: default_max_fork(),
            max_exec: default_max_exec(),
            max_hist: default_max_hist(),
            redis: RedisConfig::default(),
            wait_scan_secs: default_wait_scan_secs(),
            wait_idle_secs: default_wait_idle_secs(),
        }
    }
}

impl StokerConfig {
    /// `max_fork`, clamped to the default (10) when non-positive.
    pub fn max_fork(&self) -> u32 {
        clamp_positive(self.max_fork, 10)
    }

    /// `max_exec`, clamped to the default (1000) when non-positive.
    pub fn max_exec(&self) -> u32 {
        clamp_positive(self.max_exec, 1000)
    }

    /// `max_hist`, clamped to the default (2000) when non-positive.
    pub fn max_hist(&self) -> u32 {
        clamp_positive(self.max_hist, 2000)
    }

    /// `group`, normalized per the Producer's normalization rule.
    pub fn normalize_group(group: &str) -> String {
        if group.is_empty() {
            "main".to_string()
        } else {
            group.to_string()
        }
    }

    pub fn wait_scan(&self) -> Duration {
        Duration::from_secs(self.wait_scan_secs)
    }

    pub fn wait_idle(&self) -> Duration {
        Duration::from_secs(self.wait_idle_secs)
    }

    /// Half of `wait_scan`, used as the BRPOP idle time for units and the
    /// master's own probe.
    pub fn idle_time(&self) -> Duration {
        Duration::from_secs(self.wait_scan_secs / 2)
    }

    /// Loads configuration from `<config_dir>/default.toml` plus an optional
    /// `<config_dir>/local.toml` overlay, then an `STOKER_` environment
    /// overlay (`STOKER_REDIS__URL` sets `redis.url`, etc). Calls
    /// `dotenvy::dotenv()` first so a local `.env` can seed those variables.
    pub fn load(config_dir: impl AsRef<Path>) -> StokerResult<Self> {
        if let Err(err) = dotenvy::dotenv() {
            debug!(%err, "no .env file found");
        }
        let config_dir = config_dir.as_ref();

        let mut builder = Config::builder();
        let default_path = config_dir.join("default.toml");
        if default_path.exists() {
            builder = builder.add_source(File::from(default_path).required(false));
        }
        let local_path = config_dir.join("local.toml");
        if local_path.exists() {
            builder = builder.add_source(File::from(local_path).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix("STOKER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| StokerError::InvalidArgument(e.to_string()))?;
        config
            .try_deserialize()
            .map_err(|e| StokerError::InvalidArgument(e.to_string()))
    }

    /// `load("./config")`.
    pub fn load_default() -> StokerResult<Self> {
        Self::load("./config")
    }
}

fn clamp_positive(value: i64, default: u32) -> u32 {
    if value <= 0 {
        default
    } else {
        value as u32
    }
}

fn default_queue_name() -> String {
    "main".to_string()
}

fn default_max_fork() -> i64 {
    10
}

fn default_max_exec() -> i64 {
    1000
}

fn default_max_hist() -> i64 {
    2000
}

fn default_wait_scan_secs() -> u64 {
    60
}

fn default_wait_idle_secs() -> u64 {
    3
}

/// Redis connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,

    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_pool_size(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl RedisConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_pool_size() -> usize {
    4
}

fn default_connect_timeout() -> u64 {
    5
}
