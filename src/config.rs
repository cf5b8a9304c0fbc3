use crate::error::{PixelError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Server configuration.
///
/// Every field has a default, so a partial JSON file (or none at all) is valid.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// SQLite database file backing the durable store.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Buffered delta events per viewer before it is considered lagging.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    /// Size of one cell in degrees.
    #[serde(default = "default_grid_step")]
    pub grid_step: f64,
    /// Reject paint/erase keys that are not `"<int>,<int>"`.
    #[serde(default)]
    pub validate_keys: bool,
    #[serde(default = "default_persist_max_retries")]
    pub persist_max_retries: u32,
    #[serde(default = "default_persist_retry_backoff_ms")]
    pub persist_retry_backoff_ms: u64,
    /// Durable writes waiting for the worker; further jobs are dropped and counted.
    #[serde(default = "default_persist_queue_capacity")]
    pub persist_queue_capacity: usize,
    /// Chat events waiting for one viewer; further events to it are dropped.
    #[serde(default = "default_session_queue_capacity")]
    pub session_queue_capacity: usize,
    /// WebSocket ping interval.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_alliance_color")]
    pub default_alliance_color: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_database_path() -> PathBuf {
    PathBuf::from("pixelwar.sqlite3")
}

fn default_broadcast_capacity() -> usize {
    1024
}

fn default_grid_step() -> f64 {
    0.05
}

fn default_persist_max_retries() -> u32 {
    2
}

fn default_persist_retry_backoff_ms() -> u64 {
    100
}

fn default_persist_queue_capacity() -> usize {
    65_536
}

fn default_session_queue_capacity() -> usize {
    256
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_alliance_color() -> String {
    "#FFFFFF".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            database_path: default_database_path(),
            broadcast_capacity: default_broadcast_capacity(),
            grid_step: default_grid_step(),
            validate_keys: false,
            persist_max_retries: default_persist_max_retries(),
            persist_retry_backoff_ms: default_persist_retry_backoff_ms(),
            persist_queue_capacity: default_persist_queue_capacity(),
            session_queue_capacity: default_session_queue_capacity(),
            heartbeat_secs: default_heartbeat_secs(),
            default_alliance_color: default_alliance_color(),
        }
    }
}

impl ServerConfig {
    /// Load config from a JSON file. A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        if !fs::try_exists(path).await? {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await?;
        let config: ServerConfig = serde_json::from_str(&content)
            .map_err(|e| PixelError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Apply `PORT`, `PIXELWAR_BIND` and `DATABASE_PATH` overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| PixelError::Config(format!("invalid PORT: {}", port)))?;
        }
        if let Some(bind) = lookup("PIXELWAR_BIND") {
            self.bind_addr = bind;
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.broadcast_capacity == 0 {
            return Err(PixelError::Config("broadcast_capacity must be > 0".into()));
        }
        if self.persist_queue_capacity == 0 || self.session_queue_capacity == 0 {
            return Err(PixelError::Config("queue capacities must be > 0".into()));
        }
        if !(self.grid_step.is_finite() && self.grid_step > 0.0) {
            return Err(PixelError::Config("grid_step must be positive".into()));
        }
        if self.heartbeat_secs == 0 {
            return Err(PixelError::Config("heartbeat_secs must be > 0".into()));
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|e| PixelError::Config(format!("invalid bind address: {}", e)))
    }

    #[must_use]
    pub fn persist_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.persist_retry_backoff_ms)
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}
