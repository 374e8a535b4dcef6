//! Process configuration: loaded from an optional TOML file, overridable by
//! environment variables, with defaults that let the binary boot with zero
//! external configuration for local testing.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DfsError, DfsResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub shards: ShardConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind address, e.g. `127.0.0.1:8080`.
    pub listen_address: String,
    /// Root directory under which the reference filesystem backends live,
    /// one subdirectory per logical location.
    pub backend_root: PathBuf,
    /// Path to the SQLite metadata database file.
    pub database_path: PathBuf,
    /// Per-call deadline for backend operations, in seconds.
    pub per_call_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardConfig {
    /// Number of data shards. Fixed at 4 for v1; spelled out as a tunable.
    pub data_shards: usize,
    /// Number of parity shards. Fixed at 2 for v1.
    pub parity_shards: usize,
    /// Worker pool size for fan-out; defaults to `data_shards + parity_shards`.
    pub worker_pool_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_address: "127.0.0.1:8080".to_string(),
                backend_root: PathBuf::from("./data/backends"),
                database_path: PathBuf::from("./data/shardmesh.sqlite3"),
                per_call_timeout_secs: 10,
            },
            shards: ShardConfig {
                data_shards: crate::codec::DATA_SHARDS,
                parity_shards: crate::codec::PARITY_SHARDS,
                worker_pool_size: crate::codec::TOTAL_SHARDS,
            },
            auth: AuthConfig {
                jwt_secret: std::env::var("SHARDMESH_JWT_SECRET").unwrap_or_else(|_| {
                    tracing::warn!("SHARDMESH_JWT_SECRET not set; using an insecure development default");
                    "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION".to_string()
                }),
                jwt_ttl_secs: 24 * 3600,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from `config_path` if it exists, falling back to
    /// defaults otherwise.
    pub fn load_or_default(config_path: Option<PathBuf>) -> DfsResult<Self> {
        if let Some(path) = config_path {
            if path.exists() {
                let config_str = std::fs::read_to_string(&path)?;
                let config: Config = toml::from_str(&config_str)
                    .map_err(|e| DfsError::Config(format!("config parse error: {e}")))?;
                tracing::info!(path = %path.display(), "loaded configuration");
                return Ok(config);
            }
        }
        tracing::info!("using default configuration");
        Ok(Config::default())
    }

    pub fn save(&self, config_path: &PathBuf) -> DfsResult<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| DfsError::Config(format!("config serialize error: {e}")))?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(config_path, config_str)?;
        Ok(())
    }

    pub fn per_call_timeout(&self) -> Duration {
        Duration::from_secs(self.server.per_call_timeout_secs)
    }
}
