//! Backend adapter abstraction: one logical storage location per adapter.
//!
//! All operations are blocking from the adapter's point of view; the
//! orchestrator supplies its own parallelism and per-call timeouts. Adapters
//! never verify digests — that is the orchestrator's job.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("shard not found")]
    NotFound,
    #[error("transient backend failure: {0}")]
    Transient(String),
    #[error("permanent backend failure: {0}")]
    Permanent(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// A single logical storage location. Names are flat (no paths) and chosen
/// by the orchestrator, never by the adapter.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Create-or-overwrite `shard_name` with `bytes`. Durable before return.
    async fn put(&self, shard_name: &str, bytes: &[u8]) -> BackendResult<()>;

    /// Fetch the exact bytes last written under `shard_name`.
    async fn get(&self, shard_name: &str) -> BackendResult<Vec<u8>>;

    /// Probe for presence without fetching bytes.
    async fn exists(&self, shard_name: &str) -> BackendResult<bool>;

    /// Remove `shard_name`. Idempotent: absence is success.
    async fn delete(&self, shard_name: &str) -> BackendResult<()>;
}

/// Reference adapter: one directory root per logical location on the local
/// filesystem. Suitable for tests, demos, and single-host deployments; a
/// networked object-storage adapter implements the same trait.
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    pub async fn new(root: impl Into<PathBuf>) -> BackendResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| BackendError::Permanent(e.to_string()))?;
        Ok(Self { root })
    }

    /// Names are supposed to arrive flat (§4.2), but this is the last line
    /// of defense against a shard name smuggling a path separator or `..`
    /// segment out of `root`.
    fn path_for(&self, shard_name: &str) -> BackendResult<PathBuf> {
        if shard_name.is_empty() {
            return Err(BackendError::Permanent("shard name must not be empty".to_string()));
        }
        if shard_name.contains('/') || shard_name.contains('\\') {
            return Err(BackendError::Permanent(
                "shard name must not contain path separators".to_string(),
            ));
        }
        if shard_name.contains("..") {
            return Err(BackendError::Permanent(
                "shard name must not contain `..`".to_string(),
            ));
        }
        Ok(self.root.join(shard_name))
    }
}

#[async_trait]
impl BackendAdapter for FilesystemBackend {
    async fn put(&self, shard_name: &str, bytes: &[u8]) -> BackendResult<()> {
        let tmp = self.path_for(&format!("{shard_name}.tmp"))?;
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;
        fs::rename(&tmp, self.path_for(shard_name)?)
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, shard_name: &str) -> BackendResult<Vec<u8>> {
        match fs::read(self.path_for(shard_name)?).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BackendError::NotFound),
            Err(e) => Err(BackendError::Transient(e.to_string())),
        }
    }

    async fn exists(&self, shard_name: &str) -> BackendResult<bool> {
        match fs::metadata(self.path_for(shard_name)?).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BackendError::Transient(e.to_string())),
        }
    }

    async fn delete(&self, shard_name: &str) -> BackendResult<()> {
        match fs::remove_file(self.path_for(shard_name)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::Transient(e.to_string())),
        }
    }
}
