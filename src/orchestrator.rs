//! Shard orchestrator: drives encode+upload, download+verify+decode,
//! self-healing, listing, and deletion. Owns the `n` configured backend
//! adapters and the metadata store; the codec is shared, immutable,
//! process-wide state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use sha2::{Digest, Sha256};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::backend::BackendAdapter;
use crate::codec::{shard_size, Codec, TOTAL_SHARDS};
use crate::database::{FileSummary, MetadataStore, ShardRecord};
use crate::error::{DfsError, DfsResult};

/// One entry in a `list` response.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FileListing {
    pub original_filename: String,
    pub original_file_size: u64,
    pub shards_total: usize,
    pub shards_retrievable: usize,
}

pub struct ShardOrchestrator {
    backends: Vec<Arc<dyn BackendAdapter>>,
    metadata: Arc<dyn MetadataStore>,
    codec: Codec,
    per_call_timeout: Duration,
}

impl ShardOrchestrator {
    /// `backends` must have exactly `TOTAL_SHARDS` entries; `backends[i]` is
    /// the adapter for `LogicalLocation` `i`.
    pub fn new(
        backends: Vec<Arc<dyn BackendAdapter>>,
        metadata: Arc<dyn MetadataStore>,
        per_call_timeout: Duration,
    ) -> DfsResult<Self> {
        if backends.len() != TOTAL_SHARDS {
            return Err(DfsError::Config(format!(
                "expected {TOTAL_SHARDS} backend locations, got {}",
                backends.len()
            )));
        }
        Ok(Self {
            backends,
            metadata,
            codec: Codec::new(),
            per_call_timeout,
        })
    }

    fn fresh_shard_name(original_filename: &str, shard_index: usize) -> String {
        format!(
            "{original_filename}.{shard_index}.{}",
            uuid::Uuid::new_v4().simple()
        )
    }

    /// Rejects filenames that would let a minted shard name escape a flat
    /// backend namespace (§4.2: "Names are chosen by the orchestrator and
    /// are flat (no paths)"). `original_filename` is attacker-controlled
    /// (it comes straight off the multipart upload) and is embedded verbatim
    /// into `shard_name`, so path separators and `..` segments must be
    /// rejected before a shard name is ever minted.
    fn validate_filename(original_filename: &str) -> DfsResult<()> {
        if original_filename.is_empty() {
            return Err(DfsError::InvalidFilename("filename must not be empty".to_string()));
        }
        if original_filename.contains('/') || original_filename.contains('\\') {
            return Err(DfsError::InvalidFilename(
                "filename must not contain path separators".to_string(),
            ));
        }
        if original_filename.contains('\0') {
            return Err(DfsError::InvalidFilename(
                "filename must not contain a NUL byte".to_string(),
            ));
        }
        if original_filename == "." || original_filename == ".." {
            return Err(DfsError::InvalidFilename(
                "filename must not be a path segment".to_string(),
            ));
        }
        Ok(())
    }

    fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// §4.4.1 Upload.
    pub async fn upload(
        &self,
        owner_id: i64,
        original_filename: &str,
        payload: &[u8],
    ) -> DfsResult<()> {
        Self::validate_filename(original_filename)?;
        if !self.metadata.find_shards(owner_id, original_filename).await?.is_empty() {
            return Err(DfsError::AlreadyExists);
        }

        let shards = self.codec.encode(payload)?;
        let original_file_size = payload.len() as u64;
        let byte_size = shard_size(payload.len()) as u64;
        let now = Utc::now();

        let shard_names: Vec<String> = (0..TOTAL_SHARDS)
            .map(|i| Self::fresh_shard_name(original_filename, i))
            .collect();

        let tasks = shards.into_iter().enumerate().map(|(i, shard)| {
            let backend = self.backends[i].clone();
            let metadata = self.metadata.clone();
            let shard_name = shard_names[i].clone();
            let original_filename = original_filename.to_string();
            let timeout_dur = self.per_call_timeout;
            async move {
                let sha = Self::sha256_hex(&shard);
                let record = ShardRecord {
                    owner_id,
                    original_filename,
                    shard_name: shard_name.clone(),
                    shard_index: i as u32,
                    shard_sha256: sha,
                    shard_byte_size: byte_size,
                    original_file_size,
                    created_at: now,
                };
                metadata.insert_shard(record).await?;
                timeout(timeout_dur, backend.put(&shard_name, &shard))
                    .await
                    .map_err(|_| DfsError::UploadFailed(format!("shard {i} put timed out")))?
                    .map_err(|e| DfsError::UploadFailed(format!("shard {i} put failed: {e}")))?;
                Ok::<(), DfsError>(())
            }
        });

        let results = join_all(tasks).await;
        if let Some(err) = results.iter().find_map(|r| r.as_ref().err()) {
            let message = err.to_string();
            self.compensate_failed_upload(owner_id, original_filename, &shard_names).await;
            return Err(DfsError::UploadFailed(message));
        }

        info!(original_filename, owner_id, "upload complete");
        Ok(())
    }

    async fn compensate_failed_upload(
        &self,
        owner_id: i64,
        original_filename: &str,
        shard_names: &[String],
    ) {
        if let Err(e) = self.metadata.delete_file(owner_id, original_filename).await {
            warn!(original_filename, error = %e, "compensating metadata delete failed");
        }
        let cleanups = shard_names.iter().enumerate().map(|(i, name)| {
            let backend = self.backends[i].clone();
            let name = name.clone();
            async move {
                if let Err(e) = backend.delete(&name).await {
                    warn!(shard = %name, error = %e, "compensating blob delete failed");
                }
            }
        });
        join_all(cleanups).await;
    }

    /// §4.4.2 Retrieval (self-healing read).
    pub async fn retrieve(&self, owner_id: i64, original_filename: &str) -> DfsResult<Vec<u8>> {
        let records = self.metadata.find_shards(owner_id, original_filename).await?;
        if records.is_empty() {
            return Err(DfsError::NotFound);
        }
        let original_file_size = records[0].original_file_size;

        let downloads = records.iter().map(|record| {
            let backend = self.backends[record.shard_index as usize].clone();
            let shard_name = record.shard_name.clone();
            let expected_sha = record.shard_sha256.clone();
            let timeout_dur = self.per_call_timeout;
            async move {
                let fetched = match timeout(timeout_dur, backend.get(&shard_name)).await {
                    Ok(Ok(bytes)) => bytes,
                    Ok(Err(_)) | Err(_) => return None,
                };
                if Self::sha256_hex(&fetched) != expected_sha {
                    return None;
                }
                Some(fetched)
            }
        });
        let fetched: Vec<Option<Vec<u8>>> = join_all(downloads).await;

        let mut slots: Vec<Option<Vec<u8>>> = vec![None; TOTAL_SHARDS];
        for (record, bytes) in records.iter().zip(fetched.iter()) {
            slots[record.shard_index as usize] = bytes.clone();
        }

        let present_count = slots.iter().filter(|s| s.is_some()).count();
        if present_count < crate::codec::DATA_SHARDS {
            return Err(DfsError::Unrecoverable);
        }

        let reconstructed = self.codec.decode(slots.clone(), original_file_size as usize)?;

        if present_count < TOTAL_SHARDS {
            self.self_heal(owner_id, &records, &slots, &reconstructed).await;
        }

        Ok(reconstructed)
    }

    async fn self_heal(
        &self,
        owner_id: i64,
        records: &[ShardRecord],
        slots: &[Option<Vec<u8>>],
        reconstructed: &[u8],
    ) {
        let canonical = match self.codec.encode(reconstructed) {
            Ok(shards) => shards,
            Err(e) => {
                warn!(error = %e, "self-heal re-encode failed");
                return;
            }
        };

        let original_filename = &records[0].original_filename;
        let original_file_size = records[0].original_file_size;
        let byte_size = shard_size(reconstructed.len()) as u64;

        let missing_indices: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| if s.is_none() { Some(i) } else { None })
            .collect();

        let heals = missing_indices.into_iter().map(|i| {
            let backend = self.backends[i].clone();
            let metadata = self.metadata.clone();
            let original_filename = original_filename.clone();
            let new_name = Self::fresh_shard_name(&original_filename, i);
            let shard = canonical[i].clone();
            let old_name = records.iter().find(|r| r.shard_index as usize == i).map(|r| r.shard_name.clone());
            let sha = Self::sha256_hex(&shard);
            async move {
                if let Some(old_name) = old_name {
                    if let Err(e) = metadata.delete_shard(owner_id, &old_name).await {
                        warn!(shard = %old_name, error = %e, "self-heal old row delete failed");
                    }
                }
                let record = ShardRecord {
                    owner_id,
                    original_filename: original_filename.clone(),
                    shard_name: new_name.clone(),
                    shard_index: i as u32,
                    shard_sha256: sha,
                    shard_byte_size: byte_size,
                    original_file_size,
                    created_at: Utc::now(),
                };
                if let Err(e) = metadata.insert_shard(record).await {
                    warn!(shard_index = i, error = %e, "self-heal metadata insert failed");
                    return;
                }
                if let Err(e) = backend.put(&new_name, &shard).await {
                    warn!(shard_index = i, error = %e, "self-heal blob upload failed");
                }
                info!(shard_index = i, original_filename = %original_filename, "self-healed shard");
            }
        });

        join_all(heals).await;
    }

    /// §4.4.3 List.
    pub async fn list(&self, owner_id: i64) -> DfsResult<Vec<FileListing>> {
        let summaries: Vec<FileSummary> = self.metadata.list_owned_filenames(owner_id).await?;

        let listings = summaries.into_iter().map(|summary| {
            let metadata = self.metadata.clone();
            let backends = self.backends.clone();
            let original_filename = summary.original_filename.clone();
            async move {
                let records = metadata
                    .find_shards(owner_id, &original_filename)
                    .await
                    .unwrap_or_default();
                let probes = records.iter().map(|record| {
                    let backend = backends[record.shard_index as usize].clone();
                    let shard_name = record.shard_name.clone();
                    async move { backend.exists(&shard_name).await.unwrap_or(false) }
                });
                let results = join_all(probes).await;
                let shards_retrievable = results.into_iter().filter(|ok| *ok).count();
                FileListing {
                    original_filename,
                    original_file_size: summary.original_file_size,
                    shards_total: TOTAL_SHARDS,
                    shards_retrievable,
                }
            }
        });

        Ok(join_all(listings).await)
    }

    /// §4.4.4 Delete.
    pub async fn delete(&self, owner_id: i64, original_filename: &str) -> DfsResult<()> {
        let records = self.metadata.find_shards(owner_id, original_filename).await?;
        self.metadata.delete_file(owner_id, original_filename).await?;

        let cleanups = records.into_iter().map(|record| {
            let backend = self.backends[record.shard_index as usize].clone();
            async move {
                if let Err(e) = backend.delete(&record.shard_name).await {
                    warn!(shard = %record.shard_name, error = %e, "janitorial blob delete failed");
                }
            }
        });
        join_all(cleanups).await;
        Ok(())
    }
}
