//! Reed-Solomon erasure coding over GF(2^8).
//!
//! Pure and stateless: every quantity the encoder/decoder needs (`shard_size`,
//! `original_file_size`) is derived from the arguments of a single call, never
//! cached on the codec itself, so one `Codec` can safely serve concurrent
//! callers.

use reed_solomon_erasure::galois_8::ReedSolomon;
use thiserror::Error;

/// Number of data shards a file is split into.
pub const DATA_SHARDS: usize = 4;
/// Number of parity shards appended to the data shards.
pub const PARITY_SHARDS: usize = 2;
/// Total shards per file (`DATA_SHARDS + PARITY_SHARDS`).
pub const TOTAL_SHARDS: usize = DATA_SHARDS + PARITY_SHARDS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("fewer than {needed} of {total} shards present")]
    InsufficientShards { needed: usize, total: usize },
    #[error("present shards disagree on length")]
    InconsistentShardLength,
    #[error("invalid codec parameters: {0}")]
    InvalidParameters(String),
    #[error("reed-solomon internal error: {0:?}")]
    Internal(reed_solomon_erasure::Error),
}

impl From<reed_solomon_erasure::Error> for CodecError {
    fn from(e: reed_solomon_erasure::Error) -> Self {
        match e {
            reed_solomon_erasure::Error::TooFewShardsPresent => CodecError::InsufficientShards {
                needed: DATA_SHARDS,
                total: TOTAL_SHARDS,
            },
            reed_solomon_erasure::Error::IncorrectShardSize => CodecError::InconsistentShardLength,
            other => CodecError::Internal(other),
        }
    }
}

/// `shard_size = ceil(original_file_size / DATA_SHARDS)`.
pub fn shard_size(original_file_size: usize) -> usize {
    (original_file_size + DATA_SHARDS - 1) / DATA_SHARDS
}

/// Reed-Solomon `(k=4, m=2)` codec. Reentrant and stateless; holds no
/// per-call data, only the matrix construction cost amortized by
/// `reed_solomon_erasure` internally.
#[derive(Debug, Default)]
pub struct Codec;

impl Codec {
    pub fn new() -> Self {
        Codec
    }

    /// Splits `data` into `TOTAL_SHARDS` equal-length shards. Data shards
    /// `0..DATA_SHARDS` hold the input bytes in order, the last one
    /// zero-padded to `shard_size`; the remaining shards are parity.
    /// Zero-length input yields `TOTAL_SHARDS` empty shards.
    pub fn encode(&self, data: &[u8]) -> Result<Vec<Vec<u8>>, CodecError> {
        let size = shard_size(data.len());

        if size == 0 {
            return Ok(vec![Vec::new(); TOTAL_SHARDS]);
        }

        let mut shards: Vec<Vec<u8>> = vec![vec![0u8; size]; TOTAL_SHARDS];
        for (i, shard) in shards.iter_mut().enumerate().take(DATA_SHARDS) {
            let start = i * size;
            if start >= data.len() {
                continue;
            }
            let end = std::cmp::min(start + size, data.len());
            shard[..end - start].copy_from_slice(&data[start..end]);
        }

        let rs = ReedSolomon::new(DATA_SHARDS, PARITY_SHARDS)?;
        rs.encode(&mut shards)?;
        Ok(shards)
    }

    /// Reconstructs the original file from a vector of `TOTAL_SHARDS` slots,
    /// each `Some(shard)` (present) or `None` (missing/rejected). Requires at
    /// least `DATA_SHARDS` present slots of identical, non-zero-when-nonempty
    /// length. Returns the first `original_file_size` bytes of the
    /// concatenated data shards.
    pub fn decode(
        &self,
        mut slots: Vec<Option<Vec<u8>>>,
        original_file_size: usize,
    ) -> Result<Vec<u8>, CodecError> {
        if slots.len() != TOTAL_SHARDS {
            return Err(CodecError::InvalidParameters(format!(
                "expected {} slots, got {}",
                TOTAL_SHARDS,
                slots.len()
            )));
        }

        let present = slots.iter().filter(|s| s.is_some()).count();
        if present < DATA_SHARDS {
            return Err(CodecError::InsufficientShards {
                needed: DATA_SHARDS,
                total: TOTAL_SHARDS,
            });
        }

        if original_file_size == 0 {
            return Ok(Vec::new());
        }

        let expected_size = shard_size(original_file_size);
        for slot in slots.iter().flatten() {
            if slot.len() != expected_size {
                return Err(CodecError::InconsistentShardLength);
            }
        }

        let all_present = slots.iter().all(Option::is_some);
        if !all_present {
            let rs = ReedSolomon::new(DATA_SHARDS, PARITY_SHARDS)?;
            rs.reconstruct(&mut slots)?;
        }

        let mut out = Vec::with_capacity(DATA_SHARDS * expected_size);
        for slot in slots.into_iter().take(DATA_SHARDS) {
            out.extend_from_slice(&slot.expect("reconstruct fills every slot"));
        }
        out.truncate(original_file_size);
        Ok(out)
    }
}
