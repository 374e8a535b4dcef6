//! Error taxonomy shared across the codec, storage, and boundary layers.
//!
//! Each variant maps to exactly one recovery policy and, at the HTTP
//! boundary, one status code (see [`crate::api_server`]).

use thiserror::Error;

use crate::codec::CodecError;

#[derive(Debug, Error)]
pub enum DfsError {
    #[error("file already exists")]
    AlreadyExists,

    #[error("username already taken")]
    UsernameTaken,

    #[error("file not found")]
    NotFound,

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("not enough shards to reconstruct the file")]
    Unrecoverable,

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type DfsResult<T> = Result<T, DfsError>;
