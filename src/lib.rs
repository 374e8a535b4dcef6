//! shardmesh: erasure-coded, multi-backend file storage.
//!
//! A file is split into fixed-count Reed-Solomon shards ([`codec`]),
//! scattered across independently addressable storage locations
//! ([`backend`]), and tracked in a metadata store ([`database`]) so that any
//! two missing shards can be reconstructed on retrieval. [`orchestrator`]
//! ties these together; [`api_server`] exposes the result over HTTP.

pub mod auth;
pub mod backend;
pub mod codec;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod orchestrator;

pub mod api_server;

pub use error::{DfsError, DfsResult};
pub use orchestrator::ShardOrchestrator;
