//! Metadata store: SQLite-backed persistence for shard records and user
//! accounts.
//!
//! `rusqlite::Connection` is `Send` but not `Sync`; we serialize access
//! behind a `std::sync::Mutex` and hop onto a blocking thread for every
//! query so the async orchestrator never blocks its executor on SQLite I/O.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{DfsError, DfsResult};

/// One row per stored shard (see §3 of the design).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShardRecord {
    pub owner_id: i64,
    pub original_filename: String,
    pub shard_name: String,
    pub shard_index: u32,
    pub shard_sha256: String,
    pub shard_byte_size: u64,
    pub original_file_size: u64,
    pub created_at: DateTime<Utc>,
}

/// One entry per owned file, as returned by listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub original_filename: String,
    pub original_file_size: u64,
}

/// A registered user account.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert_shard(&self, record: ShardRecord) -> DfsResult<()>;
    async fn find_shards(&self, owner_id: i64, original_filename: &str) -> DfsResult<Vec<ShardRecord>>;
    async fn list_owned_filenames(&self, owner_id: i64) -> DfsResult<Vec<FileSummary>>;
    async fn delete_file(&self, owner_id: i64, original_filename: &str) -> DfsResult<()>;
    async fn delete_shard(&self, owner_id: i64, shard_name: &str) -> DfsResult<()>;

    async fn create_user(&self, username: &str, password_hash: &str) -> DfsResult<i64>;
    async fn find_user_by_username(&self, username: &str) -> DfsResult<Option<UserRecord>>;
}

/// SQLite implementation of [`MetadataStore`].
#[derive(Clone)]
pub struct SqliteMetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadataStore {
    pub fn open(db_path: impl AsRef<Path>) -> DfsResult<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> DfsResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize_schema(conn: &Connection) -> DfsResult<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS shard (
                user_id             INTEGER NOT NULL,
                filename            TEXT    NOT NULL,
                original_filename   TEXT    NOT NULL,
                original_file_size  INTEGER NOT NULL,
                shard_index         INTEGER NOT NULL,
                filesha256          TEXT    NOT NULL,
                byte_size           INTEGER NOT NULL,
                created_at          TEXT    NOT NULL,
                PRIMARY KEY (filename, shard_index)
            )",
            [],
        )?;
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_shard_owner_name
                ON shard(user_id, filename)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_shard_owner_original
                ON shard(user_id, original_filename)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> DfsResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> DfsResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("metadata store mutex poisoned");
            f(&conn)
        })
        .await
        .map_err(|e| DfsError::Internal(format!("metadata task panicked: {e}")))?
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ShardRecord> {
        let created_at_str: String = row.get(7)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| {
                rusqlite::Error::InvalidColumnType(7, "created_at".into(), rusqlite::types::Type::Text)
            })?;
        Ok(ShardRecord {
            owner_id: row.get(0)?,
            shard_name: row.get(1)?,
            original_filename: row.get(2)?,
            original_file_size: row.get(3)?,
            shard_index: row.get(4)?,
            shard_sha256: row.get(5)?,
            shard_byte_size: row.get(6)?,
            created_at,
        })
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn insert_shard(&self, record: ShardRecord) -> DfsResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO shard (
                    user_id, filename, original_filename, original_file_size,
                    shard_index, filesha256, byte_size, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.owner_id,
                    record.shard_name,
                    record.original_filename,
                    record.original_file_size,
                    record.shard_index,
                    record.shard_sha256,
                    record.shard_byte_size,
                    record.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_shards(&self, owner_id: i64, original_filename: &str) -> DfsResult<Vec<ShardRecord>> {
        let original_filename = original_filename.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, filename, original_filename, original_file_size,
                        shard_index, filesha256, byte_size, created_at
                 FROM shard WHERE user_id = ?1 AND original_filename = ?2
                 ORDER BY shard_index ASC",
            )?;
            let rows = stmt
                .query_map(params![owner_id, original_filename], |row| {
                    Self::row_to_record(row)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn list_owned_filenames(&self, owner_id: i64) -> DfsResult<Vec<FileSummary>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT original_filename, MIN(original_file_size)
                 FROM shard WHERE user_id = ?1
                 GROUP BY original_filename
                 ORDER BY original_filename ASC",
            )?;
            let rows = stmt
                .query_map(params![owner_id], |row| {
                    Ok(FileSummary {
                        original_filename: row.get(0)?,
                        original_file_size: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn delete_file(&self, owner_id: i64, original_filename: &str) -> DfsResult<()> {
        let original_filename = original_filename.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM shard WHERE user_id = ?1 AND original_filename = ?2",
                params![owner_id, original_filename],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_shard(&self, owner_id: i64, shard_name: &str) -> DfsResult<()> {
        let shard_name = shard_name.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM shard WHERE user_id = ?1 AND filename = ?2",
                params![owner_id, shard_name],
            )?;
            Ok(())
        })
        .await
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> DfsResult<i64> {
        let username = username.to_string();
        let password_hash = password_hash.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
                params![username, password_hash, Utc::now().to_rfc3339()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn find_user_by_username(&self, username: &str) -> DfsResult<Option<UserRecord>> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, username, password_hash FROM users WHERE username = ?1",
                    params![username],
                    |row| {
                        Ok(UserRecord {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            password_hash: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
        .await
    }
}
