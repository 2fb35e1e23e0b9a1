//! Database pool with split reader/writer connections in WAL mode.
//!
//! SQLite allows only one writer at a time. `StorePool` pairs a
//! multi-connection reader pool for concurrent reads with a
//! single-connection writer pool that serializes all writes. Both run in
//! WAL journal mode with a 5-second busy timeout.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Split read/write pool for SQLite with WAL mode.
///
/// - `reader`: Multi-connection pool (up to 8) for concurrent SELECT queries.
/// - `writer`: Single-connection pool for serialized INSERT/UPDATE/DELETE.
#[derive(Clone)]
pub struct StorePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl StorePool {
    /// Create a new StorePool with split reader/writer connections.
    ///
    /// Bootstraps the schema on the writer pool before the reader opens,
    /// so a fresh database file is immediately usable.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(true);

        let read_opts = base_opts.clone().read_only(true);
        let write_opts = base_opts;

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(write_opts)
            .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS kv_store (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )"#,
        )
        .execute(&writer)
        .await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(read_opts)
            .await?;

        Ok(Self { reader, writer })
    }
}

/// Returns the default database URL based on the `MURMUR_DATA_DIR` env var,
/// falling back to `~/.murmur/murmur.db`.
pub fn default_database_url() -> String {
    let data_dir = std::env::var("MURMUR_DATA_DIR").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{home}/.murmur")
    });
    format!("sqlite://{data_dir}/murmur.db")
}
