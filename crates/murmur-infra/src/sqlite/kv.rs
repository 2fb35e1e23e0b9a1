//! SQLite key-value store implementation.
//!
//! Implements `KvStore` from `murmur-core` using sqlx with split read/write
//! pools. Values are stored as JSON text and deserialized on read.

use chrono::Utc;
use sqlx::Row;

use murmur_core::storage::KvStore;
use murmur_types::error::StorageError;

use super::pool::StorePool;

/// SQLite-backed implementation of `KvStore`.
pub struct SqliteKvStore {
    pool: StorePool,
}

impl SqliteKvStore {
    /// Create a new KV store backed by the given database pool.
    pub fn new(pool: StorePool) -> Self {
        Self { pool }
    }

    /// Fetch through the writer connection so read-modify-write sequences
    /// observe their own uncommitted-to-reader state.
    async fn get_via_writer(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        row.map(decode_value).transpose()
    }

    async fn upsert(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError> {
        let value_str = serde_json::to_string(value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO kv_store (key, value, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(&value_str)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }
}

fn decode_value(row: sqlx::sqlite::SqliteRow) -> Result<serde_json::Value, StorageError> {
    let value_str: String = row
        .try_get("value")
        .map_err(|e| StorageError::Query(e.to_string()))?;
    serde_json::from_str(&value_str)
        .map_err(|e| StorageError::Serialization(format!("invalid JSON value: {e}")))
}

impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        row.map(decode_value).transpose()
    }

    async fn put(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError> {
        self.upsert(key, value).await
    }

    async fn append_bounded(
        &self,
        key: &str,
        value: serde_json::Value,
        cap: usize,
    ) -> Result<(), StorageError> {
        // The single-connection writer pool serializes the whole
        // read-modify-write, so no transaction is needed.
        let mut items = match self.get_via_writer(key).await? {
            Some(serde_json::Value::Array(items)) => items,
            Some(_) => {
                return Err(StorageError::Serialization(format!(
                    "key '{key}' does not hold an array"
                )));
            }
            None => Vec::new(),
        };

        items.push(value);
        if items.len() > cap {
            let excess = items.len() - cap;
            items.drain(..excess);
        }

        self.upsert(key, &serde_json::Value::Array(items)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> SqliteKvStore {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        SqliteKvStore::new(StorePool::new(&url).await.unwrap())
    }

    #[tokio::test]
    async fn put_get_roundtrip() {
        let store = test_store().await;

        let value = json!({"sentiment": 0.4, "notes": ["likes moths"]});
        store.put("memory:luna", &value).await.unwrap();

        let got = store.get("memory:luna").await.unwrap();
        assert_eq!(got, Some(value));
    }

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let store = test_store().await;
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_upserts() {
        let store = test_store().await;

        store.put("counter", &json!(1)).await.unwrap();
        store.put("counter", &json!(2)).await.unwrap();

        assert_eq!(store.get("counter").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn append_bounded_grows_then_evicts_oldest() {
        let store = test_store().await;

        for i in 0..5 {
            store
                .append_bounded("dedup:seen", json!(format!("item-{i}")), 3)
                .await
                .unwrap();
        }

        let got = store.get("dedup:seen").await.unwrap();
        assert_eq!(got, Some(json!(["item-2", "item-3", "item-4"])));
    }

    #[tokio::test]
    async fn append_bounded_treats_missing_key_as_empty() {
        let store = test_store().await;

        store.append_bounded("fresh", json!("a"), 10).await.unwrap();
        assert_eq!(store.get("fresh").await.unwrap(), Some(json!(["a"])));
    }

    #[tokio::test]
    async fn append_bounded_rejects_non_array() {
        let store = test_store().await;

        store.put("scalar", &json!("not an array")).await.unwrap();
        let result = store.append_bounded("scalar", json!("x"), 10).await;
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }
}
