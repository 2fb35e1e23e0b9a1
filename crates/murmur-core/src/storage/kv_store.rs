//! Key-value store trait.
//!
//! The runtime's entire persistence contract: JSON values under string
//! keys, partitioned by convention (`memory:{agent}`, `dedup:seen`,
//! `mentions:since:{agent}`). Whether the backing store is SQLite or a
//! flat file is an infra concern; implementations live in `murmur-infra`.

use murmur_types::error::StorageError;

/// Trait for persistent key-value storage (RPITIT, Rust 2024 edition).
pub trait KvStore: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, StorageError>> + Send;

    /// Set a value for a key (upsert).
    fn put(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Append `value` to the JSON array stored under `key`, keeping only
    /// the newest `cap` entries (oldest evicted first). A missing key is
    /// treated as an empty array.
    fn append_bounded(
        &self,
        key: &str,
        value: serde_json::Value,
        cap: usize,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;
}
