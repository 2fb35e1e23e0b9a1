//! In-memory `KvStore` for ephemeral runtimes and demos.
//!
//! Nothing survives a restart; the dedup set and mention watermarks start
//! empty every launch, so an at-most-once guarantee across restarts needs
//! the SQLite store instead.

use dashmap::DashMap;

use murmur_core::storage::KvStore;
use murmur_types::error::StorageError;

/// A `KvStore` held entirely in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    map: DashMap<String, serde_json::Value>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        Ok(self.map.get(key).map(|entry| entry.clone()))
    }

    async fn put(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError> {
        self.map.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn append_bounded(
        &self,
        key: &str,
        value: serde_json::Value,
        cap: usize,
    ) -> Result<(), StorageError> {
        let mut entry = self
            .map
            .entry(key.to_string())
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        let serde_json::Value::Array(items) = entry.value_mut() else {
            return Err(StorageError::Serialization(format!(
                "key '{key}' does not hold an array"
            )));
        };
        items.push(value);
        if items.len() > cap {
            let excess = items.len() - cap;
            items.drain(..excess);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let store = InMemoryStore::new();
        store.put("k", &json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn append_bounded_caps_entries() {
        let store = InMemoryStore::new();
        for i in 0..4 {
            store.append_bounded("list", json!(i), 2).await.unwrap();
        }
        assert_eq!(store.get("list").await.unwrap(), Some(json!([2, 3])));
    }
}
