//! Deduplication of already-processed external items.
//!
//! `DedupStore` guarantees at-most-once reaction per item ID: callers must
//! `check_and_insert` before producing any externally observable side
//! effect, so a duplicate delivery racing a slow first delivery still
//! observes the inserted ID. Retention is bounded; the oldest IDs are
//! evicted past the cap, which preserves the guarantee for any
//! realistically-sized recent window.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::warn;

use murmur_types::error::StorageError;
use murmur_types::item::ItemId;

use crate::storage::KvStore;

const SEEN_KEY: &str = "dedup:seen";

#[derive(Default)]
struct SeenSet {
    ids: HashSet<ItemId>,
    /// Insertion order, oldest at the front, for bounded eviction.
    order: VecDeque<ItemId>,
}

/// Bounded, persisted set of already-processed item IDs.
pub struct DedupStore<S> {
    store: Arc<S>,
    cap: usize,
    seen: Mutex<SeenSet>,
}

impl<S: KvStore> DedupStore<S> {
    pub fn new(store: Arc<S>, cap: usize) -> Self {
        Self {
            store,
            cap: cap.max(1),
            seen: Mutex::new(SeenSet::default()),
        }
    }

    /// Rehydrate the in-memory set from storage. Call once at startup.
    pub async fn load(&self) -> Result<(), StorageError> {
        let Some(value) = self.store.get(SEEN_KEY).await? else {
            return Ok(());
        };
        let ids: Vec<String> = serde_json::from_value(value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut seen = self.seen.lock().await;
        for id in ids.into_iter().rev().take(self.cap).rev() {
            let id = ItemId::new(id);
            if seen.ids.insert(id.clone()) {
                seen.order.push_back(id);
            }
        }
        Ok(())
    }

    /// Insert `id` unless it was already processed.
    ///
    /// Returns `false` when the ID has been seen before. On first sight the
    /// ID is recorded in memory before this method returns and persisted
    /// best-effort; a persistence failure is logged, never surfaced, since
    /// the in-memory insert already upholds the at-most-once guarantee for
    /// this process lifetime.
    pub async fn check_and_insert(&self, id: &ItemId) -> bool {
        {
            let mut seen = self.seen.lock().await;
            if !seen.ids.insert(id.clone()) {
                return false;
            }
            seen.order.push_back(id.clone());
            while seen.order.len() > self.cap {
                if let Some(evicted) = seen.order.pop_front() {
                    seen.ids.remove(&evicted);
                }
            }
        }

        if let Err(e) = self
            .store
            .append_bounded(SEEN_KEY, json!(id.as_str()), self.cap)
            .await
        {
            warn!(item = %id, error = %e, "failed to persist dedup entry");
        }
        true
    }

    /// Whether `id` has already been processed.
    pub async fn contains(&self, id: &ItemId) -> bool {
        self.seen.lock().await.ids.contains(id)
    }

    pub async fn len(&self) -> usize {
        self.seen.lock().await.ids.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
