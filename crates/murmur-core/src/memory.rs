//! Per-agent memory persistence over the key-value contract.
//!
//! `MemoryStore` owns the load-modify-save cycle for `MemoryRecord`s and
//! enforces the bounded-collection caps on every mutation. Records are
//! partitioned per agent under `memory:{agent_id}`; writes to distinct
//! agents never touch the same key, and a per-agent lock serializes
//! mutations to the same key, since the watcher task and event listeners
//! can update one agent's record concurrently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use murmur_types::agent::AgentId;
use murmur_types::config::RuntimeConfig;
use murmur_types::error::StorageError;
use murmur_types::memory::{MemoryEntry, MemoryRecord, Relationship};

use crate::storage::KvStore;

/// Persistent per-agent memory with bounded collections.
pub struct MemoryStore<S> {
    store: Arc<S>,
    locks: DashMap<AgentId, Arc<Mutex<()>>>,
    long_term_cap: usize,
    event_cap: usize,
    post_cap: usize,
}

impl<S: KvStore> MemoryStore<S> {
    pub fn new(store: Arc<S>, config: &RuntimeConfig) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            long_term_cap: config.memory_limit,
            // Recent events get half the long-term budget.
            event_cap: (config.memory_limit / 2).max(1),
            post_cap: config.post_history_limit,
        }
    }

    fn key(agent: &AgentId) -> String {
        format!("memory:{agent}")
    }

    /// Every mutation is a load-modify-save over the store, which suspends
    /// between the read and the write; the per-agent lock must be held
    /// across the whole cycle or a concurrent writer's update is lost.
    fn write_lock(&self, agent: &AgentId) -> Arc<Mutex<()>> {
        self.locks.entry(agent.clone()).or_default().clone()
    }

    /// Load the agent's record, defaulting to empty for a new agent.
    pub async fn load(&self, agent: &AgentId) -> Result<MemoryRecord, StorageError> {
        match self.store.get(&Self::key(agent)).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            None => Ok(MemoryRecord::default()),
        }
    }

    pub async fn save(&self, agent: &AgentId, record: &MemoryRecord) -> Result<(), StorageError> {
        let value = serde_json::to_value(record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.store.put(&Self::key(agent), &value).await
    }

    /// Seed core memories at load time. Core memories are immutable after
    /// load: seeding is skipped if the record already carries them.
    pub async fn seed(
        &self,
        agent: &AgentId,
        entries: Vec<MemoryEntry>,
    ) -> Result<(), StorageError> {
        if entries.is_empty() {
            return Ok(());
        }
        let lock = self.write_lock(agent);
        let _guard = lock.lock().await;
        let mut record = self.load(agent).await?;
        if !record.core_memories.is_empty() {
            debug!(agent = %agent, "core memories already seeded");
            return Ok(());
        }
        record.core_memories = entries;
        self.save(agent, &record).await
    }

    /// Add a long-term memory, evicting by importance at the cap.
    pub async fn remember(&self, agent: &AgentId, entry: MemoryEntry) -> Result<(), StorageError> {
        let lock = self.write_lock(agent);
        let _guard = lock.lock().await;
        let mut record = self.load(agent).await?;
        record.remember(entry, self.long_term_cap);
        self.save(agent, &record).await
    }

    /// Append to the agent's recent-events log.
    pub async fn record_event(
        &self,
        agent: &AgentId,
        entry: MemoryEntry,
    ) -> Result<(), StorageError> {
        let lock = self.write_lock(agent);
        let _guard = lock.lock().await;
        let mut record = self.load(agent).await?;
        record.record_event(entry, self.event_cap);
        self.save(agent, &record).await
    }

    /// Record a published post in the agent's history ring (newest first).
    pub async fn record_post(
        &self,
        agent: &AgentId,
        content: impl Into<String>,
    ) -> Result<(), StorageError> {
        let lock = self.write_lock(agent);
        let _guard = lock.lock().await;
        let mut record = self.load(agent).await?;
        record.record_post(content, self.post_cap);
        self.save(agent, &record).await
    }

    /// Mutate (lazily creating) the relationship toward `handle`.
    pub async fn update_relationship(
        &self,
        agent: &AgentId,
        handle: &str,
        update: impl FnOnce(&mut Relationship),
    ) -> Result<(), StorageError> {
        let lock = self.write_lock(agent);
        let _guard = lock.lock().await;
        let mut record = self.load(agent).await?;
        update(record.relationship_mut(handle));
        self.save(agent, &record).await
    }

    /// The agent's recent post texts, newest first.
    pub async fn recent_posts(&self, agent: &AgentId) -> Result<Vec<String>, StorageError> {
        Ok(self.load(agent).await?.post_history)
    }
}
