//! Shared test doubles for the runtime's trait seams.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};
use serde_json::Value;

use murmur_types::agent::{Agent, AgentId, BehaviorConfig, Mood, StyleProfile};
use murmur_types::error::{GenerateError, NetworkError, StorageError};
use murmur_types::item::{Item, ItemId, ReactionKind, ReactionSuggestion, TranscriptTurn};

use crate::generate::ContentGenerator;
use crate::network::{PublishOptions, SocialNetwork};
use crate::storage::KvStore;

/// In-memory `KvStore` for tests.
#[derive(Default)]
pub struct MemoryKv {
    map: Mutex<HashMap<String, Value>>,
}

impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.map
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn append_bounded(
        &self,
        key: &str,
        value: Value,
        cap: usize,
    ) -> Result<(), StorageError> {
        let mut map = self.map.lock().unwrap();
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(items) = entry else {
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

/// A record of one publish call observed by `MockNetwork`.
#[derive(Debug, Clone)]
pub struct PublishedPost {
    pub agent: AgentId,
    pub content: String,
    pub reply_to: Option<ItemId>,
    pub quote_of: Option<ItemId>,
}

/// Scriptable `SocialNetwork` double: items are preloaded, publishes and
/// likes are recorded for assertions.
#[derive(Default)]
pub struct MockNetwork {
    pub items: Mutex<HashMap<ItemId, Item>>,
    pub published: Mutex<Vec<PublishedPost>>,
    pub likes: Mutex<Vec<(AgentId, ItemId)>>,
    pub mentions: Mutex<Vec<Item>>,
    /// When set, the next publish fails once with this error kind.
    pub fail_next_publish: Mutex<Option<NetworkError>>,
    next_id: AtomicUsize,
}

impl MockNetwork {
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let network = Self::default();
        {
            let mut map = network.items.lock().unwrap();
            for item in items {
                map.insert(item.id.clone(), item);
            }
        }
        network
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn like_count(&self) -> usize {
        self.likes.lock().unwrap().len()
    }
}

impl SocialNetwork for MockNetwork {
    async fn fetch_item(&self, id: &ItemId) -> Result<Item, NetworkError> {
        self.items
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(NetworkError::NotFound)
    }

    async fn fetch_mentions_since(
        &self,
        _agent: &AgentId,
        since: Option<&ItemId>,
        limit: usize,
    ) -> Result<Vec<Item>, NetworkError> {
        let mentions = self.mentions.lock().unwrap();
        let start = match since {
            Some(id) => mentions
                .iter()
                .position(|m| &m.id == id)
                .map(|i| i + 1)
                .unwrap_or(0),
            None => 0,
        };
        Ok(mentions.iter().skip(start).take(limit).cloned().collect())
    }

    async fn publish(
        &self,
        agent: &AgentId,
        content: &str,
        opts: PublishOptions,
    ) -> Result<Item, NetworkError> {
        if let Some(err) = self.fail_next_publish.lock().unwrap().take() {
            return Err(err);
        }
        let id = ItemId::new(format!(
            "pub-{}",
            self.next_id.fetch_add(1, Ordering::SeqCst)
        ));
        self.published.lock().unwrap().push(PublishedPost {
            agent: agent.clone(),
            content: content.to_string(),
            reply_to: opts.reply_to.clone(),
            quote_of: opts.quote_of.clone(),
        });
        Ok(Item {
            id,
            content: content.to_string(),
            author_id: agent.as_str().to_string(),
            author_handle: agent.as_str().to_string(),
            created_at: Utc::now(),
            reply_to_id: opts.reply_to,
            quote_of_id: opts.quote_of,
            is_direct_mention: false,
        })
    }

    async fn like(&self, agent: &AgentId, item: &ItemId) -> Result<bool, NetworkError> {
        self.likes
            .lock()
            .unwrap()
            .push((agent.clone(), item.clone()));
        Ok(true)
    }
}

/// Canned `ContentGenerator`: fixed reply/post text and a scriptable
/// reaction suggestion.
pub struct MockGenerator {
    pub reply_text: String,
    pub post_text: String,
    pub suggestion: Mutex<ReactionSuggestion>,
    pub reply_calls: AtomicUsize,
    pub post_calls: AtomicUsize,
    pub last_hint: Mutex<Option<String>>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self {
            reply_text: "what a thought!".to_string(),
            post_text: "musing about the sky today".to_string(),
            suggestion: Mutex::new(ReactionSuggestion {
                action: ReactionKind::Ignore,
                content: None,
                reasoning: "nothing to add".to_string(),
            }),
            reply_calls: AtomicUsize::new(0),
            post_calls: AtomicUsize::new(0),
            last_hint: Mutex::new(None),
        }
    }
}

impl MockGenerator {
    pub fn suggesting(action: ReactionKind) -> Self {
        let generator = Self::default();
        generator.suggestion.lock().unwrap().action = action;
        generator
    }
}

impl ContentGenerator for MockGenerator {
    async fn generate_reply(
        &self,
        _agent: &Agent,
        _transcript: &[TranscriptTurn],
    ) -> Result<String, GenerateError> {
        self.reply_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply_text.clone())
    }

    async fn generate_post(
        &self,
        _agent: &Agent,
        hint: Option<&str>,
    ) -> Result<String, GenerateError> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_hint.lock().unwrap() = hint.map(str::to_string);
        Ok(self.post_text.clone())
    }

    async fn generate_reaction(
        &self,
        _agent: &Agent,
        _item: &Item,
    ) -> Result<ReactionSuggestion, GenerateError> {
        Ok(self.suggestion.lock().unwrap().clone())
    }
}

/// A test agent with neutral defaults.
pub fn test_agent(id: &str) -> Agent {
    Agent {
        id: AgentId::new(id),
        name: id.to_string(),
        handle: id.to_string(),
        description: "a test persona".to_string(),
        behavior: BehaviorConfig::default(),
        style: StyleProfile::default(),
        last_post_time: None,
        mood: Mood::default(),
    }
}

/// A test item with sequential timestamps keyed off the numeric suffix.
pub fn test_item(id: &str, author: &str, content: &str) -> Item {
    Item {
        id: ItemId::new(id),
        content: content.to_string(),
        author_id: author.to_string(),
        author_handle: author.to_string(),
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        reply_to_id: None,
        quote_of_id: None,
        is_direct_mention: false,
    }
}
