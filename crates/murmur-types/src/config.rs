//! Runtime configuration loaded from `config.toml`.
//!
//! `RuntimeConfig` is the top-level document; each `[[agents]]` table
//! becomes one persona. Validation failures in a single agent section skip
//! that agent only; the caller decides whether an empty set is fatal.

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId, BehaviorConfig, Mood, StyleProfile};
use crate::error::ConfigError;
use crate::memory::MemoryEntry;

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// How often each agent polls for new mentions.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// How often the post scheduler checks deadlines.
    #[serde(default = "default_scheduler_tick_secs")]
    pub scheduler_tick_secs: u64,

    /// Cap on long-term memories per agent (recent events cap is half).
    #[serde(default = "default_memory_limit")]
    pub memory_limit: usize,

    /// Cap on post-history entries per agent.
    #[serde(default = "default_post_history_limit")]
    pub post_history_limit: usize,

    /// Retention of already-processed item IDs.
    #[serde(default = "default_dedup_cap")]
    pub dedup_cap: usize,

    /// Maximum mentions fetched per poll.
    #[serde(default = "default_mention_batch")]
    pub mention_batch: usize,

    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

fn default_poll_interval_secs() -> u64 {
    90
}

fn default_scheduler_tick_secs() -> u64 {
    60
}

fn default_memory_limit() -> usize {
    40
}

fn default_post_history_limit() -> usize {
    20
}

fn default_dedup_cap() -> usize {
    1000
}

fn default_mention_batch() -> usize {
    20
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            scheduler_tick_secs: default_scheduler_tick_secs(),
            memory_limit: default_memory_limit(),
            post_history_limit: default_post_history_limit(),
            dedup_cap: default_dedup_cap(),
            mention_batch: default_mention_batch(),
            agents: Vec::new(),
        }
    }
}

/// One `[[agents]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    /// Network handle; defaults to `id`.
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub style: StyleProfile,
    /// Seeded core memories (importance 5, immutable after load).
    #[serde(default)]
    pub core_memories: Vec<String>,
}

impl AgentConfig {
    /// Validate and convert into a runtime `Agent`.
    pub fn build(&self) -> Result<Agent, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidAgent {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("empty id"));
        }
        if self.behavior.min_hours_between_posts <= 0.0
            || self.behavior.max_hours_between_posts < self.behavior.min_hours_between_posts
        {
            return Err(invalid("posting interval bounds are inverted or non-positive"));
        }
        for (name, p) in [
            ("reply_probability", self.behavior.reply_probability),
            ("quote_probability", self.behavior.quote_probability),
            ("like_probability", self.behavior.like_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(invalid(&format!("{name} must be in [0, 1]")));
            }
        }
        if self.behavior.peak_posting_hours.iter().any(|h| *h > 23) {
            return Err(invalid("peak_posting_hours entries must be 0-23"));
        }

        Ok(Agent {
            id: AgentId::new(self.id.clone()),
            name: self.name.clone(),
            handle: self.handle.clone().unwrap_or_else(|| self.id.clone()),
            description: self.description.clone(),
            behavior: self.behavior.clone(),
            style: self.style.clone(),
            last_post_time: None,
            mood: Mood::default(),
        })
    }

    /// Seed entries for the agent's core memory (maximum importance).
    pub fn seed_memories(&self) -> Vec<MemoryEntry> {
        self.core_memories
            .iter()
            .map(|m| MemoryEntry::new(m.clone(), 5))
            .collect()
    }
}
