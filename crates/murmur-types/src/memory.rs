//! Per-agent memory: seeded core memories, bounded long-term memory,
//! relationship tracking, and post history.
//!
//! All bounded collections enforce their caps on insert; a record loaded
//! from storage and mutated through these methods never exceeds its caps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::collections::HashMap;

/// How many interactions a relationship remembers.
pub const RELATIONSHIP_INTERACTION_CAP: usize = 10;

/// A single remembered fact or observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub content: String,
    /// Importance from 1 (low) to 5 (critical); drives eviction order.
    pub importance: u8,
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    pub fn new(content: impl Into<String>, importance: u8) -> Self {
        Self {
            content: content.into(),
            importance: importance.clamp(1, 5),
            created_at: Utc::now(),
        }
    }
}

/// The agent's standing toward one other account.
///
/// Created lazily on first interaction, never independently destroyed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// -1 (hostile) to 1 (fond).
    pub sentiment: f32,
    /// 0 (stranger) to 1 (close).
    pub familiarity: f32,
    /// 0 (distrusted) to 1 (trusted).
    pub trust: f32,
    #[serde(default)]
    pub notes: Vec<String>,
    /// Newest-last, capped at [`RELATIONSHIP_INTERACTION_CAP`].
    #[serde(default)]
    pub recent_interactions: Vec<String>,
}

impl Default for Relationship {
    fn default() -> Self {
        Self {
            sentiment: 0.0,
            familiarity: 0.0,
            trust: 0.5,
            notes: Vec::new(),
            recent_interactions: Vec::new(),
        }
    }
}

impl Relationship {
    /// Record one interaction, nudging familiarity up and evicting the
    /// oldest interaction past the cap.
    pub fn record_interaction(&mut self, summary: impl Into<String>) {
        self.familiarity = (self.familiarity + 0.05).min(1.0);
        self.recent_interactions.push(summary.into());
        if self.recent_interactions.len() > RELATIONSHIP_INTERACTION_CAP {
            let excess = self.recent_interactions.len() - RELATIONSHIP_INTERACTION_CAP;
            self.recent_interactions.drain(..excess);
        }
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// Everything one agent remembers, persisted as a single record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Seeded at load time, never evicted.
    #[serde(default)]
    pub core_memories: Vec<MemoryEntry>,
    /// Importance-ranked, truncated at the configured cap.
    #[serde(default)]
    pub long_term: Vec<MemoryEntry>,
    /// Recent happenings, capped at half the memory limit.
    #[serde(default)]
    pub recent_events: Vec<MemoryEntry>,
    /// Published post texts, newest first, bounded ring.
    #[serde(default)]
    pub post_history: Vec<String>,
    /// Keyed by the other account's handle.
    #[serde(default)]
    pub relationships: HashMap<String, Relationship>,
}

impl MemoryRecord {
    /// Insert a long-term memory, then truncate to `cap` keeping the most
    /// important entries (newest wins among equal importance).
    pub fn remember(&mut self, entry: MemoryEntry, cap: usize) {
        self.long_term.push(entry);
        if self.long_term.len() > cap {
            self.long_term.sort_by(|a, b| {
                b.importance
                    .cmp(&a.importance)
                    .then(b.created_at.cmp(&a.created_at))
            });
            self.long_term.truncate(cap);
        }
    }

    /// Append to the recent-events log, evicting the oldest past `cap`.
    pub fn record_event(&mut self, entry: MemoryEntry, cap: usize) {
        self.recent_events.push(entry);
        if self.recent_events.len() > cap {
            let excess = self.recent_events.len() - cap;
            self.recent_events.drain(..excess);
        }
    }

    /// Prepend to the post history ring (newest first), truncating at `cap`.
    pub fn record_post(&mut self, content: impl Into<String>, cap: usize) {
        self.post_history.insert(0, content.into());
        self.post_history.truncate(cap);
    }

    /// Get or lazily create the relationship toward `handle`.
    pub fn relationship_mut(&mut self, handle: &str) -> &mut Relationship {
        self.relationships.entry(handle.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_evicts_least_important() {
        let mut record = MemoryRecord::default();
        record.remember(MemoryEntry::new("trivial", 1), 2);
        record.remember(MemoryEntry::new("notable", 3), 2);
        record.remember(MemoryEntry::new("critical", 5), 2);

        assert_eq!(record.long_term.len(), 2);
        assert!(record.long_term.iter().all(|m| m.content != "trivial"));
    }

    #[test]
    fn record_event_evicts_oldest() {
        let mut record = MemoryRecord::default();
        for i in 0..5 {
            record.record_event(MemoryEntry::new(format!("event {i}"), 2), 3);
        }
        assert_eq!(record.recent_events.len(), 3);
        assert_eq!(record.recent_events[0].content, "event 2");
    }

    #[test]
    fn post_history_is_newest_first_and_bounded() {
        let mut record = MemoryRecord::default();
        for i in 0..4 {
            record.record_post(format!("post {i}"), 3);
        }
        assert_eq!(record.post_history, vec!["post 3", "post 2", "post 1"]);
    }

    #[test]
    fn relationship_interactions_stay_bounded() {
        let mut rel = Relationship::default();
        for i in 0..15 {
            rel.record_interaction(format!("interaction {i}"));
        }
        assert_eq!(rel.recent_interactions.len(), RELATIONSHIP_INTERACTION_CAP);
        assert_eq!(rel.recent_interactions[0], "interaction 5");
        assert!(rel.familiarity <= 1.0);
    }

    #[test]
    fn importance_is_clamped() {
        assert_eq!(MemoryEntry::new("x", 0).importance, 1);
        assert_eq!(MemoryEntry::new("x", 9).importance, 5);
    }
}
