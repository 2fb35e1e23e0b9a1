//! Internal events dispatched through the runtime's priority queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::agent::AgentId;

use std::fmt;

/// Categories of internally generated events.
///
/// External mentions do not flow through the queue; they are discovered by
/// the mention watcher and handed straight to the reaction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A news headline or topic agents may want to post about.
    News,
    /// A delta applied to the targeted agents' mood state.
    MoodShift,
    /// A prompt to react to another agent's timeline post.
    InteractionPrompt,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::News => write!(f, "news"),
            EventKind::MoodShift => write!(f, "mood_shift"),
            EventKind::InteractionPrompt => write!(f, "interaction_prompt"),
        }
    }
}

/// Dispatch priority. Higher priorities drain before anything lower,
/// regardless of enqueue order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EventPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// An event flowing through the runtime queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaEvent {
    pub id: Uuid,
    pub kind: EventKind,
    /// Free-form payload interpreted per kind (headline text, mood deltas,
    /// the item ID to react to, ...).
    pub payload: Value,
    /// Agents this event is addressed to. Empty means broadcast.
    pub targets: Vec<AgentId>,
    pub priority: EventPriority,
    pub created_at: DateTime<Utc>,
}

impl PersonaEvent {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            payload,
            targets: Vec::new(),
            priority: EventPriority::Normal,
            created_at: Utc::now(),
        }
    }

    pub fn with_targets(mut self, targets: Vec<AgentId>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }

    /// True when the event addresses the given agent (explicitly or by
    /// broadcast).
    pub fn addresses(&self, agent: &AgentId) -> bool {
        self.targets.is_empty() || self.targets.contains(agent)
    }
}
