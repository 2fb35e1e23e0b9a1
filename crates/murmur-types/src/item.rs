//! External network items (posts/mentions) and transcript turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

/// Opaque identifier assigned by the external network.
///
/// Unlike `AgentId`, these are never minted locally; they arrive on
/// fetched items and are echoed back on reply/quote/like calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A post or mention fetched from (or published to) the external network.
///
/// Immutable once fetched. `reply_to_id` points at the parent in a reply
/// chain and drives conversation resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub content: String,
    /// Network-assigned author identifier.
    pub author_id: String,
    /// The author's @handle (without the `@`).
    pub author_handle: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reply_to_id: Option<ItemId>,
    #[serde(default)]
    pub quote_of_id: Option<ItemId>,
    /// True when the item @-mentions the receiving agent directly.
    #[serde(default)]
    pub is_direct_mention: bool,
}

/// Who produced a transcript turn, from the resolving agent's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    Agent,
    User,
}

/// One entry in a resolved conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Chronologically ascending reconstruction of a reply chain.
///
/// Bounded by the resolver's max depth; may be partial when ancestor
/// fetches fail.
pub type Transcript = Vec<TranscriptTurn>;

/// What the content generator suggests doing about a passive stimulus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionSuggestion {
    pub action: ReactionKind,
    /// Draft text for reply/quote suggestions.
    #[serde(default)]
    pub content: Option<String>,
    /// The generator's one-line justification, kept for memory notes.
    #[serde(default)]
    pub reasoning: String,
}

/// The four reaction outcomes an agent can take on a stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Reply,
    Quote,
    Like,
    Ignore,
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactionKind::Reply => write!(f, "reply"),
            ReactionKind::Quote => write!(f, "quote"),
            ReactionKind::Like => write!(f, "like"),
            ReactionKind::Ignore => write!(f, "ignore"),
        }
    }
}
