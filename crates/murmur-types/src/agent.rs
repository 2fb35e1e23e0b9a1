//! Agent identity, behavior configuration, and mutable runtime state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Unique identifier for an agent persona, wrapping its configured slug.
///
/// Agent IDs are human-assigned in configuration ("luna", "newsbot"), not
/// generated, because they key persisted memory across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AgentId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

/// Per-agent posting and reaction behavior knobs.
///
/// Probabilities are independent Bernoulli gates drawn fresh per decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Lower bound on the interval between autonomous posts.
    #[serde(default = "default_min_hours")]
    pub min_hours_between_posts: f64,
    /// Upper bound on the interval between autonomous posts.
    #[serde(default = "default_max_hours")]
    pub max_hours_between_posts: f64,
    /// Wall-clock hours (0-23) during which the agent posts more often.
    #[serde(default)]
    pub peak_posting_hours: Vec<u8>,
    /// Chance of replying to a passive stimulus when suggested.
    #[serde(default = "default_reply_probability")]
    pub reply_probability: f64,
    /// Chance of quote-posting when suggested (halved again at decision time).
    #[serde(default = "default_quote_probability")]
    pub quote_probability: f64,
    /// Chance of liking when suggested.
    #[serde(default = "default_like_probability")]
    pub like_probability: f64,
    /// Maximum number of turns the agent will sustain in one thread.
    #[serde(default = "default_max_thread_length")]
    pub max_thread_length: usize,
    /// Maximum reply-chain ancestors fetched when resolving context.
    #[serde(default = "default_max_context_depth")]
    pub max_context_depth: usize,
}

fn default_min_hours() -> f64 {
    2.0
}

fn default_max_hours() -> f64 {
    8.0
}

fn default_reply_probability() -> f64 {
    0.5
}

fn default_quote_probability() -> f64 {
    0.2
}

fn default_like_probability() -> f64 {
    0.7
}

fn default_max_thread_length() -> usize {
    6
}

fn default_max_context_depth() -> usize {
    5
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            min_hours_between_posts: default_min_hours(),
            max_hours_between_posts: default_max_hours(),
            peak_posting_hours: Vec::new(),
            reply_probability: default_reply_probability(),
            quote_probability: default_quote_probability(),
            like_probability: default_like_probability(),
            max_thread_length: default_max_thread_length(),
            max_context_depth: default_max_context_depth(),
        }
    }
}

/// Output voice hints resolved generically by the pipeline.
///
/// Replaces per-agent special casing: formatting decisions come from
/// configuration fields, never from comparing agent IDs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleProfile {
    /// Lowercase all published text (the "never shouts" persona).
    #[serde(default)]
    pub force_lowercase: bool,
    #[serde(default)]
    pub tone: ToneHint,
}

/// Coarse tone hint passed through to the content generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneHint {
    #[default]
    Neutral,
    Warm,
    Formal,
    Chaotic,
}

/// Current emotional state in the valence/arousal/dominance model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Mood {
    /// Pleasantness, -1 (negative) to 1 (positive).
    pub valence: f32,
    /// Energy level, 0 (calm) to 1 (excited).
    pub arousal: f32,
    /// Sense of control, 0 (submissive) to 1 (dominant).
    pub dominance: f32,
}

impl Default for Mood {
    fn default() -> Self {
        Self {
            valence: 0.0,
            arousal: 0.4,
            dominance: 0.5,
        }
    }
}

impl Mood {
    /// Apply a shift to each axis, clamping to the model's bounds.
    pub fn shift(&mut self, valence: f32, arousal: f32, dominance: f32) {
        self.valence = (self.valence + valence).clamp(-1.0, 1.0);
        self.arousal = (self.arousal + arousal).clamp(0.0, 1.0);
        self.dominance = (self.dominance + dominance).clamp(0.0, 1.0);
    }
}

/// A configured autonomous persona.
///
/// Created once at load time from configuration; `last_post_time` and
/// `mood` mutate over the process lifetime, everything else is fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// The @handle this agent posts under on the network.
    pub handle: String,
    /// Short persona description fed to the content generator.
    pub description: String,
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub style: StyleProfile,
    #[serde(default)]
    pub last_post_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mood: Mood,
}

impl Agent {
    /// True when `handle` names this agent, ignoring case and a leading `@`.
    pub fn matches_handle(&self, handle: &str) -> bool {
        let other = handle.strip_prefix('@').unwrap_or(handle);
        self.handle.eq_ignore_ascii_case(other)
    }
}
