//! Per-agent consecutive-error backoff.
//!
//! Repeated external failures put an agent into an escalating cooldown
//! window during which its polling and posting are skipped outright — a
//! deliberate silence period, not a queued retry. One success resets the
//! ladder. Rate-limit-class errors force a 15-minute floor regardless of
//! how few errors preceded them.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

use murmur_types::agent::AgentId;
use murmur_types::error::NetworkError;

/// Cooldown ladder in minutes, indexed by consecutive error count.
const COOLDOWN_MINUTES: [i64; 5] = [1, 5, 15, 30, 60];

/// Minimum cooldown applied for rate-limit errors.
const RATE_LIMIT_FLOOR_MINUTES: i64 = 15;

#[derive(Debug, Default, Clone)]
struct BackoffState {
    consecutive: u32,
    cooldown_until: Option<DateTime<Utc>>,
}

/// Tracks consecutive external errors per agent and the resulting cooldowns.
#[derive(Default)]
pub struct ErrorBackoff {
    states: DashMap<AgentId, BackoffState>,
}

impl ErrorBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an external failure for the agent and return the cooldown
    /// window now in force.
    pub fn record_error(&self, agent: &AgentId, error: &NetworkError) -> Duration {
        self.record_error_at(agent, error, Utc::now())
    }

    /// Clock-injected variant of [`record_error`](Self::record_error).
    pub fn record_error_at(
        &self,
        agent: &AgentId,
        error: &NetworkError,
        now: DateTime<Utc>,
    ) -> Duration {
        let mut state = self.states.entry(agent.clone()).or_default();
        state.consecutive += 1;

        let tier = (state.consecutive as usize).min(COOLDOWN_MINUTES.len()) - 1;
        let mut minutes = COOLDOWN_MINUTES[tier];
        if error.is_rate_limit() {
            minutes = minutes.max(RATE_LIMIT_FLOOR_MINUTES);
        }

        let cooldown = Duration::minutes(minutes);
        state.cooldown_until = Some(now + cooldown);
        warn!(
            agent = %agent,
            consecutive = state.consecutive,
            cooldown_minutes = minutes,
            error = %error,
            "external error, entering cooldown"
        );
        cooldown
    }

    /// A single success clears the counter and any active cooldown.
    pub fn record_success(&self, agent: &AgentId) {
        if let Some(mut state) = self.states.get_mut(agent) {
            if state.consecutive > 0 {
                debug!(agent = %agent, "error streak cleared");
            }
            state.consecutive = 0;
            state.cooldown_until = None;
        }
    }

    /// Whether the agent's external calls are currently suppressed.
    pub fn is_cooling_down(&self, agent: &AgentId, now: DateTime<Utc>) -> bool {
        self.states
            .get(agent)
            .and_then(|state| state.cooldown_until)
            .is_some_and(|until| now < until)
    }

    pub fn consecutive_errors(&self, agent: &AgentId) -> u32 {
        self.states
            .get(agent)
            .map(|state| state.consecutive)
            .unwrap_or(0)
    }
}
