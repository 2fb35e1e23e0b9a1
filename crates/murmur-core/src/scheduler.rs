//! Autonomous post scheduling with naturalistic jitter.
//!
//! Each agent carries exactly one pending deadline in the scheduler; a
//! fixed-interval tick (owned by the runtime) asks for due agents and
//! reschedules immediately, so a generation or publish failure can never
//! leave an agent without a next post time.

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use dashmap::DashMap;
use rand::Rng;
use tracing::debug;

use murmur_types::agent::{Agent, AgentId, BehaviorConfig};

use std::time::Duration;

/// Upper bound on the optional extra jitter (five minutes).
const EXTRA_JITTER_MS: f64 = 5.0 * 60.0 * 1000.0;

/// Compute the jittered interval until the agent's next autonomous post.
///
/// Base is uniform between the configured min/max hours. During the agent's
/// peak posting hours the interval shrinks (x0.70..0.90); off-peak it
/// stretches (x1.10..1.30). Half the time an extra 0-5 minutes of jitter is
/// added. The result is clamped back into the configured bounds, so the
/// cadence looks organic while never violating them.
pub fn next_interval(behavior: &BehaviorConfig, hour: u32, rng: &mut impl Rng) -> Duration {
    let min_ms = behavior.min_hours_between_posts * 3_600_000.0;
    let max_ms = behavior.max_hours_between_posts * 3_600_000.0;

    let base = rng.gen_range(min_ms..=max_ms);
    let peak = behavior.peak_posting_hours.contains(&(hour as u8));
    let scale = if peak {
        rng.gen_range(0.70..=0.90)
    } else {
        rng.gen_range(1.10..=1.30)
    };

    let mut interval = base * scale;
    if rng.gen_bool(0.5) {
        interval += rng.gen_range(0.0..=EXTRA_JITTER_MS);
    }

    Duration::from_millis(interval.clamp(min_ms, max_ms) as u64)
}

/// Per-agent next-post deadlines.
pub struct PostScheduler {
    deadlines: DashMap<AgentId, DateTime<Utc>>,
}

impl PostScheduler {
    pub fn new() -> Self {
        Self {
            deadlines: DashMap::new(),
        }
    }

    /// Compute and store the agent's next deadline, returning it.
    pub fn schedule_next(
        &self,
        agent: &Agent,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> DateTime<Utc> {
        let interval = next_interval(&agent.behavior, now.hour(), rng);
        let due_at = now
            + ChronoDuration::milliseconds(
                i64::try_from(interval.as_millis()).unwrap_or(i64::MAX),
            );
        self.deadlines.insert(agent.id.clone(), due_at);
        debug!(agent = %agent.id, due_at = %due_at, "next post scheduled");
        due_at
    }

    /// Agents whose deadline has passed.
    pub fn due_agents(&self, now: DateTime<Utc>) -> Vec<AgentId> {
        self.deadlines
            .iter()
            .filter(|entry| *entry.value() <= now)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn due_at(&self, agent: &AgentId) -> Option<DateTime<Utc>> {
        self.deadlines.get(agent).map(|entry| *entry.value())
    }

    /// Drop the agent's pending deadline (agent teardown).
    pub fn remove(&self, agent: &AgentId) {
        self.deadlines.remove(agent);
    }
}

impl Default for PostScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_agent;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn behavior(min_hours: f64, max_hours: f64, peak: Vec<u8>) -> BehaviorConfig {
        BehaviorConfig {
            min_hours_between_posts: min_hours,
            max_hours_between_posts: max_hours,
            peak_posting_hours: peak,
            ..BehaviorConfig::default()
        }
    }

    #[test]
    fn interval_stays_within_bounds_across_many_trials() {
        let config = behavior(2.0, 8.0, vec![12, 13, 14]);
        let min = Duration::from_millis((2.0 * 3_600_000.0) as u64);
        let max = Duration::from_millis((8.0 * 3_600_000.0) as u64);

        let mut rng = StdRng::seed_from_u64(99);
        for trial in 0..10_000 {
            let hour = trial % 24;
            let interval = next_interval(&config, hour, &mut rng);
            assert!(
                interval >= min && interval <= max,
                "trial {trial} at hour {hour}: {interval:?} out of bounds"
            );
        }
    }

    #[test]
    fn peak_hours_skew_shorter_than_off_peak() {
        let config = behavior(2.0, 8.0, vec![12]);
        let mut rng = StdRng::seed_from_u64(7);

        let average = |hour: u32, rng: &mut StdRng| -> f64 {
            let total: u128 = (0..2_000)
                .map(|_| next_interval(&config, hour, rng).as_millis())
                .sum();
            total as f64 / 2_000.0
        };

        let peak_avg = average(12, &mut rng);
        let off_peak_avg = average(3, &mut rng);
        assert!(
            peak_avg < off_peak_avg,
            "peak {peak_avg} should be below off-peak {off_peak_avg}"
        );
    }

    #[test]
    fn schedule_next_always_leaves_a_pending_deadline() {
        let scheduler = PostScheduler::new();
        let agent = test_agent("bot1");
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(7);

        let due = scheduler.schedule_next(&agent, now, &mut rng);
        assert!(due > now);
        assert_eq!(scheduler.due_at(&agent.id), Some(due));
    }

    #[test]
    fn due_agents_reports_only_past_deadlines() {
        let scheduler = PostScheduler::new();
        let mut rng = StdRng::seed_from_u64(7);
        let early = test_agent("early");
        let late = test_agent("late");
        let now = Utc::now();

        scheduler.schedule_next(&early, now - ChronoDuration::hours(24), &mut rng);
        scheduler.schedule_next(&late, now, &mut rng);

        let due = scheduler.due_agents(now);
        assert_eq!(due, vec![early.id.clone()]);

        scheduler.remove(&early.id);
        assert!(scheduler.due_agents(now).is_empty());
    }
}
