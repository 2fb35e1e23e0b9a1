//! Per-agent mention polling.
//!
//! Each agent runs one watcher task: on every poll tick it skips the fetch
//! while the agent is cooling down, otherwise asks the network for
//! mentions newer than its persisted watermark and feeds each one to the
//! reaction pipeline (which handles self-filtering and deduplication).
//! Teardown is a cancellation token; results of a poll racing shutdown are
//! discarded rather than processed.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use murmur_types::agent::{Agent, AgentId};
use murmur_types::item::ItemId;

use crate::backoff::ErrorBackoff;
use crate::generate::ContentGenerator;
use crate::network::SocialNetwork;
use crate::pipeline::ReactionPipeline;
use crate::storage::KvStore;

use dashmap::DashMap;

fn since_key(agent: &AgentId) -> String {
    format!("mentions:since:{agent}")
}

/// Watcher wiring shared by all agents' poll loops.
pub struct WatcherContext<N, G, S> {
    pub network: Arc<N>,
    pub store: Arc<S>,
    pub pipeline: Arc<ReactionPipeline<N, G, S>>,
    pub backoff: Arc<ErrorBackoff>,
    pub agents: Arc<DashMap<AgentId, Agent>>,
    pub poll_interval: std::time::Duration,
    pub batch: usize,
}

/// Spawn the mention poll loop for one agent.
///
/// The loop reads the agent fresh from the registry on every tick so mood
/// and state changes applied by event listeners are visible immediately.
pub fn spawn_mention_watcher<N, G, S>(
    ctx: Arc<WatcherContext<N, G, S>>,
    agent_id: AgentId,
    token: CancellationToken,
) -> JoinHandle<()>
where
    N: SocialNetwork + Send + Sync + 'static,
    G: ContentGenerator + Send + Sync + 'static,
    S: KvStore + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let key = since_key(&agent_id);
        let mut since: Option<ItemId> = match ctx.store.get(&key).await {
            Ok(value) => value.and_then(|v| serde_json::from_value(v).ok()),
            Err(e) => {
                warn!(agent = %agent_id, error = %e, "failed to load mention watermark");
                None
            }
        };

        let mut ticker = tokio::time::interval(ctx.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(agent = %agent_id, interval = ?ctx.poll_interval, "mention watcher started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if ctx.backoff.is_cooling_down(&agent_id, Utc::now()) {
                debug!(agent = %agent_id, "cooling down, skipping mention poll");
                continue;
            }

            let Some(agent) = ctx.agents.get(&agent_id).map(|entry| entry.clone()) else {
                warn!(agent = %agent_id, "agent removed from registry, stopping watcher");
                break;
            };

            let mentions = match ctx
                .network
                .fetch_mentions_since(&agent_id, since.as_ref(), ctx.batch)
                .await
            {
                Ok(mentions) => {
                    ctx.backoff.record_success(&agent_id);
                    mentions
                }
                Err(e) => {
                    ctx.backoff.record_error(&agent_id, &e);
                    continue;
                }
            };

            // A poll that raced shutdown completes, but its results are
            // discarded.
            if token.is_cancelled() {
                break;
            }

            for item in mentions {
                since = Some(item.id.clone());
                let outcome = ctx.pipeline.handle_item(&agent, &item).await;
                debug!(agent = %agent_id, item = %item.id, ?outcome, "mention processed");
                if token.is_cancelled() {
                    break;
                }
            }

            if let Some(id) = &since {
                if let Err(e) = ctx.store.put(&key, &json!(id)).await {
                    warn!(agent = %agent_id, error = %e, "failed to persist mention watermark");
                }
            }
        }

        info!(agent = %agent_id, "mention watcher stopped");
    })
}
