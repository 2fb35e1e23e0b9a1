//! The runtime context object.
//!
//! `Runtime` owns every per-agent registry — the agent map, scheduler
//! deadlines, backoff counters, watcher handles — as explicit state passed
//! to components, never ambient module globals, so multiple isolated
//! runtimes can coexist in one process (tests do exactly that). It wires
//! the event queue listeners, drives the post scheduler tick, and spawns
//! one mention watcher per agent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use murmur_types::agent::{Agent, AgentId};
use murmur_types::config::RuntimeConfig;
use murmur_types::error::{ConfigError, NetworkError};
use murmur_types::event::EventKind;

use crate::backoff::ErrorBackoff;
use crate::dedup::DedupStore;
use crate::event::EventQueue;
use crate::generate::ContentGenerator;
use crate::memory::MemoryStore;
use crate::network::{PublishOptions, SocialNetwork};
use crate::pipeline::{ReactionPipeline, render};
use crate::scheduler::PostScheduler;
use crate::storage::KvStore;
use crate::watcher::{WatcherContext, spawn_mention_watcher};

/// One isolated agent runtime: registries, queue, scheduler, pipeline.
pub struct Runtime<N, G, S> {
    config: RuntimeConfig,
    agents: Arc<DashMap<AgentId, Agent>>,
    network: Arc<N>,
    generator: Arc<G>,
    store: Arc<S>,
    queue: Arc<EventQueue>,
    scheduler: Arc<PostScheduler>,
    backoff: Arc<ErrorBackoff>,
    memory: Arc<MemoryStore<S>>,
    pipeline: Arc<ReactionPipeline<N, G, S>>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<N, G, S> Runtime<N, G, S>
where
    N: SocialNetwork + Send + Sync + 'static,
    G: ContentGenerator + Send + Sync + 'static,
    S: KvStore + Send + Sync + 'static,
{
    /// Build a runtime from configuration.
    ///
    /// A single invalid agent section skips that agent with a warning;
    /// an empty resulting agent set aborts startup, since a runtime with
    /// nothing to run cannot be what the operator intended.
    pub async fn from_config(
        config: RuntimeConfig,
        network: N,
        generator: G,
        store: S,
    ) -> Result<Arc<Self>, ConfigError> {
        let network = Arc::new(network);
        let generator = Arc::new(generator);
        let store = Arc::new(store);

        let agents: Arc<DashMap<AgentId, Agent>> = Arc::new(DashMap::new());
        let memory = Arc::new(MemoryStore::new(store.clone(), &config));
        let dedup = Arc::new(DedupStore::new(store.clone(), config.dedup_cap));
        let backoff = Arc::new(ErrorBackoff::new());
        let scheduler = Arc::new(PostScheduler::new());

        if let Err(e) = dedup.load().await {
            warn!(error = %e, "failed to rehydrate dedup store, starting empty");
        }

        let now = Utc::now();
        for agent_config in &config.agents {
            let agent = match agent_config.build() {
                Ok(agent) => agent,
                Err(e) => {
                    warn!(error = %e, "skipping misconfigured agent");
                    continue;
                }
            };
            if let Err(e) = memory.seed(&agent.id, agent_config.seed_memories()).await {
                warn!(agent = %agent.id, error = %e, "failed to seed core memories");
            }
            {
                let mut rng = rand::thread_rng();
                scheduler.schedule_next(&agent, now, &mut rng);
            }
            info!(agent = %agent.id, handle = %agent.handle, "agent registered");
            agents.insert(agent.id.clone(), agent);
        }

        if agents.is_empty() {
            return Err(ConfigError::NoAgents);
        }

        let pipeline = Arc::new(ReactionPipeline::new(
            network.clone(),
            generator.clone(),
            dedup,
            memory.clone(),
            backoff.clone(),
        ));

        let runtime = Arc::new(Self {
            config,
            agents,
            network,
            generator,
            store,
            queue: Arc::new(EventQueue::new()),
            scheduler,
            backoff,
            memory,
            pipeline,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        });
        runtime.register_listeners();
        Ok(runtime)
    }

    /// Wire the built-in event listeners onto the queue.
    fn register_listeners(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.queue.on(EventKind::MoodShift, move |event| {
            let weak = weak.clone();
            Box::pin(async move {
                let Some(rt) = weak.upgrade() else { return Ok(()) };
                let delta = |axis: &str| event.payload[axis].as_f64().unwrap_or(0.0) as f32;
                let (valence, arousal, dominance) =
                    (delta("valence"), delta("arousal"), delta("dominance"));
                for mut entry in rt.agents.iter_mut() {
                    if event.addresses(entry.key()) {
                        entry.mood.shift(valence, arousal, dominance);
                        debug!(agent = %entry.key(), mood = ?entry.mood, "mood shifted");
                    }
                }
                Ok(())
            })
        });

        let weak = Arc::downgrade(self);
        self.queue.on(EventKind::InteractionPrompt, move |event| {
            let weak = weak.clone();
            Box::pin(async move {
                let Some(rt) = weak.upgrade() else { return Ok(()) };
                let Some(item_id) = event.payload["item_id"].as_str() else {
                    warn!(event_id = %event.id, "interaction prompt without item_id");
                    return Ok(());
                };
                let item_id = murmur_types::item::ItemId::new(item_id);
                let item = match rt.network.fetch_item(&item_id).await {
                    Ok(item) => item,
                    Err(e) => {
                        warn!(item = %item_id, error = %e, "could not fetch interaction item");
                        return Ok(());
                    }
                };
                let now = Utc::now();
                let interested: Vec<Agent> = rt
                    .agents
                    .iter()
                    .filter(|entry| {
                        event.addresses(entry.key())
                            && !rt.backoff.is_cooling_down(entry.key(), now)
                    })
                    .map(|entry| entry.clone())
                    .collect();
                for agent in interested {
                    let outcome = rt.pipeline.handle_item(&agent, &item).await;
                    debug!(agent = %agent.id, item = %item.id, ?outcome, "interaction prompt handled");
                }
                Ok(())
            })
        });

        let weak = Arc::downgrade(self);
        self.queue.on(EventKind::News, move |event| {
            let weak = weak.clone();
            Box::pin(async move {
                let Some(rt) = weak.upgrade() else { return Ok(()) };
                let headline = event.payload["headline"].as_str().map(str::to_string);
                let targeted: Vec<AgentId> = rt
                    .agents
                    .iter()
                    .filter(|entry| event.addresses(entry.key()))
                    .map(|entry| entry.key().clone())
                    .collect();
                for agent_id in targeted {
                    rt.create_post(&agent_id, headline.as_deref()).await;
                }
                Ok(())
            })
        });
    }

    /// Spawn the recurring tasks: scheduler tick, scheduled-event
    /// promotion, and one mention watcher per agent.
    pub async fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock().await;

        let weak = Arc::downgrade(self);
        let token = self.shutdown.clone();
        let tick = std::time::Duration::from_secs(self.config.scheduler_tick_secs.max(1));
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(rt) = weak.upgrade() else { break };
                rt.run_due_posts(Utc::now()).await;
            }
        }));

        let weak = Arc::downgrade(self);
        let token = self.shutdown.clone();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(rt) = weak.upgrade() else { break };
                rt.queue.promote_due(Utc::now()).await;
            }
        }));

        let watcher_ctx = Arc::new(WatcherContext {
            network: self.network.clone(),
            store: self.store.clone(),
            pipeline: self.pipeline.clone(),
            backoff: self.backoff.clone(),
            agents: self.agents.clone(),
            poll_interval: std::time::Duration::from_secs(self.config.poll_interval_secs.max(1)),
            batch: self.config.mention_batch,
        });
        for entry in self.agents.iter() {
            tasks.push(spawn_mention_watcher(
                watcher_ctx.clone(),
                entry.key().clone(),
                self.shutdown.child_token(),
            ));
        }

        info!(agents = self.agents.len(), "runtime started");
    }

    /// Fire autonomous posts for every agent whose deadline has passed,
    /// rescheduling each one first so no failure can leave an agent
    /// without a pending deadline.
    pub async fn run_due_posts(self: &Arc<Self>, now: DateTime<Utc>) {
        for agent_id in self.scheduler.due_agents(now) {
            let Some(agent) = self.agents.get(&agent_id).map(|entry| entry.clone()) else {
                self.scheduler.remove(&agent_id);
                continue;
            };
            {
                let mut rng = rand::thread_rng();
                self.scheduler.schedule_next(&agent, now, &mut rng);
            }
            self.create_post(&agent_id, None).await;
        }
    }

    /// Generate and publish one autonomous post for the agent.
    ///
    /// Skipped during cooldown. All failures are logged and swallowed;
    /// the scheduler has already advanced, so there is no tight error loop.
    pub async fn create_post(&self, agent_id: &AgentId, hint: Option<&str>) {
        let now = Utc::now();
        if self.backoff.is_cooling_down(agent_id, now) {
            debug!(agent = %agent_id, "cooling down, skipping autonomous post");
            return;
        }
        let Some(agent) = self.agents.get(agent_id).map(|entry| entry.clone()) else {
            warn!(agent = %agent_id, "create_post for unknown agent");
            return;
        };

        let text = match self.generator.generate_post(&agent, hint).await {
            Ok(text) => text,
            Err(e) => {
                warn!(agent = %agent_id, error = %e, "post generation failed");
                return;
            }
        };
        let Some(text) = render(&agent.style, &text) else {
            warn!(agent = %agent_id, "generated post was empty after cleanup");
            return;
        };

        match self
            .network
            .publish(agent_id, &text, PublishOptions::default())
            .await
        {
            Ok(published) => {
                self.backoff.record_success(agent_id);
                if let Err(e) = self.memory.record_post(agent_id, &text).await {
                    warn!(agent = %agent_id, error = %e, "failed to record post history");
                }
                if let Some(mut entry) = self.agents.get_mut(agent_id) {
                    entry.last_post_time = Some(now);
                }
                info!(agent = %agent_id, item = %published.id, "autonomous post published");
            }
            Err(NetworkError::DuplicateContent) => {
                info!(agent = %agent_id, "post rejected as duplicate content, skipping");
            }
            Err(e) => {
                self.backoff.record_error(agent_id, &e);
                warn!(agent = %agent_id, error = %e, "autonomous post failed");
            }
        }
    }

    /// Stop all recurring tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "runtime task ended abnormally");
            }
        }
        info!("runtime stopped");
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn agents(&self) -> &Arc<DashMap<AgentId, Agent>> {
        &self.agents
    }

    pub fn pipeline(&self) -> &Arc<ReactionPipeline<N, G, S>> {
        &self.pipeline
    }

    pub fn scheduler(&self) -> &Arc<PostScheduler> {
        &self.scheduler
    }

    pub fn backoff(&self) -> &Arc<ErrorBackoff> {
        &self.backoff
    }

    pub fn memory(&self) -> &Arc<MemoryStore<S>> {
        &self.memory
    }
}
