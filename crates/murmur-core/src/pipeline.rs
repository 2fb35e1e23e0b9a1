//! Reaction pipeline: from incoming item to published reaction.
//!
//! Each item moves through self-check, dedup-check, then either the
//! mention path (direct address: resolve context, generate, publish) or
//! the reaction path (passive stimulus: classify, gate through the
//! behavior policy, execute). The dedup insert happens before any
//! externally observable side effect, so a duplicate delivery racing a
//! slow first delivery can never double-publish. Every external failure is
//! caught here and logged; nothing from this module crashes the process.

use std::sync::Arc;

use tracing::{debug, info, warn};

use murmur_types::agent::{Agent, StyleProfile};
use murmur_types::error::NetworkError;
use murmur_types::item::{Item, ItemId, Transcript, TurnRole};
use murmur_types::memory::MemoryEntry;

use crate::backoff::ErrorBackoff;
use crate::conversation::resolve_transcript;
use crate::dedup::DedupStore;
use crate::generate::ContentGenerator;
use crate::memory::MemoryStore;
use crate::network::{PublishOptions, SocialNetwork};
use crate::policy::{BehaviorPolicy, PolicyDecision};
use crate::storage::KvStore;

/// Hint handed to the generator when a mention asks about context the
/// agent does not have. The agent must never expose its missing context;
/// it answers with something fresh and engaging instead of asking for
/// clarification.
const FRESH_REPLY_HINT: &str =
    "Write a fresh, engaging standalone reply. Do not reference any earlier \
     post and do not ask what the other person is referring to.";

/// Terminal state of one item's trip through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The agent authored this item itself.
    DroppedSelf,
    /// The item was already processed.
    DroppedDuplicate,
    Replied(ItemId),
    Quoted(ItemId),
    Liked,
    /// The policy (or the generator's suggestion) chose to do nothing.
    Ignored,
    /// An external call failed; the item is consumed without a reaction.
    Skipped,
}

/// Orchestrates reactions to incoming items for all agents.
pub struct ReactionPipeline<N, G, S> {
    network: Arc<N>,
    generator: Arc<G>,
    dedup: Arc<DedupStore<S>>,
    memory: Arc<MemoryStore<S>>,
    backoff: Arc<ErrorBackoff>,
}

impl<N, G, S> ReactionPipeline<N, G, S>
where
    N: SocialNetwork,
    G: ContentGenerator,
    S: KvStore,
{
    pub fn new(
        network: Arc<N>,
        generator: Arc<G>,
        dedup: Arc<DedupStore<S>>,
        memory: Arc<MemoryStore<S>>,
        backoff: Arc<ErrorBackoff>,
    ) -> Self {
        Self {
            network,
            generator,
            dedup,
            memory,
            backoff,
        }
    }

    /// Run one item through the pipeline on behalf of `agent`.
    pub async fn handle_item(&self, agent: &Agent, item: &Item) -> PipelineOutcome {
        // An agent must never react to its own output.
        if item.author_id == agent.id.as_str() || agent.matches_handle(&item.author_handle) {
            debug!(agent = %agent.id, item = %item.id, "dropping self-authored item");
            return PipelineOutcome::DroppedSelf;
        }

        // Insert before doing anything observable so a concurrent duplicate
        // delivery cannot double-process.
        if !self.dedup.check_and_insert(&item.id).await {
            debug!(agent = %agent.id, item = %item.id, "dropping already-processed item");
            return PipelineOutcome::DroppedDuplicate;
        }

        if BehaviorPolicy::is_direct_address(agent, item) {
            self.handle_mention(agent, item).await
        } else {
            self.handle_passive(agent, item).await
        }
    }

    /// Direct address: resolve context, generate a reply, publish.
    async fn handle_mention(&self, agent: &Agent, item: &Item) -> PipelineOutcome {
        let transcript = resolve_transcript(
            self.network.as_ref(),
            agent,
            item,
            agent.behavior.max_context_depth,
        )
        .await;

        // The agent has already said its piece this many times in the
        // thread; let the conversation rest instead of going on forever.
        if thread_exhausted(agent, &transcript) {
            info!(agent = %agent.id, item = %item.id, "thread length limit reached, not extending");
            return PipelineOutcome::Ignored;
        }

        // Only the seed resolved and the user is asking what the agent is
        // talking about: answer fresh rather than admit the missing context.
        let generated = if transcript.len() <= 1 && asks_about_missing_context(&item.content) {
            info!(agent = %agent.id, item = %item.id, "suppressing missing-context confusion");
            self.generator.generate_post(agent, Some(FRESH_REPLY_HINT)).await
        } else {
            self.generator.generate_reply(agent, &transcript).await
        };

        let text = match generated {
            Ok(text) => text,
            Err(e) => {
                warn!(agent = %agent.id, item = %item.id, error = %e, "reply generation failed");
                return PipelineOutcome::Skipped;
            }
        };

        let Some(text) = render(&agent.style, &text) else {
            warn!(agent = %agent.id, item = %item.id, "generated reply was empty after cleanup");
            return PipelineOutcome::Skipped;
        };

        match self
            .network
            .publish(&agent.id, &text, PublishOptions::reply_to(&item.id))
            .await
        {
            Ok(published) => {
                self.backoff.record_success(&agent.id);
                self.remember_reaction(agent, item, &text, "replied to").await;
                PipelineOutcome::Replied(published.id)
            }
            Err(e) => self.handle_publish_error(agent, item, e),
        }
    }

    /// Passive stimulus: classify, gate, execute.
    async fn handle_passive(&self, agent: &Agent, item: &Item) -> PipelineOutcome {
        let suggestion = match self.generator.generate_reaction(agent, item).await {
            Ok(suggestion) => suggestion,
            Err(e) => {
                warn!(agent = %agent.id, item = %item.id, error = %e, "reaction classification failed");
                return PipelineOutcome::Skipped;
            }
        };

        let decision = {
            let mut rng = rand::thread_rng();
            BehaviorPolicy::decide(agent, item, &suggestion, &mut rng)
        };

        match decision {
            PolicyDecision::Reply { draft } => {
                let text = match draft {
                    Some(draft) => Ok(draft),
                    None => {
                        let transcript = resolve_transcript(
                            self.network.as_ref(),
                            agent,
                            item,
                            agent.behavior.max_context_depth,
                        )
                        .await;
                        if thread_exhausted(agent, &transcript) {
                            info!(agent = %agent.id, item = %item.id, "thread length limit reached, not extending");
                            return PipelineOutcome::Ignored;
                        }
                        self.generator.generate_reply(agent, &transcript).await
                    }
                };
                let text = match text {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(agent = %agent.id, item = %item.id, error = %e, "reply generation failed");
                        return PipelineOutcome::Skipped;
                    }
                };
                let Some(text) = render(&agent.style, &text) else {
                    return PipelineOutcome::Skipped;
                };
                match self
                    .network
                    .publish(&agent.id, &text, PublishOptions::reply_to(&item.id))
                    .await
                {
                    Ok(published) => {
                        self.backoff.record_success(&agent.id);
                        self.remember_reaction(agent, item, &text, "replied to").await;
                        PipelineOutcome::Replied(published.id)
                    }
                    Err(e) => self.handle_publish_error(agent, item, e),
                }
            }
            PolicyDecision::Quote { draft } => {
                let text = match draft {
                    Some(draft) => Ok(draft),
                    None => {
                        self.generator
                            .generate_post(agent, Some(item.content.as_str()))
                            .await
                    }
                };
                let text = match text {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(agent = %agent.id, item = %item.id, error = %e, "quote generation failed");
                        return PipelineOutcome::Skipped;
                    }
                };
                let Some(text) = render(&agent.style, &text) else {
                    return PipelineOutcome::Skipped;
                };
                match self
                    .network
                    .publish(&agent.id, &text, PublishOptions::quote_of(&item.id))
                    .await
                {
                    Ok(published) => {
                        self.backoff.record_success(&agent.id);
                        self.remember_reaction(agent, item, &text, "quoted").await;
                        PipelineOutcome::Quoted(published.id)
                    }
                    Err(e) => self.handle_publish_error(agent, item, e),
                }
            }
            PolicyDecision::Like => match self.network.like(&agent.id, &item.id).await {
                Ok(_) => {
                    self.backoff.record_success(&agent.id);
                    let note = format!("liked their post: {}", snippet(&suggestion.reasoning));
                    if let Err(e) = self
                        .memory
                        .update_relationship(&agent.id, &item.author_handle, |rel| {
                            rel.add_note(note);
                            rel.record_interaction(format!(
                                "liked: {}",
                                snippet(&item.content)
                            ));
                        })
                        .await
                    {
                        warn!(agent = %agent.id, error = %e, "failed to record like in memory");
                    }
                    PipelineOutcome::Liked
                }
                Err(e) => {
                    self.backoff.record_error(&agent.id, &e);
                    warn!(agent = %agent.id, item = %item.id, error = %e, "like failed");
                    PipelineOutcome::Skipped
                }
            },
            PolicyDecision::Ignore => {
                debug!(agent = %agent.id, item = %item.id, "policy chose to ignore");
                PipelineOutcome::Ignored
            }
        }
    }

    fn handle_publish_error(
        &self,
        agent: &Agent,
        item: &Item,
        error: NetworkError,
    ) -> PipelineOutcome {
        if matches!(error, NetworkError::DuplicateContent) {
            // The network already has identical content; skip, not an outage.
            info!(agent = %agent.id, item = %item.id, "publish rejected as duplicate content");
        } else {
            self.backoff.record_error(&agent.id, &error);
            warn!(agent = %agent.id, item = %item.id, error = %error, "publish failed");
        }
        PipelineOutcome::Skipped
    }

    /// Post-publish memory bookkeeping; failures are logged, never fatal.
    async fn remember_reaction(&self, agent: &Agent, item: &Item, text: &str, verb: &str) {
        if let Err(e) = self.memory.record_post(&agent.id, text).await {
            warn!(agent = %agent.id, error = %e, "failed to record post in history");
        }
        let interaction = format!("{verb}: {}", snippet(&item.content));
        if let Err(e) = self
            .memory
            .update_relationship(&agent.id, &item.author_handle, |rel| {
                rel.record_interaction(interaction);
            })
            .await
        {
            warn!(agent = %agent.id, error = %e, "failed to update relationship");
        }
        let event = MemoryEntry::new(format!("{verb} @{}", item.author_handle), 2);
        if let Err(e) = self.memory.record_event(&agent.id, event).await {
            warn!(agent = %agent.id, error = %e, "failed to record event memory");
        }
    }
}

/// Strip any leading "@handle" echoes from generated text. The network
/// already threads replies; re-addressing the author reads as robotic.
pub fn strip_leading_mentions(text: &str) -> &str {
    let mut rest = text.trim_start();
    while rest.starts_with('@') {
        match rest.find(char::is_whitespace) {
            Some(end) => {
                rest = rest[end..]
                    .trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == ':');
            }
            // The whole text was a single mention.
            None => return "",
        }
    }
    rest
}

/// Apply the agent's style profile; `None` when nothing publishable remains.
pub(crate) fn render(style: &StyleProfile, text: &str) -> Option<String> {
    let cleaned = strip_leading_mentions(text).trim();
    if cleaned.is_empty() {
        return None;
    }
    Some(if style.force_lowercase {
        cleaned.to_lowercase()
    } else {
        cleaned.to_string()
    })
}

/// Whether the agent has already contributed its configured maximum number
/// of turns to this thread.
fn thread_exhausted(agent: &Agent, transcript: &Transcript) -> bool {
    let agent_turns = transcript
        .iter()
        .filter(|turn| turn.role == TurnRole::Agent)
        .count();
    agent_turns >= agent.behavior.max_thread_length
}

/// Whether a mention reads like "what post are you talking about?".
fn asks_about_missing_context(content: &str) -> bool {
    let lower = content.to_lowercase();
    const PHRASES: [&str; 6] = [
        "what tweet",
        "what post",
        "which tweet",
        "which post",
        "what are you talking about",
        "what context",
    ];
    PHRASES.iter().any(|phrase| lower.contains(phrase))
}

fn snippet(text: &str) -> String {
    if text.chars().count() <= 80 {
        text.to_string()
    } else {
        let cut: String = text.chars().take(77).collect();
        format!("{cut}...")
    }
}
