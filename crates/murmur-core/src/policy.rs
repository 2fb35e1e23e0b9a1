//! Behavior policy: mapping a stimulus to an action.
//!
//! Stateless, same pattern as the memory and retry handlers elsewhere in
//! the codebase: all logic lives in associated functions taking the agent
//! configuration as a parameter. Randomness comes in through `&mut impl
//! Rng` so decisions are reproducible under test.
//!
//! Two deliberate asymmetries, both product tuning rather than bugs:
//! a direct address always gets a reply (silence on a direct mention reads
//! as broken, not in-character), and quote suggestions pass their gate at
//! only half the configured probability (replies are preferred over quotes).

use rand::Rng;

use murmur_types::agent::Agent;
use murmur_types::item::{Item, ReactionKind, ReactionSuggestion};

/// Quote suggestions are accepted at `quote_probability * QUOTE_DAMPENING`.
pub const QUOTE_DAMPENING: f64 = 0.5;

/// The gated outcome of a policy decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Reply in-thread. `draft` carries the generator's suggested text for
    /// passive stimuli; `None` for direct mentions, where the reply is
    /// generated against the resolved transcript instead.
    Reply { draft: Option<String> },
    Quote { draft: Option<String> },
    Like,
    Ignore,
}

/// Stateless decision function over agent probabilities.
pub struct BehaviorPolicy;

impl BehaviorPolicy {
    /// Whether the item directly addresses the agent: an explicit mention
    /// flag from the network, or the agent's handle appearing in the text.
    pub fn is_direct_address(agent: &Agent, item: &Item) -> bool {
        if item.is_direct_mention {
            return true;
        }
        let needle = format!("@{}", agent.handle).to_lowercase();
        item.content.to_lowercase().contains(&needle)
    }

    /// Decide what to do about a stimulus.
    ///
    /// Direct addresses bypass every probability gate. Passive stimuli gate
    /// the generator's suggested action behind the agent's configured
    /// probability for that action kind; each gate is an independent
    /// Bernoulli draw, fresh per decision. A failed gate downgrades to
    /// `Ignore`.
    pub fn decide(
        agent: &Agent,
        item: &Item,
        suggestion: &ReactionSuggestion,
        rng: &mut impl Rng,
    ) -> PolicyDecision {
        if Self::is_direct_address(agent, item) {
            return PolicyDecision::Reply { draft: None };
        }

        let behavior = &agent.behavior;
        match suggestion.action {
            ReactionKind::Reply => {
                if rng.gen_bool(clamp_probability(behavior.reply_probability)) {
                    PolicyDecision::Reply {
                        draft: suggestion.content.clone(),
                    }
                } else {
                    PolicyDecision::Ignore
                }
            }
            ReactionKind::Quote => {
                let gated = clamp_probability(behavior.quote_probability * QUOTE_DAMPENING);
                if rng.gen_bool(gated) {
                    PolicyDecision::Quote {
                        draft: suggestion.content.clone(),
                    }
                } else {
                    PolicyDecision::Ignore
                }
            }
            ReactionKind::Like => {
                if rng.gen_bool(clamp_probability(behavior.like_probability)) {
                    PolicyDecision::Like
                } else {
                    PolicyDecision::Ignore
                }
            }
            ReactionKind::Ignore => PolicyDecision::Ignore,
        }
    }
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}
