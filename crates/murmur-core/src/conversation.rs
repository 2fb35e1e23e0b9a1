//! Conversation context resolution.
//!
//! Walks a reply chain upward from a seed item, assembling a chronological
//! transcript for the content generator. The walk is bounded by a maximum
//! depth and a visited-ID set, so a cyclic or absurdly long chain can never
//! cause unbounded work. Ancestor fetch failures are swallowed: partial
//! context is acceptable, total failure is not.

use tracing::{debug, warn};

use murmur_types::agent::Agent;
use murmur_types::item::{Item, Transcript, TranscriptTurn, TurnRole};

use crate::network::SocialNetwork;

use std::collections::HashSet;

/// Which side of the conversation an item belongs to, from the agent's view.
pub fn turn_role(agent: &Agent, item: &Item) -> TurnRole {
    if item.author_id == agent.id.as_str() || agent.matches_handle(&item.author_handle) {
        TurnRole::Agent
    } else {
        TurnRole::User
    }
}

fn to_turn(agent: &Agent, item: &Item) -> TranscriptTurn {
    TranscriptTurn {
        role: turn_role(agent, item),
        content: item.content.clone(),
        timestamp: item.created_at,
    }
}

/// Resolve the reply chain behind `seed` into an oldest-first transcript.
///
/// At most `max_depth` ancestors are fetched, so the result holds at most
/// `max_depth + 1` turns including the seed itself.
pub async fn resolve_transcript<N: SocialNetwork>(
    network: &N,
    agent: &Agent,
    seed: &Item,
    max_depth: usize,
) -> Transcript {
    let mut turns = vec![to_turn(agent, seed)];
    let mut visited: HashSet<_> = [seed.id.clone()].into();
    let mut cursor = seed.reply_to_id.clone();

    for depth in 0..max_depth {
        let Some(parent_id) = cursor else { break };

        if !visited.insert(parent_id.clone()) {
            warn!(item = %parent_id, depth, "reply chain cycles back on itself");
            break;
        }

        let parent = match network.fetch_item(&parent_id).await {
            Ok(item) => item,
            Err(e) => {
                // Partial context is fine; keep what we have.
                debug!(item = %parent_id, depth, error = %e, "ancestor fetch failed");
                break;
            }
        };

        turns.push(to_turn(agent, &parent));
        cursor = parent.reply_to_id;
    }

    turns.sort_by_key(|turn| turn.timestamp);
    turns
}
