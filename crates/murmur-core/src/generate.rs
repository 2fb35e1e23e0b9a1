//! ContentGenerator trait definition.
//!
//! The seam to the external LLM collaborator. The runtime never builds
//! prompts itself; it hands the generator an agent, conversation context,
//! or a stimulus item and consumes plain text or a reaction suggestion.

use murmur_types::agent::Agent;
use murmur_types::error::GenerateError;
use murmur_types::item::{Item, ReactionSuggestion, TranscriptTurn};

/// Trait for the external content generator (RPITIT, Rust 2024 edition).
pub trait ContentGenerator: Send + Sync {
    /// Generate a reply conditioned on the resolved conversation transcript.
    fn generate_reply(
        &self,
        agent: &Agent,
        transcript: &[TranscriptTurn],
    ) -> impl std::future::Future<Output = Result<String, GenerateError>> + Send;

    /// Generate a standalone post, optionally steered by a hint
    /// (a news headline, a topic, or a "fresh context-free reply" nudge).
    fn generate_post(
        &self,
        agent: &Agent,
        hint: Option<&str>,
    ) -> impl std::future::Future<Output = Result<String, GenerateError>> + Send;

    /// Classify a passive stimulus into a suggested reaction with
    /// justification. The behavior policy gates the suggestion afterwards.
    fn generate_reaction(
        &self,
        agent: &Agent,
        item: &Item,
    ) -> impl std::future::Future<Output = Result<ReactionSuggestion, GenerateError>> + Send;
}
