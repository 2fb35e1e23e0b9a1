//! SocialNetwork trait definition.
//!
//! The narrow seam between the runtime and the external social network.
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).
//! Implementations live outside this crate; the runtime only needs the
//! four operations below and treats every failure as non-fatal.

use murmur_types::agent::AgentId;
use murmur_types::error::NetworkError;
use murmur_types::item::{Item, ItemId};

/// Threading options for a publish call.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Publish as a reply to this item. The network threads the reply;
    /// the content must not re-address the author.
    pub reply_to: Option<ItemId>,
    /// Publish as a quote of this item.
    pub quote_of: Option<ItemId>,
}

impl PublishOptions {
    pub fn reply_to(item: &ItemId) -> Self {
        Self {
            reply_to: Some(item.clone()),
            quote_of: None,
        }
    }

    pub fn quote_of(item: &ItemId) -> Self {
        Self {
            reply_to: None,
            quote_of: Some(item.clone()),
        }
    }
}

/// Trait for the external social network collaborator.
pub trait SocialNetwork: Send + Sync {
    /// Fetch a single item by ID. Fails with `NetworkError::NotFound`
    /// when the item no longer exists.
    fn fetch_item(
        &self,
        id: &ItemId,
    ) -> impl std::future::Future<Output = Result<Item, NetworkError>> + Send;

    /// Fetch mentions of the agent newer than `since`, oldest first,
    /// at most `limit`. Implementations may return an empty list when
    /// rate-limited instead of an error.
    fn fetch_mentions_since(
        &self,
        agent: &AgentId,
        since: Option<&ItemId>,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Item>, NetworkError>> + Send;

    /// Publish content as the agent, optionally threaded as a reply or quote.
    fn publish(
        &self,
        agent: &AgentId,
        content: &str,
        opts: PublishOptions,
    ) -> impl std::future::Future<Output = Result<Item, NetworkError>> + Send;

    /// Like an item as the agent. Returns whether the like took effect.
    fn like(
        &self,
        agent: &AgentId,
        item: &ItemId,
    ) -> impl std::future::Future<Output = Result<bool, NetworkError>> + Send;
}
