//! Murmur core: the agent event & scheduling runtime.
//!
//! This crate owns all runtime behavior — jittered post scheduling,
//! the prioritized event queue, mention polling, conversation resolution,
//! the probabilistic behavior policy, the reaction pipeline, deduplication,
//! per-agent memory, and error backoff. External collaborators (the social
//! network, the content generator, persistence) are consumed through the
//! trait seams in [`network`], [`generate`], and [`storage`];
//! implementations live in `murmur-infra` or in test doubles.

pub mod backoff;
pub mod conversation;
pub mod dedup;
pub mod event;
pub mod generate;
pub mod memory;
pub mod network;
pub mod pipeline;
pub mod policy;
pub mod runtime;
pub mod scheduler;
pub mod storage;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;
