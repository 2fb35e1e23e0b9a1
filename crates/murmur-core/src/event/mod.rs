//! Prioritized event dispatch for internally generated events.

pub mod queue;

pub use queue::{EventQueue, ListenerFuture};
