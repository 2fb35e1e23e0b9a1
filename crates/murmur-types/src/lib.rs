//! Shared domain types for the Murmur agent runtime.
//!
//! This crate has no I/O and no business logic: it defines the data model
//! (agents, items, events, memory) and the error enums shared by
//! `murmur-core` and `murmur-infra`.

pub mod agent;
pub mod config;
pub mod error;
pub mod event;
pub mod item;
pub mod memory;
