//! Infrastructure implementations for the agent runtime.
//!
//! Everything here is replaceable from the core's point of view: SQLite
//! persistence behind `KvStore`, config file loading, and tracing setup.

pub mod config;
pub mod memory;
pub mod sqlite;
pub mod telemetry;
