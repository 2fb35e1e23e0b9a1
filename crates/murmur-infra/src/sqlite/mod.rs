//! SQLite-backed persistence.

pub mod kv;
pub mod pool;

pub use kv::SqliteKvStore;
pub use pool::StorePool;
