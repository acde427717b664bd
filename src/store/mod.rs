//! Storage adapters: the durable store and the fast cache

mod memory;
mod traits;

pub use memory::{MemoryCache, MemoryStore};
pub use traits::{DurableStore, FastCache};

#[cfg(feature = "redis-store")]
mod redis_cache;

#[cfg(feature = "redis-store")]
pub use redis_cache::RedisCache;

#[cfg(feature = "sqlite-store")]
mod sqlite;

#[cfg(feature = "sqlite-store")]
pub use sqlite::SqliteStore;
