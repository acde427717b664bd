//! # session-keystore
//!
//! Maps an opaque, unguessable session key to a mapping of JSON attributes,
//! persisted in a durable store and served through a fast cache.
//!
//! ## Features
//!
//! - **Random 64-character keys** over letters and digits, checked for
//!   uniqueness against the durable store when a key is rotated
//! - **Two-tier storage**: reads try the cache first, writes go to both
//! - **Dirty tracking**: `save()` only writes when something changed
//! - **Lazy loading**: writes made before the first read are kept on load
//! - **Pluggable backends**: in-memory, Redis (cache), SQLite (durable), or
//!   your own [`DurableStore`] / [`FastCache`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use session_keystore::{Keystore, MemoryCache, MemoryStore, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> session_keystore::Result<()> {
//!     let keystore = Keystore::new(MemoryStore::new(), MemoryCache::new(), SessionConfig::new())?;
//!
//!     let mut session = keystore.new_session();
//!     let views: i32 = session.get("views").await?.unwrap_or(0);
//!     session.set("views", views + 1)?;
//!     session.save().await?;
//!
//!     // After login, move the session to a fresh key
//!     session.cycle_key().await?;
//!     println!("session key: {}", session.key());
//!     Ok(())
//! }
//! ```
//!
//! ## Consistency
//!
//! Sessions do not lock. Two sessions open on the same key that both save
//! race, and the last `save()` wins. Callers that need more must serialize
//! access per key themselves.

pub mod attributes;
pub mod config;
pub mod error;
pub mod key;
pub mod keystore;
pub mod record;
pub mod session;
pub mod store;

pub use attributes::Attributes;
pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use key::{KeyGenerator, SessionKey};
pub use keystore::Keystore;
pub use record::SessionRecord;
pub use session::Session;
pub use store::{DurableStore, FastCache, MemoryCache, MemoryStore};

#[cfg(feature = "redis-store")]
pub use store::RedisCache;

#[cfg(feature = "sqlite-store")]
pub use store::SqliteStore;
