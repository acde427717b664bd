//! Redis-backed fast cache
//!
//! - Key: `prefix + session_key` (default prefix: "sess:")
//! - Value: the serialized attribute blob, stored as-is
//! - TTL: applied on every write when configured

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;

use super::FastCache;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::key::SessionKey;

/// Redis session cache
///
/// # Example
///
/// ```rust,ignore
/// use session_keystore::RedisCache;
///
/// let client = redis::Client::open("redis://127.0.0.1/")?;
/// let cache = RedisCache::new(client).await?;
/// ```
pub struct RedisCache {
    conn: Arc<ConnectionManager>,
    prefix: String,
    ttl_secs: Option<u64>,
}

impl RedisCache {
    /// Create a new Redis cache with default settings
    ///
    /// - Prefix: "sess:"
    /// - TTL: 86400 seconds (1 day)
    pub async fn new(client: redis::Client) -> Result<Self> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::from_connection_manager(conn))
    }

    /// Create a new Redis cache from a connection string
    pub async fn from_url(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            SessionError::StoreUnavailable(format!("Failed to create Redis client: {}", e))
        })?;
        Self::new(client).await
    }

    /// Create a new Redis cache from an existing connection manager
    pub fn from_connection_manager(conn: ConnectionManager) -> Self {
        Self {
            conn: Arc::new(conn),
            prefix: "sess:".to_string(),
            ttl_secs: Some(86400),
        }
    }

    /// Take prefix and TTL from a [`SessionConfig`]
    pub fn with_config(mut self, config: &SessionConfig) -> Self {
        self.prefix = config.cache_prefix.clone();
        self.ttl_secs = config.cache_ttl_secs();
        self
    }

    /// Build with custom prefix
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Build with custom TTL in seconds. None or 0 stores entries without expiry.
    pub fn with_ttl(mut self, ttl_secs: impl Into<Option<u64>>) -> Self {
        self.ttl_secs = ttl_secs.into();
        self
    }

    /// Make a cache key from a session key
    fn make_key(&self, key: &SessionKey) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl Clone for RedisCache {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            prefix: self.prefix.clone(),
            ttl_secs: self.ttl_secs,
        }
    }
}

#[async_trait]
impl FastCache for RedisCache {
    async fn get(&self, key: &SessionKey) -> Result<Option<Vec<u8>>> {
        let mut conn = (*self.conn).clone();
        let blob: Option<Vec<u8>> = conn.get(self.make_key(key)).await?;
        Ok(blob)
    }

    async fn set(&self, key: &SessionKey, blob: &[u8]) -> Result<()> {
        let cache_key = self.make_key(key);
        let mut conn = (*self.conn).clone();

        match self.ttl_secs {
            Some(ttl) if ttl > 0 => conn.set_ex::<_, _, ()>(&cache_key, blob, ttl).await?,
            _ => conn.set::<_, _, ()>(&cache_key, blob).await?,
        }

        Ok(())
    }

    async fn delete(&self, key: &SessionKey) -> Result<()> {
        let mut conn = (*self.conn).clone();
        conn.del::<_, ()>(self.make_key(key)).await?;
        Ok(())
    }
}
