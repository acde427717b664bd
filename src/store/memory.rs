//! In-memory durable store and cache
//!
//! These are primarily for development and testing.
//! For production, back the cache with RedisCache and the durable side with
//! SqliteStore or your own [`DurableStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{DurableStore, FastCache};
use crate::error::Result;
use crate::key::SessionKey;
use crate::record::SessionRecord;

struct StoredRecord {
    data: Vec<u8>,
    created_at: DateTime<Utc>,
}

/// In-memory durable store
///
/// Warning: nothing here is actually durable:
/// - Records are lost on process restart
/// - Records are not shared across multiple processes
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<SessionKey, StoredRecord>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of persisted records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if no records are persisted
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Keys of all persisted records
    pub fn keys(&self) -> Vec<SessionKey> {
        self.records.read().keys().cloned().collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn exists(&self, key: &SessionKey) -> Result<bool> {
        Ok(self.records.read().contains_key(key))
    }

    async fn get_or_create(&self, key: &SessionKey) -> Result<SessionRecord> {
        let records = self.records.read();
        Ok(match records.get(key) {
            Some(stored) => {
                SessionRecord::restored(key.clone(), stored.data.clone(), stored.created_at)
            }
            None => SessionRecord::scaffold(key.clone()),
        })
    }

    async fn put(&self, record: &mut SessionRecord) -> Result<()> {
        let mut records = self.records.write();
        match records.get_mut(record.key()) {
            Some(stored) => {
                // Row already exists: only the data changes.
                stored.data = record.data.clone();
                record.set_created_at(stored.created_at);
                record.mark_persisted();
            }
            None => {
                let created_at = record.mark_persisted();
                records.insert(
                    record.key().clone(),
                    StoredRecord {
                        data: record.data.clone(),
                        created_at,
                    },
                );
            }
        }
        Ok(())
    }

    async fn delete(&self, record: &mut SessionRecord) -> Result<()> {
        self.records.write().remove(record.key());
        record.mark_deleted();
        Ok(())
    }
}

struct CachedBlob {
    blob: Vec<u8>,
    expires_at: Option<Instant>,
}

/// In-memory fast cache with optional per-entry expiry
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CachedBlob>>>,
    prefix: String,
    ttl: Option<Duration>,
}

impl MemoryCache {
    /// Create a cache with the "sess:" prefix and no expiry
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            prefix: "sess:".to_string(),
            ttl: None,
        }
    }

    /// Create a cache with a custom prefix
    pub fn with_prefix<S: Into<String>>(prefix: S) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::new()
        }
    }

    /// Build with an expiry applied to every entry
    pub fn with_ttl(mut self, ttl: impl Into<Option<Duration>>) -> Self {
        self.ttl = ttl.into();
        self
    }

    /// Make a cache key from a session key
    fn make_key(&self, key: &SessionKey) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Drop an entry without going through the session layer, the way a real
    /// cache evicts under memory pressure
    pub fn evict(&self, key: &SessionKey) -> bool {
        self.entries.write().remove(&self.make_key(key)).is_some()
    }

    /// Clean up expired entries
    pub fn cleanup_expired(&self) {
        let mut entries = self.entries.write();
        let now = Instant::now();
        entries.retain(|_, cached| match cached.expires_at {
            Some(exp) => exp > now,
            None => true,
        });
    }

    /// Number of unexpired entries. Expired ones are counted out, not removed.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|cached| match cached.expires_at {
                Some(exp) => exp > now,
                None => true,
            })
            .count()
    }

    /// Check if there are no unexpired entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryCache {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            prefix: self.prefix.clone(),
            ttl: self.ttl,
        }
    }
}

#[async_trait]
impl FastCache for MemoryCache {
    async fn get(&self, key: &SessionKey) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read();

        if let Some(cached) = entries.get(&self.make_key(key)) {
            if let Some(exp) = cached.expires_at {
                if exp <= Instant::now() {
                    return Ok(None);
                }
            }
            Ok(Some(cached.blob.clone()))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, key: &SessionKey, blob: &[u8]) -> Result<()> {
        let cached = CachedBlob {
            blob: blob.to_vec(),
            expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().insert(self.make_key(key), cached);
        Ok(())
    }

    async fn delete(&self, key: &SessionKey) -> Result<()> {
        self.entries.write().remove(&self.make_key(key));
        Ok(())
    }
}
