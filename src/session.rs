//! Session coordinator
//!
//! A [`Session`] owns the attribute mapping for one key and reconciles it
//! with the fast cache and the durable store.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ──→ set()/get()/data_mut() ──→ save() ──→ cycle_key() ──→ save()
//!              │
//!              ▼ first read
//!           load(): cache ──miss──→ durable record ──→ merge with pending writes
//! ```
//!
//! A session is meant to live for one request. There is no locking across
//! instances: two sessions on the same key that both save race, and the last
//! `save()` wins.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::attributes::Attributes;
use crate::error::Result;
use crate::key::{KeyGenerator, SessionKey};
use crate::record::SessionRecord;
use crate::store::{DurableStore, FastCache};

/// One session's attributes plus the load/save/rotate protocol around them
pub struct Session<D: DurableStore, C: FastCache> {
    key: SessionKey,
    attributes: Attributes,
    record: Option<SessionRecord>,
    loaded: bool,
    modified: bool,
    saved: bool,
    store: Arc<D>,
    cache: Arc<C>,
    keys: KeyGenerator,
}

impl<D: DurableStore, C: FastCache> Session<D, C> {
    /// Create a session for `key`, or for a freshly generated key if None.
    ///
    /// A generated key is not checked against the store here; passing an
    /// existing key simply opens that session.
    pub fn new(store: Arc<D>, cache: Arc<C>, key: Option<SessionKey>) -> Self {
        Self::with_generator(store, cache, key, KeyGenerator::default())
    }

    /// Like [`Session::new`], minting keys with `keys`
    pub fn with_generator(
        store: Arc<D>,
        cache: Arc<C>,
        key: Option<SessionKey>,
        keys: KeyGenerator,
    ) -> Self {
        let key = key.unwrap_or_else(|| keys.generate());
        Self {
            key,
            attributes: Attributes::new(),
            record: None,
            loaded: false,
            modified: false,
            saved: false,
            store,
            cache,
            keys,
        }
    }

    /// Get the session key
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Check if the backing stores have been read
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Check if the attributes changed since the last save
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Check if the stores are known to hold exactly our attributes
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// Flag the attributes as changed. Needed only after mutating through a
    /// handle this type cannot see.
    pub fn mark_modified(&mut self) {
        self.modified = true;
        self.saved = false;
    }

    /// Whether a durable record exists under `key`
    pub async fn key_exists(&self, key: &SessionKey) -> Result<bool> {
        self.store.exists(key).await
    }

    /// Get a value from the session, loading it first if needed
    pub async fn get<T: DeserializeOwned>(&mut self, name: &str) -> Result<Option<T>> {
        self.load().await?;
        Ok(self.attributes.get(name))
    }

    /// Set a value in the session.
    ///
    /// Does not load: a write made before the first read is kept when the
    /// load happens.
    pub fn set<T: Serialize>(&mut self, name: &str, value: T) -> Result<()> {
        self.attributes.set(name, value)?;
        self.mark_modified();
        Ok(())
    }

    /// Remove a value from the session
    pub async fn remove(&mut self, name: &str) -> Result<Option<Value>> {
        self.load().await?;
        let removed = self.attributes.remove(name);
        if removed.is_some() {
            self.mark_modified();
        }
        Ok(removed)
    }

    /// Check if a key exists in the session
    pub async fn contains(&mut self, name: &str) -> Result<bool> {
        self.load().await?;
        Ok(self.attributes.contains(name))
    }

    /// Clear all session data
    pub async fn clear(&mut self) -> Result<()> {
        self.load().await?;
        self.attributes.clear();
        self.mark_modified();
        Ok(())
    }

    /// The loaded attribute mapping
    pub async fn data(&mut self) -> Result<&Attributes> {
        self.load().await?;
        Ok(&self.attributes)
    }

    /// The loaded attribute mapping, for direct mutation. Marks the session
    /// modified up front.
    pub async fn data_mut(&mut self) -> Result<&mut Attributes> {
        self.load().await?;
        self.mark_modified();
        Ok(&mut self.attributes)
    }

    /// Serialized snapshot of the in-memory attributes
    pub fn json_data(&self) -> Result<Vec<u8>> {
        self.attributes.to_json()
    }

    /// When this session was first persisted, if it has been
    pub async fn created_at(&mut self) -> Result<Option<DateTime<Utc>>> {
        let store = Arc::clone(&self.store);
        let record = self.record().await?;
        if store.is_persisted(record) {
            Ok(record.created_at())
        } else {
            Ok(None)
        }
    }

    /// The durable record for the current key, fetched once and kept
    async fn record(&mut self) -> Result<&mut SessionRecord> {
        let record = match self.record.take() {
            Some(record) => record,
            None => self.store.get_or_create(&self.key).await?,
        };
        Ok(self.record.insert(record))
    }

    /// Read the session from the cache, falling back to the durable store.
    ///
    /// Runs once per instance. Attributes set before the load win over the
    /// stored values for the same name; stored names we never touched are
    /// picked up. Errors leave the session unloaded.
    pub async fn load(&mut self) -> Result<()> {
        self.load_from_stores(false).await
    }

    /// Shared body of [`Session::load`]. With `cache_best_effort`, a failed
    /// cache read is logged and treated as a miss.
    async fn load_from_stores(&mut self, cache_best_effort: bool) -> Result<()> {
        if self.loaded {
            return Ok(());
        }

        let cached = match self.cache.get(&self.key).await {
            Ok(cached) => cached,
            Err(e) if cache_best_effort => {
                tracing::warn!(key = %self.key.short(), "cache read failed, using durable store: {}", e);
                None
            }
            Err(e) => return Err(e),
        };

        let remote = match cached {
            Some(blob) => {
                tracing::debug!(key = %self.key.short(), "session loaded from cache");
                Attributes::from_json(&blob)?
            }
            None => {
                let store = Arc::clone(&self.store);
                let short = self.key.short().to_string();
                let record = self.record().await?;
                if store.is_persisted(record) {
                    tracing::debug!(key = %short, "session loaded from durable store");
                    Attributes::from_json(&record.data)?
                } else {
                    tracing::debug!(key = %short, "no stored session, starting empty");
                    Attributes::new()
                }
            }
        };

        if self.modified {
            let pending = std::mem::replace(&mut self.attributes, remote);
            self.attributes.merge(pending);
        } else {
            self.attributes.merge(remote);
        }

        self.loaded = true;
        Ok(())
    }

    /// Write the attributes to the cache and the durable store.
    ///
    /// No-op when nothing changed since the last save. Cache failures (the
    /// read of a pending load, then the write) are logged and skipped; the
    /// durable write still happens and its errors are returned.
    pub async fn save(&mut self) -> Result<()> {
        if self.saved {
            return Ok(());
        }
        self.load_from_stores(true).await?;

        let blob = self.attributes.to_json()?;

        if let Err(e) = self.cache.set(&self.key, &blob).await {
            tracing::warn!(key = %self.key.short(), "cache write failed, saving durably only: {}", e);
        }

        let store = Arc::clone(&self.store);
        let record = self.record().await?;
        record.data = blob;
        store.put(record).await?;

        self.saved = true;
        self.modified = false;
        tracing::debug!(key = %self.key.short(), "session saved");
        Ok(())
    }

    /// Move the session to a new, unused key.
    ///
    /// The new record holds the current in-memory attributes, not whatever
    /// was last saved. If the old record was persisted, its creation time is
    /// carried over and it is deleted. The old cache entry is dropped last;
    /// if that fails the error is returned, but the session already points
    /// at the new key.
    pub async fn cycle_key(&mut self) -> Result<()> {
        self.load().await?;

        let new_key = self.keys.generate_unique(self.store.as_ref()).await?;
        let mut new_record = SessionRecord::with_data(new_key.clone(), self.json_data()?);

        let store = Arc::clone(&self.store);
        let old_record = self.record().await?;
        if store.is_persisted(old_record) {
            if let Some(created_at) = old_record.created_at() {
                new_record.set_created_at(created_at);
            }
            store.delete(old_record).await?;
        }

        store.put(&mut new_record).await?;

        let old_key = std::mem::replace(&mut self.key, new_key);
        self.record = Some(new_record);
        tracing::debug!(
            old_key = %old_key.short(),
            new_key = %self.key.short(),
            "session key rotated"
        );

        self.cache.delete(&old_key).await?;
        Ok(())
    }
}

impl<D: DurableStore, C: FastCache> std::fmt::Debug for Session<D, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("attributes", &self.attributes)
            .field("loaded", &self.loaded)
            .field("modified", &self.modified)
            .field("saved", &self.saved)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::store::{MemoryCache, MemoryStore};
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// MemoryStore that counts calls
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        gets: AtomicUsize,
        puts: AtomicUsize,
    }

    #[async_trait]
    impl DurableStore for CountingStore {
        async fn exists(&self, key: &SessionKey) -> Result<bool> {
            self.inner.exists(key).await
        }

        async fn get_or_create(&self, key: &SessionKey) -> Result<SessionRecord> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get_or_create(key).await
        }

        async fn put(&self, record: &mut SessionRecord) -> Result<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.inner.put(record).await
        }

        async fn delete(&self, record: &mut SessionRecord) -> Result<()> {
            self.inner.delete(record).await
        }
    }

    /// MemoryCache that counts writes and can be switched to fail each call
    #[derive(Default)]
    struct FlakyCache {
        inner: MemoryCache,
        sets: AtomicUsize,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
        fail_deletes: AtomicBool,
    }

    #[async_trait]
    impl FastCache for FlakyCache {
        async fn get(&self, key: &SessionKey) -> Result<Option<Vec<u8>>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(SessionError::StoreUnavailable("cache down".to_string()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &SessionKey, blob: &[u8]) -> Result<()> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(SessionError::StoreUnavailable("cache down".to_string()));
            }
            self.inner.set(key, blob).await
        }

        async fn delete(&self, key: &SessionKey) -> Result<()> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(SessionError::StoreUnavailable("cache down".to_string()));
            }
            self.inner.delete(key).await
        }
    }

    /// Durable store whose every call fails
    struct DownStore;

    #[async_trait]
    impl DurableStore for DownStore {
        async fn exists(&self, _key: &SessionKey) -> Result<bool> {
            Err(SessionError::StoreUnavailable("store down".to_string()))
        }

        async fn get_or_create(&self, _key: &SessionKey) -> Result<SessionRecord> {
            Err(SessionError::StoreUnavailable("store down".to_string()))
        }

        async fn put(&self, _record: &mut SessionRecord) -> Result<()> {
            Err(SessionError::StoreUnavailable("store down".to_string()))
        }

        async fn delete(&self, _record: &mut SessionRecord) -> Result<()> {
            Err(SessionError::StoreUnavailable("store down".to_string()))
        }
    }

    fn backends() -> (Arc<CountingStore>, Arc<FlakyCache>) {
        (Arc::new(CountingStore::default()), Arc::new(FlakyCache::default()))
    }

    async fn seed_durable(store: &CountingStore, key: &SessionKey, data: Value) -> SessionRecord {
        let mut record = SessionRecord::with_data(key.clone(), serde_json::to_vec(&data).unwrap());
        store.inner.put(&mut record).await.unwrap();
        record
    }

    fn as_map(attrs: &Attributes) -> HashMap<String, Value> {
        attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    #[tokio::test]
    async fn test_new_session_starts_unloaded() {
        let (store, cache) = backends();
        let session = Session::new(store, cache, None);

        assert_eq!(session.key().as_str().len(), 64);
        assert!(!session.is_loaded());
        assert!(!session.is_modified());
        assert!(!session.is_saved());
    }

    #[tokio::test]
    async fn test_set_marks_modified_and_unsaved() {
        let (store, cache) = backends();
        let mut session = Session::new(store, cache, None);

        session.set("user", "alice").unwrap();
        session.save().await.unwrap();
        assert!(session.is_saved());
        assert!(!session.is_modified());

        session.set("user", "bob").unwrap();
        assert!(session.is_modified());
        assert!(!session.is_saved());
    }

    #[tokio::test]
    async fn test_save_twice_writes_once() {
        let (store, cache) = backends();
        let mut session = Session::new(store.clone(), cache.clone(), None);

        session.set("views", 1).unwrap();
        session.save().await.unwrap();
        session.save().await.unwrap();

        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
        assert_eq!(cache.sets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_twice_ignores_remote_changes() {
        let (store, cache) = backends();
        let key = SessionKey::from("shared");
        seed_durable(&store, &key, json!({"a": 1})).await;

        let mut session = Session::new(store.clone(), cache.clone(), Some(key.clone()));
        session.load().await.unwrap();
        let first = session.data().await.unwrap().clone();

        seed_durable(&store, &key, json!({"a": 2, "b": 3})).await;
        cache.inner.set(&key, br#"{"a":5}"#).await.unwrap();
        session.load().await.unwrap();

        assert_eq!(session.data().await.unwrap(), &first);
        assert_eq!(session.get::<i32>("a").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_local_write_before_load_wins() {
        let (store, cache) = backends();
        let key = SessionKey::from("shared");
        seed_durable(&store, &key, json!({"a": 1, "b": 2})).await;

        let mut session = Session::new(store, cache, Some(key));
        session.set("a", 99).unwrap();
        assert!(!session.is_loaded());

        let data = as_map(session.data().await.unwrap());
        assert_eq!(data, HashMap::from([("a".to_string(), json!(99)), ("b".to_string(), json!(2))]));
        assert!(session.is_modified());
    }

    #[tokio::test]
    async fn test_local_write_before_cache_hit_wins() {
        let (store, cache) = backends();
        let key = SessionKey::from("shared");
        cache.inner.set(&key, br#"{"a":1,"b":2}"#).await.unwrap();

        let mut session = Session::new(store.clone(), cache, Some(key));
        session.set("a", 99).unwrap();

        let data = as_map(session.data().await.unwrap());
        assert_eq!(data, HashMap::from([("a".to_string(), json!(99)), ("b".to_string(), json!(2))]));
        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_read_failure_fails_plain_load() {
        let (store, cache) = backends();
        cache.fail_reads.store(true, Ordering::SeqCst);

        let mut session = Session::new(store, cache, None);
        assert!(matches!(
            session.load().await,
            Err(SessionError::StoreUnavailable(_))
        ));
        assert!(!session.is_loaded());
    }

    #[tokio::test]
    async fn test_save_with_cache_down_still_persists() {
        let (store, cache) = backends();
        let key = SessionKey::from("shared");
        seed_durable(&store, &key, json!({"b": 2})).await;
        cache.fail_reads.store(true, Ordering::SeqCst);
        cache.fail_writes.store(true, Ordering::SeqCst);

        let mut session = Session::new(store.clone(), cache, Some(key.clone()));
        session.set("user", "alice").unwrap();
        session.save().await.unwrap();

        assert!(session.is_saved());
        assert!(session.is_loaded());
        let record = store.inner.get_or_create(&key).await.unwrap();
        let stored: Value = serde_json::from_slice(&record.data).unwrap();
        assert_eq!(stored, json!({"user": "alice", "b": 2}));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_durable_store() {
        let (store, cache) = backends();
        let key = SessionKey::from("shared");
        seed_durable(&store, &key, json!({"a": 1})).await;
        cache.inner.set(&key, br#"{"a":1,"b":2}"#).await.unwrap();

        let mut session = Session::new(store.clone(), cache, Some(key));
        let data = as_map(session.data().await.unwrap());

        assert_eq!(data, HashMap::from([("a".to_string(), json!(1)), ("b".to_string(), json!(2))]));
        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_miss_falls_back_to_durable() {
        let (store, cache) = backends();
        let key = SessionKey::from("shared");
        seed_durable(&store, &key, json!({"user": "alice"})).await;

        let mut session = Session::new(store.clone(), cache, Some(key));
        assert_eq!(session.get::<String>("user").await.unwrap(), Some("alice".to_string()));
        assert_eq!(store.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_key_loads_empty() {
        let (store, cache) = backends();
        let mut session = Session::new(store.clone(), cache, Some(SessionKey::from("nobody")));

        assert!(session.data().await.unwrap().is_empty());
        assert!(session.is_loaded());
        assert!(!session.is_saved());
        assert!(session.created_at().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_fresh_load_round_trips() {
        let (store, cache) = backends();
        let mut session = Session::new(store.clone(), cache.clone(), None);

        session.set("user", "alice").unwrap();
        session.set("roles", vec!["admin", "dev"]).unwrap();
        session
            .set("prefs", json!({"theme": "dark", "size": 1.5, "beta": null}))
            .unwrap();
        session.save().await.unwrap();
        let expected = session.data().await.unwrap().clone();
        let key = session.key().clone();

        // Through the cache
        let mut fresh = Session::new(store.clone(), cache.clone(), Some(key.clone()));
        assert_eq!(fresh.data().await.unwrap(), &expected);

        // And with the cache entry evicted
        cache.inner.evict(&key);
        let mut fresh = Session::new(store, cache, Some(key));
        assert_eq!(fresh.data().await.unwrap(), &expected);
    }

    #[tokio::test]
    async fn test_save_without_load_keeps_remote_keys() {
        let (store, cache) = backends();
        let key = SessionKey::from("shared");
        seed_durable(&store, &key, json!({"a": 1, "b": 2})).await;

        let mut session = Session::new(store.clone(), cache, Some(key.clone()));
        session.set("a", 10).unwrap();
        session.save().await.unwrap();

        let record = store.inner.get_or_create(&key).await.unwrap();
        let stored: Value = serde_json::from_slice(&record.data).unwrap();
        assert_eq!(stored, json!({"a": 10, "b": 2}));
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_saves_durably() {
        let (store, cache) = backends();
        cache.fail_writes.store(true, Ordering::SeqCst);

        let mut session = Session::new(store.clone(), cache.clone(), None);
        session.set("user", "alice").unwrap();
        session.save().await.unwrap();

        assert!(session.is_saved());
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
        assert!(store.inner.exists(session.key()).await.unwrap());
        assert_eq!(cache.inner.get(session.key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_durable_failure_propagates() {
        let cache = Arc::new(MemoryCache::new());
        let mut session = Session::new(Arc::new(DownStore), cache, None);

        session.set("user", "alice").unwrap();
        assert!(matches!(
            session.save().await,
            Err(SessionError::StoreUnavailable(_))
        ));
        assert!(!session.is_loaded());
        assert!(!session.is_saved());
        assert!(session.is_modified());
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_a_serialization_error() {
        let (store, cache) = backends();
        let key = SessionKey::from("shared");
        cache.inner.set(&key, b"not json").await.unwrap();

        let mut session = Session::new(store, cache, Some(key));
        assert!(matches!(
            session.load().await,
            Err(SessionError::Serialization(_))
        ));
        assert!(!session.is_loaded());
    }

    #[tokio::test]
    async fn test_remove_and_clear_mark_modified() {
        let (store, cache) = backends();
        let key = SessionKey::from("shared");
        seed_durable(&store, &key, json!({"a": 1, "b": 2})).await;

        let mut session = Session::new(store, cache, Some(key));
        assert_eq!(session.remove("missing").await.unwrap(), None);
        assert!(!session.is_modified());

        assert_eq!(session.remove("a").await.unwrap(), Some(json!(1)));
        assert!(session.is_modified());
        assert!(!session.contains("a").await.unwrap());

        session.save().await.unwrap();
        session.clear().await.unwrap();
        assert!(session.is_modified());
        assert!(session.data().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_data_mut_marks_modified() {
        let (store, cache) = backends();
        let mut session = Session::new(store, cache, None);
        session.save().await.unwrap();

        session
            .data_mut()
            .await
            .unwrap()
            .insert("counter", json!(1));
        assert!(session.is_modified());
        assert!(!session.is_saved());
    }

    #[tokio::test]
    async fn test_cycle_key_moves_state_and_cleans_up() {
        let (store, cache) = backends();
        let mut session = Session::new(store.clone(), cache.clone(), None);
        session.set("user", "alice").unwrap();
        session.save().await.unwrap();
        let old_key = session.key().clone();

        session.set("step", 2).unwrap();
        session.cycle_key().await.unwrap();
        let new_key = session.key().clone();

        assert_ne!(old_key, new_key);
        assert!(!store.inner.exists(&old_key).await.unwrap());
        assert_eq!(cache.inner.get(&old_key).await.unwrap(), None);

        let record = store.inner.get_or_create(&new_key).await.unwrap();
        assert!(record.is_persisted());
        let stored: Value = serde_json::from_slice(&record.data).unwrap();
        assert_eq!(stored, json!({"user": "alice", "step": 2}));
        assert!(session.key_exists(&new_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_cycle_key_cache_delete_failure_keeps_new_key() {
        let (store, cache) = backends();
        let mut session = Session::new(store.clone(), cache.clone(), None);
        session.set("user", "alice").unwrap();
        session.save().await.unwrap();
        let old_key = session.key().clone();

        cache.fail_deletes.store(true, Ordering::SeqCst);
        assert!(matches!(
            session.cycle_key().await,
            Err(SessionError::StoreUnavailable(_))
        ));

        assert_ne!(session.key(), &old_key);
        assert!(!store.inner.exists(&old_key).await.unwrap());
        assert!(store.inner.exists(session.key()).await.unwrap());

        session.set("step", 2).unwrap();
        session.save().await.unwrap();
        assert_eq!(store.inner.keys(), vec![session.key().clone()]);
        assert!(!store.inner.exists(&old_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_cycle_key_preserves_created_at() {
        let (store, cache) = backends();
        let key = SessionKey::from("old-session");
        let mut seeded = SessionRecord::with_data(key.clone(), b"{\"a\":1}".to_vec());
        let original = Utc::now() - Duration::days(7);
        seeded.set_created_at(original);
        store.inner.put(&mut seeded).await.unwrap();

        let mut session = Session::new(store.clone(), cache, Some(key));
        session.cycle_key().await.unwrap();

        assert_eq!(session.created_at().await.unwrap(), Some(original));
        let record = store.inner.get_or_create(session.key()).await.unwrap();
        assert_eq!(record.created_at(), Some(original));
    }

    #[tokio::test]
    async fn test_cycle_key_on_unsaved_session_stamps_fresh_age() {
        let (store, cache) = backends();
        let before = Utc::now();
        let mut session = Session::new(store.clone(), cache, None);
        let old_key = session.key().clone();
        session.set("user", "alice").unwrap();

        session.cycle_key().await.unwrap();

        assert!(!store.inner.exists(&old_key).await.unwrap());
        let created_at = session.created_at().await.unwrap().unwrap();
        assert!(created_at >= before);
        assert_eq!(store.inner.len(), 1);
    }

    #[tokio::test]
    async fn test_cycle_key_never_reuses_existing_key() {
        let (store, cache) = backends();
        // A two-key space, one of them already taken
        let config = crate::config::SessionConfig::new()
            .with_key_length(1)
            .with_key_alphabet("ab")
            .with_max_key_attempts(64);
        let generator = KeyGenerator::new(&config).unwrap();
        seed_durable(&store, &SessionKey::from("a"), json!({})).await;

        let mut session =
            Session::with_generator(store.clone(), cache, Some(SessionKey::from("x")), generator);
        session.cycle_key().await.unwrap();
        assert_eq!(session.key().as_str(), "b");
    }

    #[tokio::test]
    async fn test_cycle_key_with_no_free_keys_fails() {
        let (store, cache) = backends();
        let config = crate::config::SessionConfig::new()
            .with_key_length(1)
            .with_key_alphabet("a")
            .with_max_key_attempts(3);
        seed_durable(&store, &SessionKey::from("a"), json!({})).await;

        let mut session = Session::with_generator(
            store,
            cache,
            Some(SessionKey::from("x")),
            KeyGenerator::new(&config).unwrap(),
        );
        assert!(matches!(
            session.cycle_key().await,
            Err(SessionError::InvariantViolation(_))
        ));
        assert_eq!(session.key().as_str(), "x");
    }
}
