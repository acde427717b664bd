//! Keystore: the durable store, the cache and the key settings in one handle

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::key::{KeyGenerator, SessionKey};
use crate::session::Session;
use crate::store::{DurableStore, FastCache};

/// Hands out [`Session`]s bound to one durable store and one cache.
///
/// Cloning is cheap; clones share the same backends.
pub struct Keystore<D: DurableStore, C: FastCache> {
    store: Arc<D>,
    cache: Arc<C>,
    config: SessionConfig,
    keys: KeyGenerator,
}

impl<D: DurableStore, C: FastCache> Keystore<D, C> {
    /// Create a keystore, validating `config`
    pub fn new(store: D, cache: C, config: SessionConfig) -> Result<Self> {
        Self::from_shared(Arc::new(store), Arc::new(cache), config)
    }

    /// Create a keystore over backends that are already shared
    pub fn from_shared(store: Arc<D>, cache: Arc<C>, config: SessionConfig) -> Result<Self> {
        let keys = KeyGenerator::new(&config)?;
        Ok(Self {
            store,
            cache,
            config,
            keys,
        })
    }

    /// Open the session stored under `key`. Nothing is read until first use.
    pub fn session<K: Into<SessionKey>>(&self, key: K) -> Session<D, C> {
        Session::with_generator(
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            Some(key.into()),
            self.keys.clone(),
        )
    }

    /// Start a session under a freshly generated key
    pub fn new_session(&self) -> Session<D, C> {
        Session::with_generator(
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            None,
            self.keys.clone(),
        )
    }

    /// Open a session for a key received from outside, rejecting keys this
    /// keystore could never have minted
    pub fn session_checked(&self, key: &str) -> Result<Session<D, C>> {
        let key = SessionKey::parse(key, &self.config)?;
        Ok(self.session(key))
    }

    /// Whether a durable record exists under `key`
    pub async fn key_exists(&self, key: &SessionKey) -> Result<bool> {
        self.store.exists(key).await
    }

    /// The configuration sessions are minted with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The shared durable store
    pub fn store(&self) -> &Arc<D> {
        &self.store
    }

    /// The shared fast cache
    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }
}

impl<D: DurableStore, C: FastCache> Clone for Keystore<D, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
            keys: self.keys.clone(),
        }
    }
}
