//! Session keys and their generation

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{
    SessionConfig, DEFAULT_KEY_ALPHABET, DEFAULT_KEY_LENGTH, DEFAULT_MAX_KEY_ATTEMPTS,
};
use crate::error::{Result, SessionError};
use crate::store::DurableStore;

/// Opaque identifier naming one session's state.
///
/// Used verbatim as the durable primary key and (behind the cache prefix)
/// as the cache key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Parse a key received from outside, checking it against the configured
    /// length and alphabet
    pub fn parse<S: Into<String>>(key: S, config: &SessionConfig) -> Result<Self> {
        let key = key.into();
        if key.chars().count() != config.key_length {
            return Err(SessionError::InvalidKey(format!(
                "expected {} characters, got {}",
                config.key_length,
                key.chars().count()
            )));
        }
        if let Some(bad) = key.chars().find(|c| !config.key_alphabet.contains(c)) {
            return Err(SessionError::InvalidKey(format!(
                "character {:?} is not in the key alphabet",
                bad
            )));
        }
        Ok(Self(key))
    }

    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters only, for log lines
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }

    /// Consume the key, returning the inner string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for SessionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl AsRef<str> for SessionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Keys are bearer secrets; keep them out of debug dumps.
impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({}…)", self.short())
    }
}

/// Mints random session keys
#[derive(Clone, Debug)]
pub struct KeyGenerator {
    length: usize,
    alphabet: Vec<char>,
    max_attempts: u32,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_KEY_LENGTH,
            alphabet: DEFAULT_KEY_ALPHABET.chars().collect(),
            max_attempts: DEFAULT_MAX_KEY_ATTEMPTS,
        }
    }
}

impl KeyGenerator {
    /// Create a generator from the key settings of `config`.
    ///
    /// Fails with [`SessionError::InvalidConfig`] if `config` cannot mint
    /// keys (zero length, empty alphabet, no attempts).
    pub fn new(config: &SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            length: config.key_length,
            alphabet: config.key_alphabet.clone(),
            max_attempts: config.max_key_attempts,
        })
    }

    /// Draw a random key, uniformly over the alphabet.
    ///
    /// Uses the thread-local CSPRNG. No uniqueness guarantee.
    pub fn generate(&self) -> SessionKey {
        let mut rng = rand::rng();
        let key: String = (0..self.length)
            .map(|_| self.alphabet[rng.random_range(0..self.alphabet.len())])
            .collect();
        SessionKey(key)
    }

    /// Draw keys until one is not present in `store`.
    ///
    /// Collisions are astronomically unlikely with the default settings, so
    /// running out of attempts means the existence check itself is broken and
    /// is reported as [`SessionError::InvariantViolation`].
    pub async fn generate_unique<D>(&self, store: &D) -> Result<SessionKey>
    where
        D: DurableStore + ?Sized,
    {
        for attempt in 1..=self.max_attempts {
            let key = self.generate();
            if !store.exists(&key).await? {
                if attempt > 1 {
                    tracing::debug!(attempt, "unique session key found after collisions");
                }
                return Ok(key);
            }
        }

        tracing::error!(
            attempts = self.max_attempts,
            "every generated session key already exists"
        );
        Err(SessionError::InvariantViolation(format!(
            "no unused session key after {} attempts",
            self.max_attempts
        )))
    }
}
