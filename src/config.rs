//! Keystore configuration

use std::time::Duration;

use crate::error::{Result, SessionError};

/// Default session key length
pub const DEFAULT_KEY_LENGTH: usize = 64;

/// Default key alphabet: ASCII letters (upper + lower) and digits
pub const DEFAULT_KEY_ALPHABET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Default cap on unique-key generation attempts
pub const DEFAULT_MAX_KEY_ATTEMPTS: u32 = 32;

/// Configuration for key generation and the cache layer
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Length of generated session keys (default: 64)
    pub key_length: usize,

    /// Characters keys are drawn from (default: letters + digits)
    pub key_alphabet: Vec<char>,

    /// How many candidate keys `generate_unique` tries before giving up.
    /// Every candidate colliding with a stored key this many times means the
    /// existence check is broken, not that we were unlucky.
    pub max_key_attempts: u32,

    /// Key prefix used by the cache adapters (default: "sess:")
    pub cache_prefix: String,

    /// Expiry for cache entries (default: 1 day). None = no expiry.
    pub cache_ttl: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key_length: DEFAULT_KEY_LENGTH,
            key_alphabet: DEFAULT_KEY_ALPHABET.chars().collect(),
            max_key_attempts: DEFAULT_MAX_KEY_ATTEMPTS,
            cache_prefix: "sess:".to_string(),
            cache_ttl: Some(Duration::from_secs(86400)),
        }
    }
}

impl SessionConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the generated key length (default: 64)
    pub fn with_key_length(mut self, length: usize) -> Self {
        self.key_length = length;
        self
    }

    /// Set the alphabet keys are drawn from
    pub fn with_key_alphabet<S: AsRef<str>>(mut self, alphabet: S) -> Self {
        self.key_alphabet = alphabet.as_ref().chars().collect();
        self
    }

    /// Set the cap on unique-key attempts (default: 32)
    pub fn with_max_key_attempts(mut self, attempts: u32) -> Self {
        self.max_key_attempts = attempts;
        self
    }

    /// Set the cache key prefix (default: "sess:")
    pub fn with_cache_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    /// Set the cache entry expiry. Pass None to keep entries until evicted.
    pub fn with_cache_ttl(mut self, ttl: impl Into<Option<Duration>>) -> Self {
        self.cache_ttl = ttl.into();
        self
    }

    /// Cache TTL in whole seconds, if any
    pub fn cache_ttl_secs(&self) -> Option<u64> {
        self.cache_ttl.map(|d| d.as_secs())
    }

    /// Check that this configuration can mint keys
    pub fn validate(&self) -> Result<()> {
        if self.key_length == 0 {
            return Err(SessionError::InvalidConfig(
                "key_length must be greater than zero".to_string(),
            ));
        }
        if self.key_alphabet.is_empty() {
            return Err(SessionError::InvalidConfig(
                "key_alphabet must not be empty".to_string(),
            ));
        }
        let mut seen = self.key_alphabet.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.key_alphabet.len() {
            return Err(SessionError::InvalidConfig(
                "key_alphabet contains duplicate characters".to_string(),
            ));
        }
        if self.max_key_attempts == 0 {
            return Err(SessionError::InvalidConfig(
                "max_key_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
