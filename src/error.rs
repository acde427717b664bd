//! Session error types

use thiserror::Error;

/// Errors that can occur during session operations
#[derive(Debug, Error)]
pub enum SessionError {
    /// A durable store or cache call failed
    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),

    /// The attribute mapping could not round-trip through its encoding
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Something that cannot happen in correct operation did happen
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The configuration cannot produce usable keys
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A session key does not match the configured length/alphabet
    #[error("Invalid session key: {0}")]
    InvalidKey(String),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, SessionError>;

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

#[cfg(feature = "redis-store")]
impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        SessionError::StoreUnavailable(format!("redis: {}", err))
    }
}

#[cfg(feature = "sqlite-store")]
impl From<rusqlite::Error> for SessionError {
    fn from(err: rusqlite::Error) -> Self {
        SessionError::StoreUnavailable(format!("sqlite: {}", err))
    }
}
