//! Durable session record

use chrono::{DateTime, Utc};

use crate::key::SessionKey;

/// One durable row: a session key, its serialized attributes and when it was
/// first written.
///
/// A record starts life as a scaffold (not persisted, no creation time).
/// The store stamps `created_at` the first time it writes the record and
/// never touches it again, so a timestamp set explicitly before the first
/// write (as key rotation does) is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    key: SessionKey,
    /// Serialized attribute mapping
    pub data: Vec<u8>,
    created_at: Option<DateTime<Utc>>,
    persisted: bool,
}

impl SessionRecord {
    /// An empty, not-yet-persisted record for `key`
    pub fn scaffold(key: SessionKey) -> Self {
        Self {
            key,
            data: Vec::new(),
            created_at: None,
            persisted: false,
        }
    }

    /// A not-yet-persisted record carrying `data`
    pub fn with_data(key: SessionKey, data: Vec<u8>) -> Self {
        Self {
            data,
            ..Self::scaffold(key)
        }
    }

    /// A record read back from a backend
    pub fn restored(key: SessionKey, data: Vec<u8>, created_at: DateTime<Utc>) -> Self {
        Self {
            key,
            data,
            created_at: Some(created_at),
            persisted: true,
        }
    }

    /// The key this record is stored under
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// When the record was first persisted
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Carry a creation time over from another record
    pub fn set_created_at(&mut self, created_at: DateTime<Utc>) {
        self.created_at = Some(created_at);
    }

    /// Whether this record has actually been written to (or read from) a store
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Called by stores after a successful write. Stamps `created_at` on
    /// first persistence only.
    pub fn mark_persisted(&mut self) -> DateTime<Utc> {
        let created_at = *self.created_at.get_or_insert_with(Utc::now);
        self.persisted = true;
        created_at
    }

    /// Called by stores after the record was removed
    pub fn mark_deleted(&mut self) {
        self.persisted = false;
    }
}
