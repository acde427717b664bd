//! Storage adapter traits

use async_trait::async_trait;

use crate::error::Result;
use crate::key::SessionKey;
use crate::record::SessionRecord;

/// Authoritative key-value store holding one [`SessionRecord`] per key.
#[async_trait]
pub trait DurableStore: Send + Sync + 'static {
    /// Whether a record is persisted under `key`
    async fn exists(&self, key: &SessionKey) -> Result<bool>;

    /// The persisted record for `key`, or a fresh scaffold if there is none
    async fn get_or_create(&self, key: &SessionKey) -> Result<SessionRecord>;

    /// Insert or update the record.
    ///
    /// Implementations must call [`SessionRecord::mark_persisted`] on success
    /// and must keep the `created_at` of an already stored row.
    async fn put(&self, record: &mut SessionRecord) -> Result<()>;

    /// Remove the record. Deleting a record that is already gone is not an error.
    async fn delete(&self, record: &mut SessionRecord) -> Result<()>;

    /// Tell a scaffold apart from a written record
    fn is_persisted(&self, record: &SessionRecord) -> bool {
        record.is_persisted()
    }
}

/// Non-durable accelerator in front of a [`DurableStore`].
///
/// Entries may vanish at any time; a miss says nothing about whether the key
/// exists durably.
#[async_trait]
pub trait FastCache: Send + Sync + 'static {
    /// Cached blob for `key`, or None on a miss
    async fn get(&self, key: &SessionKey) -> Result<Option<Vec<u8>>>;

    /// Store a blob under `key`
    async fn set(&self, key: &SessionKey, blob: &[u8]) -> Result<()>;

    /// Drop the entry for `key`
    async fn delete(&self, key: &SessionKey) -> Result<()>;
}
