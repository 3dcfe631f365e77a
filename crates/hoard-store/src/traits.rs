use bytes::Bytes;
use hoard_types::{BlobId, BlobStoreConfiguration};

use crate::blob::{Blob, Headers};
use crate::error::{StoreError, StoreResult};
use crate::lifecycle::StoreState;

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - Blobs are immutable once written; the id is assigned by the store from
///   the content, so writing the same bytes twice yields the same id.
/// - `stop()` releases the store but never erases persisted blobs. A store
///   rebuilt from the same backend settings sees the same data.
/// - Blob operations on a store that is not started fail with
///   [`StoreError::NotStarted`].
/// - All I/O errors are propagated, never silently ignored.
pub trait BlobStore: Send + Sync {
    /// The configuration this store was built from.
    fn configuration(&self) -> &BlobStoreConfiguration;

    /// The registered name of this store.
    fn name(&self) -> &str {
        &self.configuration().name
    }

    /// Bring the store online. Idempotent.
    fn start(&self) -> StoreResult<()>;

    /// Take the store offline without touching its data. Idempotent.
    fn stop(&self) -> StoreResult<()>;

    /// Current lifecycle state.
    fn state(&self) -> StoreState;

    /// Returns `true` if the store is serving blob operations.
    fn is_started(&self) -> bool {
        self.state() == StoreState::Started
    }

    /// Read a blob by id.
    ///
    /// Returns `Ok(None)` if the blob does not exist.
    /// Returns `Err` on I/O failure or data corruption.
    fn get(&self, id: &BlobId) -> StoreResult<Option<Blob>>;

    /// Write a blob and return its id.
    ///
    /// If the content already exists this is a no-op and the stored headers
    /// are kept.
    fn put(&self, data: Bytes, headers: Headers) -> StoreResult<BlobId>;

    /// Delete a blob by id. Returns `true` if the blob existed.
    fn delete(&self, id: &BlobId) -> StoreResult<bool>;

    /// Check whether a blob exists.
    fn exists(&self, id: &BlobId) -> StoreResult<bool>;

    /// Read a blob that must exist.
    ///
    /// Like [`BlobStore::get`] but reports a miss as
    /// [`StoreError::BlobNotFound`].
    fn fetch(&self, id: &BlobId) -> StoreResult<Blob> {
        self.get(id)?.ok_or(StoreError::BlobNotFound(*id))
    }
}
