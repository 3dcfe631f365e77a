use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use bytes::Bytes;
use hoard_types::{BlobId, BlobStoreConfiguration};
use tracing::debug;

use crate::blob::{Blob, Headers};
use crate::error::{StoreError, StoreResult};
use crate::lifecycle::{Lifecycle, StoreState};
use crate::traits::BlobStore;

/// Type tag of in-memory stores.
pub const MEMORY_TYPE: &str = "memory";
/// Attribute section read by in-memory stores.
pub const MEMORY_SECTION: &str = "memory";
/// Attribute naming the volume that holds the store's blobs.
pub const VOLUME_KEY: &str = "volume";

// ---------------------------------------------------------------------------
// MemoryVolume
// ---------------------------------------------------------------------------

/// The data area behind an in-memory store.
///
/// A volume outlives the stores that use it, so unregistering a store and
/// registering it again (possibly under another name) sees the same blobs.
#[derive(Default)]
pub struct MemoryVolume {
    blobs: RwLock<HashMap<BlobId, Blob>>,
}

impl MemoryVolume {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if the volume is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total content bytes across all blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Blob::size)
            .sum()
    }

    /// Sorted list of all blob ids.
    pub fn all_ids(&self) -> Vec<BlobId> {
        let map = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<BlobId> = map.keys().copied().collect();
        ids.sort();
        ids
    }

    fn get(&self, id: &BlobId) -> Option<Blob> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn insert(&self, blob: Blob) -> BlobId {
        let id = blob.id;
        let mut map = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(id).or_insert(blob);
        id
    }

    fn remove(&self, id: &BlobId) -> bool {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    fn contains(&self, id: &BlobId) -> bool {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }
}

impl std::fmt::Debug for MemoryVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVolume")
            .field("blob_count", &self.len())
            .finish()
    }
}

/// Named volumes shared by every in-memory store a registry builds.
#[derive(Debug, Default)]
pub struct MemoryVolumes {
    volumes: Mutex<HashMap<String, Arc<MemoryVolume>>>,
}

impl MemoryVolumes {
    pub fn new() -> Self {
        Self::default()
    }

    /// The volume called `name`, created empty on first use.
    pub fn volume(&self, name: &str) -> Arc<MemoryVolume> {
        let mut map = self.volumes.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(name.to_string()).or_default())
    }

    /// Sorted volume names.
    pub fn names(&self) -> Vec<String> {
        let map = self.volumes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// InMemoryBlobStore
// ---------------------------------------------------------------------------

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Blobs live in a [`MemoryVolume`];
/// stopping the store leaves the volume untouched.
pub struct InMemoryBlobStore {
    config: BlobStoreConfiguration,
    volume: Arc<MemoryVolume>,
    lifecycle: Lifecycle,
}

impl InMemoryBlobStore {
    /// Create a store over a private, empty volume.
    pub fn new(config: BlobStoreConfiguration) -> Self {
        Self::with_volume(config, Arc::new(MemoryVolume::new()))
    }

    /// Create a store over an existing volume.
    pub fn with_volume(config: BlobStoreConfiguration, volume: Arc<MemoryVolume>) -> Self {
        Self {
            config,
            volume,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Build a store from its configuration, resolving `memory.volume`
    /// against `volumes`.
    pub fn from_configuration(
        config: BlobStoreConfiguration,
        volumes: &MemoryVolumes,
    ) -> StoreResult<Self> {
        let volume_name = config
            .attribute(MEMORY_SECTION, VOLUME_KEY)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                StoreError::invalid_config(
                    config.name.clone(),
                    format!("missing attribute {MEMORY_SECTION}.{VOLUME_KEY}"),
                )
            })?
            .to_string();
        let volume = volumes.volume(&volume_name);
        Ok(Self::with_volume(config, volume))
    }

    /// The backing volume.
    pub fn volume(&self) -> &Arc<MemoryVolume> {
        &self.volume
    }
}

impl BlobStore for InMemoryBlobStore {
    fn configuration(&self) -> &BlobStoreConfiguration {
        &self.config
    }

    fn start(&self) -> StoreResult<()> {
        self.lifecycle.start_with(|| Ok(()))
    }

    fn stop(&self) -> StoreResult<()> {
        self.lifecycle.stop_with(|| Ok(()))
    }

    fn state(&self) -> StoreState {
        self.lifecycle.state()
    }

    fn get(&self, id: &BlobId) -> StoreResult<Option<Blob>> {
        self.lifecycle.ensure_started(self.name())?;
        Ok(self.volume.get(id))
    }

    fn put(&self, data: Bytes, headers: Headers) -> StoreResult<BlobId> {
        self.lifecycle.ensure_started(self.name())?;
        let size = data.len();
        // Idempotent: content addressing means an existing entry is the same blob.
        let id = self.volume.insert(Blob::new(data, headers));
        debug!(store = %self.name(), blob = %id.short_hex(), size, "blob written");
        Ok(id)
    }

    fn delete(&self, id: &BlobId) -> StoreResult<bool> {
        self.lifecycle.ensure_started(self.name())?;
        let removed = self.volume.remove(id);
        if removed {
            debug!(store = %self.name(), blob = %id.short_hex(), "blob deleted");
        }
        Ok(removed)
    }

    fn exists(&self, id: &BlobId) -> StoreResult<bool> {
        self.lifecycle.ensure_started(self.name())?;
        Ok(self.volume.contains(id))
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("name", &self.config.name)
            .field("state", &self.lifecycle.state())
            .field("blob_count", &self.volume.len())
            .finish()
    }
}
