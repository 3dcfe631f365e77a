//! The [`BlobStoreRegistry`] trait defining the registry contract.

use hoard_types::BlobStoreConfiguration;

use crate::error::RegistryResult;
use crate::handle::StoreHandle;

/// Authoritative name -> running store mapping.
///
/// Implementations must be thread-safe (`Send + Sync`) and serialize
/// `create`, `delete` and `get` per name. Operations on different names may
/// run concurrently.
///
/// `delete` unregisters a store; it never erases the store's data. A store
/// deleted and then created again from an equivalent configuration (under
/// any name) serves the same blobs.
pub trait BlobStoreRegistry: Send + Sync {
    /// Build, start and register a store.
    ///
    /// Fails with `NameAlreadyRegistered` if the name is taken, or
    /// `BackendStartFailed` if the store cannot initialize. On failure
    /// nothing is registered.
    fn create(&self, config: BlobStoreConfiguration) -> RegistryResult<StoreHandle>;

    /// Stop and unregister a store. Fails with `NotRegistered` if absent.
    fn delete(&self, name: &str) -> RegistryResult<()>;

    /// The running store registered under `name`.
    fn get(&self, name: &str) -> Option<StoreHandle>;
}
