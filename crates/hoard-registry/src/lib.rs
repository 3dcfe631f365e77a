//! Blob store registry for Hoard.
//!
//! The registry maps unique names to running blob stores. It builds stores
//! from their configuration by type tag, starts them, keeps their
//! configuration persisted and stops them again on delete. Deleting a store
//! never touches its data.
//!
//! # Architecture
//!
//! - **Stores** are built by [`StoreFactories`] from a type tag (`memory`,
//!   `file`, `group`, or anything registered by the caller).
//! - **Groups** resolve their members by name through the manager on every
//!   call, so members may come and go independently.
//! - **Names** are locked individually: `create`, `delete` and `get` on one
//!   name are serialized, different names never wait on each other.
//! - **Configurations** are persisted through a [`ConfigStore`] and restored
//!   by [`BlobStoreManager::open`].
//!
//! # Modules
//!
//! - [`error`]: Error types for registry operations
//! - [`traits`]: The [`BlobStoreRegistry`] contract
//! - [`manager`]: [`BlobStoreManager`], the registry implementation
//! - [`handle`]: [`StoreHandle`], a registered store or group
//! - [`factory`]: Type tag dispatch
//! - [`persistence`]: Configuration storage
//! - [`settings`]: [`ManagerSettings`] loaded from TOML
//! - [`names`]: Store name validation

pub mod error;
pub mod factory;
pub mod handle;
pub mod locks;
pub mod manager;
pub mod names;
pub mod persistence;
pub mod settings;
pub mod traits;

pub use error::{RegistryError, RegistryResult};
pub use factory::{FactoryContext, StoreFactories};
pub use handle::StoreHandle;
pub use locks::{NameGuard, NameLocks};
pub use manager::{BlobStoreManager, LoadReport};
pub use names::validate_store_name;
pub use persistence::{ConfigStore, InMemoryConfigStore, JsonFileConfigStore};
pub use settings::ManagerSettings;
pub use traits::BlobStoreRegistry;
