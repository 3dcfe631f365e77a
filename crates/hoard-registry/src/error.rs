//! Error types for registry operations.

use hoard_store::StoreError;
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A store is already registered under this name.
    #[error("blob store already registered: {name}")]
    NameAlreadyRegistered { name: String },

    /// No store is registered under this name.
    #[error("blob store not registered: {name}")]
    NotRegistered { name: String },

    /// The store name is not acceptable.
    #[error("invalid blob store name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// No constructor is registered for the configuration's type tag.
    #[error("unknown blob store type {store_type:?} for {name}")]
    UnknownStoreType { name: String, store_type: String },

    /// The configuration was rejected by the store constructor.
    #[error("invalid configuration for {name}: {reason}")]
    InvalidConfiguration { name: String, reason: String },

    /// The store was built but failed to start.
    #[error("blob store {name} failed to start: {source}")]
    BackendStartFailed {
        name: String,
        #[source]
        source: StoreError,
    },

    /// The store failed to stop; it remains registered.
    #[error("blob store {name} failed to stop: {source}")]
    StopFailed {
        name: String,
        #[source]
        source: StoreError,
    },

    /// Reading or writing persisted configuration failed.
    #[error("configuration persistence error: {0}")]
    Persistence(String),

    /// Manager settings could not be loaded.
    #[error("settings error: {0}")]
    Settings(String),
}

impl RegistryError {
    pub(crate) fn not_registered(name: &str) -> Self {
        Self::NotRegistered {
            name: name.to_string(),
        }
    }
}

/// Convenience type alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
