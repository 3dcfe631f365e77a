//! Blob store capability for Hoard.
//!
//! A blob store holds immutable blobs identified by their BLAKE3 content
//! hash. Stores have a start/stop lifecycle; stopping a store releases it
//! without erasing data, which is what lets the registry move a store
//! between names.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`InMemoryBlobStore`] -- `HashMap`-based store over a named [`MemoryVolume`]
//! - [`FileBlobStore`] -- directory-backed store with atomic writes
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written (content addressing guarantees this).
//! 2. Concurrent reads are always safe.
//! 3. The store never interprets blob contents.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod blob;
pub mod error;
pub mod file;
pub mod lifecycle;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use blob::{
    headers, Blob, Headers, BLOB_NAME_HEADER, CONTENT_TYPE_HEADER, CREATED_BY_HEADER,
};
pub use error::{StoreError, StoreResult};
pub use file::{FileBlobStore, FILE_SECTION, FILE_TYPE, PATH_KEY};
pub use lifecycle::{Lifecycle, StoreState};
pub use memory::{
    InMemoryBlobStore, MemoryVolume, MemoryVolumes, MEMORY_SECTION, MEMORY_TYPE, VOLUME_KEY,
};
pub use traits::BlobStore;
