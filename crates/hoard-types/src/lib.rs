//! Foundation types for Hoard.
//!
//! Every other Hoard crate depends on `hoard-types`.
//!
//! # Key Types
//!
//! - [`BlobId`]: Content-addressed blob identifier (BLAKE3 hash)
//! - [`BlobStoreConfiguration`]: Name, type tag and attributes a store is built from
//! - [`GroupAttributes`]: Typed view over a group store's attribute section

pub mod blob_id;
pub mod configuration;
pub mod error;

pub use blob_id::BlobId;
pub use configuration::{Attributes, BlobStoreConfiguration, GroupAttributes, GROUP_TYPE};
pub use error::TypeError;
