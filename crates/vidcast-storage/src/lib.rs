//! Vidcast Storage Library
//!
//! Blob storage for the upload pipeline: containers holding block-committed
//! objects, the signed capabilities that grant access to them, and the media
//! catalog that records assets, access policies and locators.
//!
//! # Layout
//!
//! Every asset owns one container. Objects live directly in the container
//! (`{container}/{object}`); uncommitted blocks are staged under
//! `{container}/.blocks/{object}/` until a block list is committed. Names
//! starting with `.` are reserved and never listed.

pub mod catalog;
pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-object")]
pub mod object;
pub mod sas;
pub mod traits;

// Re-export commonly used types
pub use catalog::{InMemoryCatalog, MediaCatalog};
pub use factory::create_blob_store;
pub use keys::validate_object;
#[cfg(feature = "storage-local")]
pub use local::LocalBlobStore;
#[cfg(feature = "storage-object")]
pub use object::ObjectBlobStore;
pub use sas::{SasError, SasSigner, SasToken};
pub use traits::{BlobStore, ObjectInfo, StorageError, StorageResult};
pub use vidcast_core::StorageBackend;
