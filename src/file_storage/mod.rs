//! # Sitevault File Storage
//!
//! Blob and metadata stores plus the flows that keep them in step:
//! upload, listing, signed access, deletion and reconciliation.
//!
//! Blobs live in an [`ObjectStore`] under generated keys; each blob is
//! described by one [`FileRecord`] in a [`MetadataStore`]. The two stores
//! share no transaction, so upload and deletion run as two-step sagas and
//! report any leftover half as a [`ConsistencyWarning`].

pub mod access;
pub mod deadline;
pub mod deletion;
pub mod errors;
pub mod listing;
pub mod local;
pub mod memory;
pub mod metadata;
pub mod object_store;
pub mod permissions;
pub mod policy;
pub mod reconcile;
pub mod record;
pub mod service;
pub mod signed_url;
pub mod upload;

#[cfg(test)]
mod testing;

pub use access::{AccessService, FileRef, SignedDownload};
pub use deletion::{DeleteOutcome, DeletionService};
pub use errors::{ConsistencyWarning, FileError, FileResult, StoreError, StoreResult};
pub use listing::{FileListing, ListingService};
pub use local::LocalObjectStore;
pub use memory::InMemoryObjectStore;
pub use metadata::{FileQuery, InMemoryMetadataStore, JsonFileMetadataStore, MetadataStore};
pub use object_store::{ObjectInfo, ObjectStore, PresignedUrl, UrlIssuer};
pub use permissions::can_access;
pub use policy::UploadPolicy;
pub use reconcile::{ReconcileReport, Reconciler};
pub use record::FileRecord;
pub use service::{FileService, FileStores};
pub use signed_url::{SignedUrl, SignedUrlSigner};
pub use upload::{UploadController, UploadRequest};
