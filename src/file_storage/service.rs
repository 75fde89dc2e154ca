//! # File Service
//!
//! Wires the two stores into the upload, listing, access and deletion flows.

use std::sync::Arc;
use std::time::Duration;

use super::access::AccessService;
use super::deletion::DeletionService;
use super::listing::ListingService;
use super::metadata::MetadataStore;
use super::object_store::ObjectStore;
use super::policy::UploadPolicy;
use super::reconcile::Reconciler;
use super::upload::UploadController;

/// Default deadline for a single store call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default lifetime of signed URLs
pub const DEFAULT_SIGNED_URL_TTL_SECS: i64 = 60;

/// Handles to both stores plus the per-call deadline
#[derive(Debug, Clone)]
pub struct FileStores {
    pub objects: Arc<dyn ObjectStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub call_timeout: Duration,
}

impl FileStores {
    pub fn new(objects: Arc<dyn ObjectStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            objects,
            metadata,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

/// The file flows over one pair of stores
#[derive(Debug, Clone)]
pub struct FileService {
    upload: UploadController,
    listing: ListingService,
    access: AccessService,
    deletion: DeletionService,
    stores: FileStores,
}

impl FileService {
    pub fn new(stores: FileStores, policy: UploadPolicy, signed_url_ttl: chrono::Duration) -> Self {
        Self {
            upload: UploadController::new(stores.clone(), policy),
            listing: ListingService::new(stores.clone()),
            access: AccessService::new(stores.clone(), signed_url_ttl),
            deletion: DeletionService::new(stores.clone()),
            stores,
        }
    }

    /// Service with the default policy and signed URL lifetime
    pub fn with_defaults(stores: FileStores) -> Self {
        Self::new(
            stores,
            UploadPolicy::default(),
            chrono::Duration::seconds(DEFAULT_SIGNED_URL_TTL_SECS),
        )
    }

    pub fn upload(&self) -> &UploadController {
        &self.upload
    }

    pub fn listing(&self) -> &ListingService {
        &self.listing
    }

    pub fn access(&self) -> &AccessService {
        &self.access
    }

    pub fn deletion(&self) -> &DeletionService {
        &self.deletion
    }

    pub fn stores(&self) -> &FileStores {
        &self.stores
    }

    /// Reconciliation sweep ignoring blobs younger than `grace`
    pub fn reconciler(&self, grace: chrono::Duration) -> Reconciler {
        Reconciler::new(self.stores.clone(), grace)
    }
}
