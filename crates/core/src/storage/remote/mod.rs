//! Remote object store backends and the client driving them.

mod client;
#[cfg(any(test, feature = "test-util"))]
mod memory;
mod multipart;
mod s3;
mod store;

use std::sync::Arc;

pub use client::{
    ContentDisposition, ObjectStoreClient, PresignedPart, PresignedUploadPlan, UploadResult,
};
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryObjectStore;
pub use multipart::{MultipartSession, MultipartState, validate_part_list};
pub use s3::S3ObjectStore;
pub use store::{CompletedPart, ObjectHead, ObjectStore, PresignRequest};

/// Remote store availability, decided once at construction.
#[derive(Debug)]
pub enum RemoteStore<S> {
    /// A client for a configured bucket.
    Configured(Arc<ObjectStoreClient<S>>),
    /// No remote store; durable saves fail with `StoreUnavailable`.
    Unconfigured,
}

impl<S> Clone for RemoteStore<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Configured(client) => Self::Configured(Arc::clone(client)),
            Self::Unconfigured => Self::Unconfigured,
        }
    }
}

impl<S> RemoteStore<S> {
    /// Client if configured.
    #[must_use]
    pub fn client(&self) -> Option<&ObjectStoreClient<S>> {
        match self {
            Self::Configured(client) => Some(client),
            Self::Unconfigured => None,
        }
    }

    /// Whether a remote store is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured(_))
    }
}

impl<S: ObjectStore> From<ObjectStoreClient<S>> for RemoteStore<S> {
    fn from(client: ObjectStoreClient<S>) -> Self {
        Self::Configured(Arc::new(client))
    }
}
