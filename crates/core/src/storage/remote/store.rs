//! Object store capability interface.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use crate::storage::error::StorageError;

/// A part accepted by the store, identified by its number and ETag.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    /// 1-based part number.
    pub part_number: u32,
    /// ETag returned for the part.
    pub e_tag: String,
}

impl CompletedPart {
    /// Create a completed part.
    #[must_use]
    pub fn new(part_number: u32, e_tag: impl Into<String>) -> Self {
        Self {
            part_number,
            e_tag: e_tag.into(),
        }
    }
}

/// Object metadata returned by a head request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    /// Size in bytes.
    pub size: u64,
    /// Stored content type.
    pub content_type: Option<String>,
    /// Entity tag.
    pub e_tag: Option<String>,
}

/// Operation a presigned URL grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresignRequest<'a> {
    /// Single-shot PUT of an object.
    PutObject {
        /// Object key.
        key: &'a str,
        /// Content type the uploader must send.
        content_type: &'a str,
    },
    /// PUT of one multipart part.
    UploadPart {
        /// Object key.
        key: &'a str,
        /// Multipart transaction.
        upload_id: &'a str,
        /// 1-based part number.
        part_number: u32,
    },
    /// GET of an object with optional response header overrides.
    GetObject {
        /// Object key.
        key: &'a str,
        /// `Content-Disposition` the store should answer with.
        content_disposition: Option<String>,
        /// `Content-Type` the store should answer with.
        content_type: Option<String>,
    },
}

impl PresignRequest<'_> {
    /// Object key the request addresses.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::PutObject { key, .. }
            | Self::UploadPart { key, .. }
            | Self::GetObject { key, .. } => key,
        }
    }

    /// HTTP method of the presigned request.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::PutObject { .. } | Self::UploadPart { .. } => "PUT",
            Self::GetObject { .. } => "GET",
        }
    }
}

/// Remote object store operations.
///
/// Implemented by [`S3ObjectStore`](super::S3ObjectStore) for S3-compatible
/// services and by the in-memory store behind the `test-util` feature.
/// Implementations must be safe for concurrent use through a shared reference.
pub trait ObjectStore: Send + Sync {
    /// Bucket all keys are addressed in.
    fn bucket(&self) -> &str;

    /// Store an object in a single request.
    fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Fetch an object. Returns `NotFound` if absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<Bytes, StorageError>> + Send;

    /// Fetch object metadata, `None` if absent.
    fn head(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<ObjectHead>, StorageError>> + Send;

    /// Delete an object.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Start a multipart transaction and return its upload ID.
    fn create_multipart(
        &self,
        key: &str,
        content_type: &str,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Upload one part and return its ETag.
    fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Stitch uploaded parts into the final object.
    ///
    /// `parts` must be sorted ascending by part number with no gaps.
    fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Discard a multipart transaction and its uploaded parts.
    fn abort_multipart(
        &self,
        key: &str,
        upload_id: &str,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Issue a time-bounded URL granting one operation.
    fn presign(
        &self,
        request: PresignRequest<'_>,
        expires_in: Duration,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Check that the bucket is reachable with the configured credentials.
    fn health_check(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}
