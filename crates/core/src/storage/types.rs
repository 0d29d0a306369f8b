//! Storage types shared by the manager and its backends.

use std::collections::HashMap;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File classification deciding which backend persists it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileCategory {
    /// Order attachments (customer print jobs). Durable: remote store only.
    Order,
    /// Shop QR codes.
    Qr,
    /// Chat attachments.
    Chat,
}

impl FileCategory {
    /// Whether this category requires remote persistence with no local fallback.
    #[must_use]
    pub const fn is_durable(self) -> bool {
        matches!(self, Self::Order)
    }

    /// Directory under the local root used for this category.
    #[must_use]
    pub const fn directory(self) -> &'static str {
        match self {
            Self::Order => "uploads",
            Self::Qr => "qr-codes",
            Self::Chat => "chat-attachments",
        }
    }
}

/// Backend holding a file's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Local filesystem.
    Local,
    /// Remote object store.
    #[serde(alias = "r2")]
    Remote,
}

/// Normalized record of where and how a file's bytes are stored.
///
/// Callers embed descriptors in the owning record (e.g. an order) and hand
/// them back for access and deletion. `storage_key_or_path` is only
/// meaningful to the backend named by `storage_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Stored filename (last key/path segment).
    pub filename: String,
    /// Filename as uploaded.
    pub original_name: String,
    /// MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Remote object key or local path relative to the local root.
    pub storage_key_or_path: String,
    /// Owning backend.
    pub storage_type: StorageType,
    /// Bucket for remote descriptors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

/// A file to persist, normalized once at the manager boundary.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Filename as uploaded.
    pub original_name: String,
    /// MIME type.
    pub mime_type: String,
    /// File contents.
    pub bytes: Bytes,
}

impl UploadFile {
    /// Create a new upload file.
    #[must_use]
    pub fn new(
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A file the uploader intends to push directly to the store.
///
/// Accepts the field spellings used by the different upload clients.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PendingFile {
    /// Original filename.
    #[serde(alias = "originalname", alias = "originalName", alias = "filename")]
    pub name: String,
    /// MIME type.
    #[serde(rename = "type", alias = "mimetype", alias = "mimeType")]
    pub mime_type: String,
    /// Declared size in bytes.
    pub size: u64,
}

/// Operation metadata accompanying a save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveMetadata {
    /// Owning order; required for [`FileCategory::Order`].
    pub order_id: Option<String>,
    /// Position in the batch; part of local filenames.
    pub index: usize,
}

impl SaveMetadata {
    /// Metadata for an order file.
    #[must_use]
    pub fn for_order(order_id: impl Into<String>) -> Self {
        Self {
            order_id: Some(order_id.into()),
            index: 0,
        }
    }

    /// Same metadata at a different batch position.
    #[must_use]
    pub fn with_index(&self, index: usize) -> Self {
        Self {
            order_id: self.order_id.clone(),
            index,
        }
    }
}

/// How the caller intends to use a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    /// Force a download (`Content-Disposition: attachment`).
    Download,
    /// Render in the browser (`Content-Disposition: inline`).
    View,
    /// Render in place for printing (`Content-Disposition: inline`).
    Print,
}

/// Presigned URL for upload or download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrl {
    /// The presigned URL.
    pub url: String,
    /// HTTP method to use (PUT for upload, GET for download).
    pub method: String,
    /// When the URL expires.
    pub expires_at: DateTime<Utc>,
    /// Required headers for the request.
    pub headers: HashMap<String, String>,
}

/// Result of resolving a descriptor for access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "location", rename_all = "lowercase")]
pub enum FileAccess {
    /// Time-bounded URL for a remote object.
    Url(PresignedUrl),
    /// Path of a local file.
    Path(PathBuf),
}

impl FileAccess {
    /// URL or path as a string.
    #[must_use]
    pub fn location(&self) -> String {
        match self {
            Self::Url(presigned) => presigned.url.clone(),
            Self::Path(path) => path.display().to_string(),
        }
    }
}

/// A descriptor resolved for access within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAccess {
    /// Descriptor identifier (stored filename).
    pub id: String,
    /// Original filename.
    pub original_name: String,
    /// MIME type.
    pub mime_type: String,
    /// Owning backend.
    pub storage_type: StorageType,
    /// URL or path.
    pub access: FileAccess,
}

/// One failed item in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    /// Identifier of the failed item (original filename).
    pub identifier: String,
    /// Failure message.
    pub error: String,
}

/// Result shape for every batch save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// Persisted descriptors.
    pub succeeded: Vec<FileDescriptor>,
    /// Items that failed.
    pub failed: Vec<BatchFailure>,
}

/// Overall outcome of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Nothing was submitted.
    Empty,
    /// Every item persisted.
    Succeeded,
    /// Some items persisted, some failed.
    PartiallySucceeded,
    /// Every item failed.
    Failed,
}

impl BatchResult {
    /// Number of items processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Classify the batch.
    #[must_use]
    pub fn outcome(&self) -> BatchOutcome {
        match (self.succeeded.is_empty(), self.failed.is_empty()) {
            (true, true) => BatchOutcome::Empty,
            (false, true) => BatchOutcome::Succeeded,
            (false, false) => BatchOutcome::PartiallySucceeded,
            (true, false) => BatchOutcome::Failed,
        }
    }
}

/// A key that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDelete {
    /// Key or path.
    pub key: String,
    /// Failure message.
    pub error: String,
}

/// Result of a batch delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchDeleteResult {
    /// Deleted keys or paths.
    pub success: Vec<String>,
    /// Keys or paths that could not be deleted.
    pub failed: Vec<FailedDelete>,
}

impl BatchDeleteResult {
    /// Fold another result into this one.
    pub fn merge(&mut self, other: Self) {
        self.success.extend(other.success);
        self.failed.extend(other.failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FileCategory::Order, true, "uploads")]
    #[case(FileCategory::Qr, false, "qr-codes")]
    #[case(FileCategory::Chat, false, "chat-attachments")]
    fn test_category_policy(
        #[case] category: FileCategory,
        #[case] durable: bool,
        #[case] directory: &str,
    ) {
        assert_eq!(category.is_durable(), durable);
        assert_eq!(category.directory(), directory);
    }

    #[test]
    fn test_category_wire_names() {
        let parsed: FileCategory = serde_json::from_str("\"ORDER\"").unwrap();
        assert_eq!(parsed, FileCategory::Order);
        assert_eq!(serde_json::to_string(&FileCategory::Qr).unwrap(), "\"QR\"");
    }

    #[test]
    fn test_descriptor_accepts_legacy_storage_type() {
        let json = r#"{
            "filename": "1700000000000-a.pdf",
            "originalName": "a.pdf",
            "mimeType": "application/pdf",
            "sizeBytes": 12,
            "storageKeyOrPath": "orders/2024/01/order-7/1700000000000-a.pdf",
            "storageType": "r2",
            "bucket": "print-jobs"
        }"#;
        let descriptor: FileDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.storage_type, StorageType::Remote);
        assert_eq!(descriptor.bucket.as_deref(), Some("print-jobs"));
    }

    #[test]
    fn test_local_descriptor_omits_bucket() {
        let descriptor = FileDescriptor {
            filename: "1-0-qr.png".to_string(),
            original_name: "qr.png".to_string(),
            mime_type: "image/png".to_string(),
            size_bytes: 3,
            storage_key_or_path: "qr-codes/1-0-qr.png".to_string(),
            storage_type: StorageType::Local,
            bucket: None,
        };
        let json = serde_json::to_value(&descriptor).unwrap();
        assert!(json.get("bucket").is_none());
        assert_eq!(json["storageType"], "local");
    }

    #[rstest]
    #[case(r#"{"name": "a.pdf", "type": "application/pdf", "size": 10}"#)]
    #[case(r#"{"originalname": "a.pdf", "mimetype": "application/pdf", "size": 10}"#)]
    #[case(r#"{"originalName": "a.pdf", "mimeType": "application/pdf", "size": 10}"#)]
    fn test_pending_file_shapes(#[case] json: &str) {
        let file: PendingFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.name, "a.pdf");
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.size, 10);
    }

    #[test]
    fn test_batch_outcome() {
        let descriptor = FileDescriptor {
            filename: "f".to_string(),
            original_name: "f".to_string(),
            mime_type: "text/plain".to_string(),
            size_bytes: 1,
            storage_key_or_path: "f".to_string(),
            storage_type: StorageType::Local,
            bucket: None,
        };
        let failure = BatchFailure {
            identifier: "g".to_string(),
            error: "boom".to_string(),
        };

        let mut result = BatchResult::default();
        assert_eq!(result.outcome(), BatchOutcome::Empty);

        result.succeeded.push(descriptor);
        assert_eq!(result.outcome(), BatchOutcome::Succeeded);

        result.failed.push(failure.clone());
        assert_eq!(result.outcome(), BatchOutcome::PartiallySucceeded);
        assert_eq!(result.total(), 2);

        let only_failures = BatchResult {
            succeeded: vec![],
            failed: vec![failure],
        };
        assert_eq!(only_failures.outcome(), BatchOutcome::Failed);
    }
}
