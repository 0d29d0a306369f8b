//! Print-job file storage.
//!
//! Order attachments are persisted to an S3-compatible object store (Cloudflare
//! R2, AWS S3, MinIO); QR codes and chat attachments go to the local
//! filesystem. Callers get back a [`FileDescriptor`] and hand it back for
//! access and deletion.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        StorageManager                            │
//! │      save_file / save_multiple_files / get_file_access / ...     │
//! ├──────────────────────────────────┬──────────────────────────────┤
//! │ ObjectStoreClient (ORDER)        │ LocalFsAdapter (QR, CHAT)    │
//! │  UploadPolicy -> direct | parts  │  <dir>/<millis>-<i>-<name>   │
//! │  MultipartSession, presign       │  OpenDAL fs                  │
//! ├──────────────────────────────────┤                              │
//! │ ObjectStore: S3 | Memory         │                              │
//! └──────────────────────────────────┴──────────────────────────────┘
//! ```

mod config;
mod error;
mod keys;
mod local;
mod manager;
pub mod remote;
mod strategy;
mod types;

#[cfg(test)]
mod strategy_props;

pub use config::{RemoteConfig, StorageConfig, object_url};
pub use error::StorageError;
pub use keys::{basename, order_file_key, order_file_key_at, sanitize_filename};
pub use local::LocalFsAdapter;
pub use manager::StorageManager;
#[cfg(any(test, feature = "test-util"))]
pub use remote::MemoryObjectStore;
pub use remote::{
    CompletedPart, ContentDisposition, ObjectStore, ObjectStoreClient, PresignedPart,
    PresignedUploadPlan, RemoteStore, S3ObjectStore, UploadResult,
};
pub use strategy::{PartRange, UploadPlan, UploadPolicy, UploadStrategy};
pub use types::{
    AccessType, BatchDeleteResult, BatchFailure, BatchOutcome, BatchResult, FailedDelete,
    FileAccess, FileCategory, FileDescriptor, PendingFile, PresignedUrl, ResolvedAccess,
    SaveMetadata, StorageType, UploadFile,
};
