//! Storage error types.

use thiserror::Error;

use super::types::BatchResult;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Remote store is not configured; durable saves cannot proceed.
    #[error("remote object store is not configured")]
    StoreUnavailable,

    /// Network or API failure talking to the remote store.
    #[error("{operation} failed for '{key}': {message}")]
    Transfer {
        /// Store operation that failed (put, upload_part, presign, ...).
        operation: &'static str,
        /// Object key involved.
        key: String,
        /// Underlying failure.
        message: String,
    },

    /// Descriptor references bytes that are no longer present.
    #[error("file not found: {key}")]
    NotFound {
        /// Storage key or local path that was not found.
        key: String,
    },

    /// Order files require an order identifier.
    #[error("order ID is required for order file storage")]
    MissingOrderId,

    /// Multipart part list is not exactly `1..=n`.
    #[error("invalid multipart part list: {0}")]
    InvalidParts(String),

    /// Payload would need more multipart parts than the store accepts.
    #[error("{size} bytes need {parts} parts, more than the {max} allowed")]
    TooManyParts {
        /// Payload size in bytes.
        size: u64,
        /// Parts the payload would need.
        parts: u64,
        /// Highest accepted part count.
        max: u32,
    },

    /// Confirmed object size differs from the declared size.
    #[error("size mismatch for '{key}': expected {expected} bytes, found {actual}")]
    SizeMismatch {
        /// Object key.
        key: String,
        /// Declared size.
        expected: u64,
        /// Size found in the store.
        actual: u64,
    },

    /// Storage configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// Local filesystem operation failed.
    #[error("local storage operation failed: {0}")]
    Local(String),

    /// Too many items in a batch failed; already-persisted files are attached.
    #[error("{failed} of {total} files failed to save")]
    BatchFailureRateExceeded {
        /// Number of failed items.
        failed: usize,
        /// Number of items in the batch.
        total: usize,
        /// Descriptors that were persisted plus per-item failures.
        partial: Box<BatchResult>,
    },
}

impl StorageError {
    /// Create a transfer error.
    #[must_use]
    pub fn transfer(
        operation: &'static str,
        key: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        Self::Transfer {
            operation,
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid parts error.
    #[must_use]
    pub fn invalid_parts(msg: impl Into<String>) -> Self {
        Self::InvalidParts(msg.into())
    }

    /// Whether the caller may retry the whole file.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transfer { .. })
    }

    /// Partial result attached to a batch failure.
    #[must_use]
    pub fn partial_result(&self) -> Option<&BatchResult> {
        match self {
            Self::BatchFailureRateExceeded { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::NotFound {
                key: err.to_string(),
            },
            _ => Self::Local(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transfer_errors_are_retryable() {
        assert!(StorageError::transfer("put", "k", "reset by peer").is_retryable());
        assert!(!StorageError::StoreUnavailable.is_retryable());
        assert!(!StorageError::not_found("k").is_retryable());
        assert!(!StorageError::MissingOrderId.is_retryable());
        assert!(!StorageError::TooManyParts { size: 8, parts: 2, max: 1 }.is_retryable());
    }

    #[test]
    fn test_transfer_display() {
        let err = StorageError::transfer("upload_part", "orders/a.pdf", "timeout");
        assert_eq!(
            err.to_string(),
            "upload_part failed for 'orders/a.pdf': timeout"
        );
    }

    #[test]
    fn test_partial_result_only_on_batch_failure() {
        let err = StorageError::BatchFailureRateExceeded {
            failed: 3,
            total: 20,
            partial: Box::default(),
        };
        assert!(err.partial_result().is_some());
        assert_eq!(err.to_string(), "3 of 20 files failed to save");
        assert!(StorageError::StoreUnavailable.partial_result().is_none());
    }

    #[test]
    fn test_opendal_not_found_maps_to_not_found() {
        let err = opendal::Error::new(opendal::ErrorKind::NotFound, "missing");
        assert!(matches!(
            StorageError::from(err),
            StorageError::NotFound { .. }
        ));

        let err = opendal::Error::new(opendal::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(StorageError::from(err), StorageError::Local(_)));
    }
}
