//! Multipart transfer bookkeeping.
//!
//! A transfer moves `Created -> Uploading -> Completing -> Completed`, or from
//! any non-terminal state to `Aborting -> Aborted`. Parts may arrive in any
//! order; the completion list is always sorted ascending and must be exactly
//! `1..=total_parts`.

use tracing::debug;

use super::store::CompletedPart;
use crate::storage::error::StorageError;

/// Lifecycle of one multipart transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartState {
    /// Upload ID issued, no parts yet.
    Created,
    /// At least one part accepted.
    Uploading,
    /// Completion requested.
    Completing,
    /// Object assembled.
    Completed,
    /// Abort requested.
    Aborting,
    /// Transaction discarded.
    Aborted,
}

impl MultipartState {
    /// Whether the transaction has reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// State of one multipart transfer, scoped to a single upload ID.
#[derive(Debug)]
pub struct MultipartSession {
    key: String,
    upload_id: String,
    total_parts: u32,
    state: MultipartState,
    parts: Vec<CompletedPart>,
}

impl MultipartSession {
    /// Track a freshly created transaction.
    #[must_use]
    pub fn new(key: impl Into<String>, upload_id: impl Into<String>, total_parts: u32) -> Self {
        let session = Self {
            key: key.into(),
            upload_id: upload_id.into(),
            total_parts,
            state: MultipartState::Created,
            parts: Vec::with_capacity(usize::try_from(total_parts).unwrap_or_default()),
        };
        debug!(
            key = %session.key,
            upload_id = %session.upload_id,
            total_parts,
            "Multipart upload created"
        );
        session
    }

    /// Object key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Upload ID.
    #[must_use]
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> MultipartState {
        self.state
    }

    /// Parts accepted so far, in arrival order.
    #[must_use]
    pub fn uploaded_parts(&self) -> &[CompletedPart] {
        &self.parts
    }

    /// Record an accepted part.
    ///
    /// # Errors
    ///
    /// Fails if the session is not accepting parts, or the part number is
    /// out of range or already recorded.
    pub fn record_part(&mut self, part: CompletedPart) -> Result<(), StorageError> {
        if !matches!(
            self.state,
            MultipartState::Created | MultipartState::Uploading
        ) {
            return Err(StorageError::invalid_parts(format!(
                "upload {} is {:?}, not accepting parts",
                self.upload_id, self.state
            )));
        }
        if part.part_number == 0 || part.part_number > self.total_parts {
            return Err(StorageError::invalid_parts(format!(
                "part {} outside 1..={}",
                part.part_number, self.total_parts
            )));
        }
        if self.parts.iter().any(|p| p.part_number == part.part_number) {
            return Err(StorageError::invalid_parts(format!(
                "part {} uploaded twice",
                part.part_number
            )));
        }

        debug!(
            upload_id = %self.upload_id,
            part_number = part.part_number,
            received = self.parts.len() + 1,
            total_parts = self.total_parts,
            "Part uploaded"
        );
        self.parts.push(part);
        self.state = MultipartState::Uploading;
        Ok(())
    }

    /// Move to `Completing` and return the sorted completion list.
    ///
    /// # Errors
    ///
    /// Fails if parts are missing.
    pub fn begin_completion(&mut self) -> Result<Vec<CompletedPart>, StorageError> {
        let mut parts = self.parts.clone();
        validate_part_list(&mut parts, Some(self.total_parts))?;
        self.transition(MultipartState::Completing);
        Ok(parts)
    }

    /// Mark the object assembled.
    pub fn mark_completed(&mut self) {
        self.transition(MultipartState::Completed);
    }

    /// Mark an abort in progress.
    pub fn begin_abort(&mut self) {
        self.transition(MultipartState::Aborting);
    }

    /// Mark the transaction discarded.
    pub fn mark_aborted(&mut self) {
        self.transition(MultipartState::Aborted);
    }

    fn transition(&mut self, next: MultipartState) {
        debug!(
            upload_id = %self.upload_id,
            from = ?self.state,
            to = ?next,
            "Multipart state change"
        );
        self.state = next;
    }
}

/// Sort `parts` ascending and check they are exactly `1..=n`.
///
/// When `expected_total` is given, `n` must equal it.
///
/// # Errors
///
/// Returns `InvalidParts` on an empty list, duplicates, gaps, or a count
/// mismatch.
pub fn validate_part_list(
    parts: &mut [CompletedPart],
    expected_total: Option<u32>,
) -> Result<(), StorageError> {
    if parts.is_empty() {
        return Err(StorageError::invalid_parts("no parts uploaded"));
    }
    parts.sort_by_key(|part| part.part_number);

    for (index, part) in parts.iter().enumerate() {
        let expected = u32::try_from(index + 1).unwrap_or(u32::MAX);
        if part.part_number != expected {
            return Err(StorageError::invalid_parts(format!(
                "expected part {expected}, found {}",
                part.part_number
            )));
        }
    }

    if let Some(total) = expected_total {
        let received = u32::try_from(parts.len()).unwrap_or(u32::MAX);
        if received != total {
            return Err(StorageError::invalid_parts(format!(
                "received {received} of {total} parts"
            )));
        }
    }
    Ok(())
}
