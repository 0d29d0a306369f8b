//! Upload strategy selection.
//!
//! Pure policy, no I/O: decides between a single-shot put and a multipart
//! transfer, and partitions multipart payloads into numbered byte ranges.
//! A multipart plan never exceeds [`UploadPolicy::MAX_PARTS`] parts.

use std::ops::Range;

use super::error::StorageError;

/// Transfer strategy for one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    /// Single put.
    Direct,
    /// Create, upload parts, complete.
    Multipart,
}

/// One part of a multipart transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRange {
    /// 1-based part number.
    pub part_number: u32,
    /// Byte range within the payload.
    pub range: Range<u64>,
}

impl PartRange {
    /// Length of the part in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.range.end - self.range.start
    }

    /// Whether the part is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Transfer plan for one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    /// Chosen strategy.
    pub strategy: UploadStrategy,
    /// Part size used for partitioning (multipart only; equals size for direct).
    pub part_size: u64,
    /// Number of parts (1 for direct).
    pub total_parts: u32,
    /// Ordered parts (empty for direct).
    pub parts: Vec<PartRange>,
    /// Effective in-flight part limit: `min(max_concurrent_parts, total_parts)`.
    pub concurrency: usize,
    /// Remote transaction, once created.
    pub upload_id: Option<String>,
}

/// Size-based transfer policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Payloads strictly above this size go multipart.
    pub multipart_threshold: u64,
    /// Size of each multipart part (the last part may be shorter).
    pub part_size: u64,
    /// In-flight parts per transfer.
    pub max_concurrent_parts: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            multipart_threshold: Self::DEFAULT_MULTIPART_THRESHOLD,
            part_size: Self::DEFAULT_PART_SIZE,
            max_concurrent_parts: Self::DEFAULT_MAX_CONCURRENT_PARTS,
        }
    }
}

impl UploadPolicy {
    /// Default multipart threshold: 10 MiB.
    pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 10 * 1024 * 1024;
    /// Default part size: 10 MiB.
    pub const DEFAULT_PART_SIZE: u64 = 10 * 1024 * 1024;
    /// Default in-flight parts per transfer.
    pub const DEFAULT_MAX_CONCURRENT_PARTS: usize = 5;
    /// Highest part number S3-compatible stores accept.
    pub const MAX_PARTS: u32 = 10_000;

    /// Strategy for a payload of `size` bytes.
    #[must_use]
    pub fn select(&self, size: u64) -> UploadStrategy {
        if size > self.multipart_threshold {
            UploadStrategy::Multipart
        } else {
            UploadStrategy::Direct
        }
    }

    /// Number of parts for a multipart payload of `size` bytes.
    #[must_use]
    pub fn total_parts(&self, size: u64) -> u32 {
        let part_size = self.part_size.max(1);
        u32::try_from(size.div_ceil(part_size)).unwrap_or(u32::MAX)
    }

    /// Partition `size` bytes into ordered parts.
    #[must_use]
    pub fn partition(&self, size: u64) -> Vec<PartRange> {
        let part_size = self.part_size.max(1);
        (0..self.total_parts(size))
            .map(|index| {
                let start = u64::from(index) * part_size;
                PartRange {
                    part_number: index + 1,
                    range: start..(start + part_size).min(size),
                }
            })
            .collect()
    }

    /// Effective concurrency for a transfer with `total_parts` parts.
    #[must_use]
    pub fn concurrency(&self, total_parts: u32) -> usize {
        let total = usize::try_from(total_parts).unwrap_or(usize::MAX);
        self.max_concurrent_parts.max(1).min(total.max(1))
    }

    /// Full plan for a payload of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns `TooManyParts` if a multipart payload needs more than
    /// [`MAX_PARTS`](Self::MAX_PARTS) parts.
    pub fn plan(&self, size: u64) -> Result<UploadPlan, StorageError> {
        match self.select(size) {
            UploadStrategy::Direct => Ok(UploadPlan {
                strategy: UploadStrategy::Direct,
                part_size: size,
                total_parts: 1,
                parts: Vec::new(),
                concurrency: 1,
                upload_id: None,
            }),
            UploadStrategy::Multipart => self.multipart_plan(size),
        }
    }

    /// Multipart plan for `size` bytes regardless of the threshold.
    ///
    /// An empty payload gets a single empty part.
    ///
    /// # Errors
    ///
    /// Returns `TooManyParts` if the payload needs more than
    /// [`MAX_PARTS`](Self::MAX_PARTS) parts.
    pub fn multipart_plan(&self, size: u64) -> Result<UploadPlan, StorageError> {
        let needed = size.div_ceil(self.part_size.max(1));
        if needed > u64::from(Self::MAX_PARTS) {
            return Err(StorageError::TooManyParts {
                size,
                parts: needed,
                max: Self::MAX_PARTS,
            });
        }

        let mut parts = self.partition(size);
        if parts.is_empty() {
            parts.push(PartRange {
                part_number: 1,
                range: 0..0,
            });
        }
        let total_parts = u32::try_from(parts.len()).unwrap_or(Self::MAX_PARTS);
        Ok(UploadPlan {
            strategy: UploadStrategy::Multipart,
            part_size: self.part_size,
            total_parts,
            parts,
            concurrency: self.concurrency(total_parts),
            upload_id: None,
        })
    }
}
