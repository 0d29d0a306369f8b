//! Object store client: transfer strategies, presigned URLs and batch deletes.

use std::collections::HashMap;
use std::ops::Range;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use futures::future::{join_all, try_join_all};
use futures::stream;
use serde::Serialize;
use tracing::{error, info, warn};

use super::multipart::{MultipartSession, validate_part_list};
use super::store::{CompletedPart, ObjectHead, ObjectStore, PresignRequest};
use crate::storage::config::{StorageConfig, object_url};
use crate::storage::error::StorageError;
use crate::storage::keys::order_file_key;
use crate::storage::strategy::{UploadPlan, UploadPolicy, UploadStrategy};
use crate::storage::types::{BatchDeleteResult, FailedDelete, PendingFile, PresignedUrl};

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    /// Object key.
    pub key: String,
    /// Bucket.
    pub bucket: String,
    /// Public object URL.
    pub url: String,
    /// Strategy used.
    #[serde(skip)]
    pub strategy: UploadStrategy,
    /// Number of parts (1 for direct).
    pub total_parts: u32,
}

/// `Content-Disposition` a download URL should force.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentDisposition {
    /// Force a download.
    Attachment,
    /// Render in the browser.
    Inline,
}

/// Presigned URL for one multipart part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedPart {
    /// 1-based part number.
    pub part_number: u32,
    /// Byte range the uploader must send in this part.
    pub byte_range: Range<u64>,
    /// PUT URL.
    pub upload_url: PresignedUrl,
}

/// Direct-upload instructions for one pending file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "uploadType", rename_all = "camelCase")]
pub enum PresignedUploadPlan {
    /// One PUT of the whole file.
    #[serde(rename_all = "camelCase")]
    Direct {
        /// Original filename.
        filename: String,
        /// Object key.
        key: String,
        /// Declared size.
        size: u64,
        /// PUT URL.
        upload_url: PresignedUrl,
    },
    /// One PUT per part, then a completion call with the collected ETags.
    #[serde(rename_all = "camelCase")]
    Multipart {
        /// Original filename.
        filename: String,
        /// Object key.
        key: String,
        /// Declared size.
        size: u64,
        /// Multipart transaction to complete or abort.
        upload_id: String,
        /// Part size.
        part_size: u64,
        /// Number of parts.
        total_parts: u32,
        /// Per-part URLs in ascending order.
        parts: Vec<PresignedPart>,
    },
}

impl PresignedUploadPlan {
    /// Object key.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Direct { key, .. } | Self::Multipart { key, .. } => key,
        }
    }

    /// Multipart upload ID, if any.
    #[must_use]
    pub fn upload_id(&self) -> Option<&str> {
        match self {
            Self::Direct { .. } => None,
            Self::Multipart { upload_id, .. } => Some(upload_id),
        }
    }
}

/// Client over an [`ObjectStore`], owning every multipart transaction it starts.
#[derive(Debug)]
pub struct ObjectStoreClient<S> {
    store: S,
    policy: UploadPolicy,
    public_base_url: Option<String>,
    upload_ttl: Duration,
    download_ttl: Duration,
    print_ttl: Duration,
    delete_batch_size: usize,
    presign_concurrency: usize,
}

impl<S: ObjectStore> ObjectStoreClient<S> {
    /// Create a client with transfer settings from `config`.
    #[must_use]
    pub fn new(store: S, config: &StorageConfig) -> Self {
        Self {
            store,
            policy: config.upload,
            public_base_url: config
                .remote
                .as_ref()
                .and_then(|remote| remote.public_base_url.clone()),
            upload_ttl: Duration::from_secs(config.presign_upload_ttl_secs),
            download_ttl: Duration::from_secs(config.presign_download_ttl_secs),
            print_ttl: Duration::from_secs(config.presign_print_ttl_secs),
            delete_batch_size: config.delete_batch_size.max(1),
            presign_concurrency: config.max_concurrent_files_per_batch.max(1),
        }
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    /// Transfer policy.
    #[must_use]
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    fn result(&self, key: &str, strategy: UploadStrategy, total_parts: u32) -> UploadResult {
        UploadResult {
            key: key.to_string(),
            bucket: self.bucket().to_string(),
            url: object_url(self.public_base_url.as_deref(), self.bucket(), key),
            strategy,
            total_parts,
        }
    }

    /// Check that the bucket is reachable.
    pub async fn health_check(&self) -> bool {
        match self.store.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!(bucket = %self.bucket(), error = %e, "Object store health check failed");
                false
            }
        }
    }

    /// Single-shot transfer.
    ///
    /// # Errors
    ///
    /// Returns `Transfer` on remote failure. Not retried.
    pub async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        mime_type: &str,
    ) -> Result<UploadResult, StorageError> {
        let started = Instant::now();
        let size = bytes.len();
        self.store.put(key, bytes, mime_type).await?;

        info!(
            key,
            size,
            elapsed_ms = started.elapsed().as_millis(),
            "Object uploaded"
        );
        Ok(self.result(key, UploadStrategy::Direct, 1))
    }

    /// Multipart transfer with bounded per-transfer concurrency.
    ///
    /// Parts may finish in any order; completion always lists them sorted.
    /// On any failure the transaction is aborted (best effort) and the
    /// original error returned. An empty payload is sent as one empty part.
    ///
    /// # Errors
    ///
    /// Returns `TooManyParts` before anything is created if the payload needs
    /// more than [`UploadPolicy::MAX_PARTS`] parts, and `Transfer` if
    /// creation, any part, or completion fails.
    pub async fn multipart_upload(
        &self,
        key: &str,
        bytes: Bytes,
        mime_type: &str,
    ) -> Result<UploadResult, StorageError> {
        let started = Instant::now();
        let size = bytes.len() as u64;
        let mut plan = self.policy.multipart_plan(size)?;

        let upload_id = self.store.create_multipart(key, mime_type).await?;
        let mut session = MultipartSession::new(key, upload_id.as_str(), plan.total_parts);
        plan.upload_id = Some(upload_id);

        match self.transfer_parts(&mut session, &bytes, &plan).await {
            Ok(()) => {
                info!(
                    key,
                    size,
                    total_parts = plan.total_parts,
                    concurrency = plan.concurrency,
                    elapsed_ms = started.elapsed().as_millis(),
                    "Multipart upload completed"
                );
                Ok(self.result(key, UploadStrategy::Multipart, plan.total_parts))
            }
            Err(e) => {
                error!(key, upload_id = %session.upload_id(), error = %e, "Multipart upload failed");
                self.abort_session(&mut session).await;
                Err(e)
            }
        }
    }

    async fn transfer_parts(
        &self,
        session: &mut MultipartSession,
        bytes: &Bytes,
        plan: &UploadPlan,
    ) -> Result<(), StorageError> {
        let key = session.key().to_string();
        let upload_id = session.upload_id().to_string();

        let mut in_flight = stream::iter(&plan.parts)
            .map(|part| {
                let key = key.as_str();
                let upload_id = upload_id.as_str();
                async move {
                    let body = slice(bytes, &part.range, key)?;
                    let e_tag = self
                        .store
                        .upload_part(key, upload_id, part.part_number, body)
                        .await?;
                    Ok::<_, StorageError>(CompletedPart::new(part.part_number, e_tag))
                }
            })
            .buffer_unordered(plan.concurrency);

        while let Some(part) = in_flight.next().await {
            session.record_part(part?)?;
        }
        drop(in_flight);

        let completion = session.begin_completion()?;
        self.store
            .complete_multipart(&key, &upload_id, &completion)
            .await?;
        session.mark_completed();
        Ok(())
    }

    async fn abort_session(&self, session: &mut MultipartSession) {
        session.begin_abort();
        if let Err(abort_err) = self
            .store
            .abort_multipart(session.key(), session.upload_id())
            .await
        {
            warn!(
                key = %session.key(),
                upload_id = %session.upload_id(),
                error = %abort_err,
                "Failed to abort multipart upload"
            );
        }
        session.mark_aborted();
    }

    /// Route to [`upload`](Self::upload) or [`multipart_upload`](Self::multipart_upload)
    /// by size against the multipart threshold.
    ///
    /// # Errors
    ///
    /// Returns `Transfer` on remote failure.
    pub async fn intelligent_upload(
        &self,
        key: &str,
        bytes: Bytes,
        mime_type: &str,
    ) -> Result<UploadResult, StorageError> {
        match self.policy.select(bytes.len() as u64) {
            UploadStrategy::Direct => self.upload(key, bytes, mime_type).await,
            UploadStrategy::Multipart => self.multipart_upload(key, bytes, mime_type).await,
        }
    }

    /// Fetch an object's bytes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the object is absent.
    pub async fn download(&self, key: &str) -> Result<Bytes, StorageError> {
        self.store.get(key).await
    }

    /// Object metadata, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns `Transfer` on remote failure.
    pub async fn head(&self, key: &str) -> Result<Option<ObjectHead>, StorageError> {
        self.store.head(key).await
    }

    /// Whether an object exists. Errors count as absent.
    pub async fn exists(&self, key: &str) -> bool {
        matches!(self.store.head(key).await, Ok(Some(_)))
    }

    /// Delete one object.
    ///
    /// # Errors
    ///
    /// Returns `Transfer` on remote failure.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.store.delete(key).await
    }

    /// Delete many objects in bounded batches.
    ///
    /// A failing key never stops deletion of the rest.
    pub async fn batch_delete(&self, keys: &[String]) -> BatchDeleteResult {
        let mut result = BatchDeleteResult::default();

        for batch in keys.chunks(self.delete_batch_size) {
            let outcomes = join_all(batch.iter().map(|key| async move {
                (key, self.store.delete(key).await)
            }))
            .await;

            for (key, outcome) in outcomes {
                match outcome {
                    Ok(()) => result.success.push(key.clone()),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Failed to delete object");
                        result.failed.push(FailedDelete {
                            key: key.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            deleted = result.success.len(),
            failed = result.failed.len(),
            "Batch delete finished"
        );
        result
    }

    async fn presign(
        &self,
        request: PresignRequest<'_>,
        ttl: Duration,
        headers: HashMap<String, String>,
    ) -> Result<PresignedUrl, StorageError> {
        let method = request.method().to_string();
        let url = self.store.presign(request, ttl).await?;
        Ok(PresignedUrl {
            url,
            method,
            expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default(),
            headers,
        })
    }

    /// Presigned PUT for a direct upload.
    ///
    /// # Errors
    ///
    /// Returns `Transfer` if signing fails.
    pub async fn presigned_upload_url(
        &self,
        key: &str,
        mime_type: &str,
    ) -> Result<PresignedUrl, StorageError> {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), mime_type.to_string());
        self.presign(
            PresignRequest::PutObject {
                key,
                content_type: mime_type,
            },
            self.upload_ttl,
            headers,
        )
        .await
    }

    /// Presigned GET with the given disposition.
    ///
    /// An attachment with a filename is served as `application/octet-stream`
    /// so browsers always download it.
    ///
    /// # Errors
    ///
    /// Returns `Transfer` if signing fails.
    pub async fn presigned_download_url(
        &self,
        key: &str,
        disposition: ContentDisposition,
        filename: Option<&str>,
    ) -> Result<PresignedUrl, StorageError> {
        let (content_disposition, content_type) = match (disposition, filename) {
            (ContentDisposition::Attachment, Some(name)) => (
                Some(format!("attachment; filename=\"{}\"", header_filename(name))),
                Some("application/octet-stream".to_string()),
            ),
            (ContentDisposition::Attachment, None) => (None, None),
            (ContentDisposition::Inline, _) => (Some("inline".to_string()), None),
        };

        self.presign(
            PresignRequest::GetObject {
                key,
                content_disposition,
                content_type,
            },
            self.download_ttl,
            HashMap::new(),
        )
        .await
    }

    /// Presigned GET rendered in place (e.g. PDF preview before printing).
    ///
    /// # Errors
    ///
    /// Returns `Transfer` if signing fails.
    pub async fn presigned_print_url(
        &self,
        key: &str,
        mime_type: &str,
        filename: &str,
    ) -> Result<PresignedUrl, StorageError> {
        self.presign(
            PresignRequest::GetObject {
                key,
                content_disposition: Some(format!(
                    "inline; filename=\"{}\"",
                    header_filename(filename)
                )),
                content_type: Some(mime_type.to_string()),
            },
            self.print_ttl,
            HashMap::new(),
        )
        .await
    }

    /// Direct-upload plans for files the uploader will push itself.
    ///
    /// Files at or under the multipart threshold get one PUT URL; larger
    /// files get a multipart transaction and one URL per part. If any file
    /// fails, every transaction created for this batch is aborted before
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the first failure among the files, including `TooManyParts`
    /// for a file too large to split into [`UploadPolicy::MAX_PARTS`] parts.
    pub async fn batch_presigned_urls(
        &self,
        files: &[PendingFile],
        order_id: &str,
    ) -> Result<Vec<PresignedUploadPlan>, StorageError> {
        let outcomes: Vec<Result<PresignedUploadPlan, StorageError>> = stream::iter(files)
            .map(|file| self.plan_direct_upload(file, order_id))
            .buffered(self.presign_concurrency)
            .collect()
            .await;

        if !outcomes.iter().any(Result::is_err) {
            return outcomes.into_iter().collect();
        }

        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(plan) => {
                    if let Some(upload_id) = plan.upload_id() {
                        self.abort_presigned_multipart(plan.key(), upload_id).await;
                    }
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        Err(first_error.unwrap_or(StorageError::StoreUnavailable))
    }

    async fn plan_direct_upload(
        &self,
        file: &PendingFile,
        order_id: &str,
    ) -> Result<PresignedUploadPlan, StorageError> {
        let key = order_file_key(order_id, &file.name);

        let plan = self.policy.plan(file.size)?;
        if plan.strategy == UploadStrategy::Direct {
            let upload_url = self.presigned_upload_url(&key, &file.mime_type).await?;
            return Ok(PresignedUploadPlan::Direct {
                filename: file.name.clone(),
                key,
                size: file.size,
                upload_url,
            });
        }

        let upload_id = self.store.create_multipart(&key, &file.mime_type).await?;

        let parts = try_join_all(plan.parts.into_iter().map(|part| {
            let key = key.as_str();
            let upload_id = upload_id.as_str();
            async move {
                let upload_url = self
                    .presign(
                        PresignRequest::UploadPart {
                            key,
                            upload_id,
                            part_number: part.part_number,
                        },
                        self.upload_ttl,
                        HashMap::new(),
                    )
                    .await?;
                Ok::<_, StorageError>(PresignedPart {
                    part_number: part.part_number,
                    byte_range: part.range,
                    upload_url,
                })
            }
        }))
        .await;

        match parts {
            Ok(parts) => Ok(PresignedUploadPlan::Multipart {
                filename: file.name.clone(),
                total_parts: plan.total_parts,
                key,
                size: file.size,
                upload_id,
                part_size: plan.part_size,
                parts,
            }),
            Err(e) => {
                self.abort_presigned_multipart(&key, &upload_id).await;
                Err(e)
            }
        }
    }

    /// Complete a multipart transaction whose parts the uploader pushed directly.
    ///
    /// Parts may be given in any order. An invalid list or a failed
    /// completion aborts the transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParts` for gaps, duplicates or a count mismatch, and
    /// `Transfer` if the store rejects the completion.
    pub async fn complete_presigned_multipart(
        &self,
        key: &str,
        upload_id: &str,
        mut parts: Vec<CompletedPart>,
        expected_parts: Option<u32>,
    ) -> Result<UploadResult, StorageError> {
        let completion = match validate_part_list(&mut parts, expected_parts) {
            Ok(()) => self.store.complete_multipart(key, upload_id, &parts).await,
            Err(e) => Err(e),
        };

        match completion {
            Ok(()) => {
                let total_parts = u32::try_from(parts.len()).unwrap_or(u32::MAX);
                info!(key, upload_id, total_parts, "Presigned multipart upload completed");
                Ok(self.result(key, UploadStrategy::Multipart, total_parts))
            }
            Err(e) => {
                error!(key, upload_id, error = %e, "Presigned multipart completion failed");
                self.abort_presigned_multipart(key, upload_id).await;
                Err(e)
            }
        }
    }

    /// Abort a multipart transaction (best effort, failures are logged).
    pub async fn abort_presigned_multipart(&self, key: &str, upload_id: &str) {
        if let Err(e) = self.store.abort_multipart(key, upload_id).await {
            warn!(key, upload_id, error = %e, "Failed to abort multipart upload");
        }
    }
}

fn slice(bytes: &Bytes, range: &Range<u64>, key: &str) -> Result<Bytes, StorageError> {
    let start = usize::try_from(range.start)
        .map_err(|_| StorageError::transfer("upload_part", key, "part offset out of range"))?;
    let end = usize::try_from(range.end)
        .map_err(|_| StorageError::transfer("upload_part", key, "part offset out of range"))?;
    Ok(bytes.slice(start..end))
}

fn header_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect()
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
