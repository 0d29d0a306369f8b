//! Storage manager: routes saves, access and deletes to the owning backend.

use std::time::Instant;

use bytes::Bytes;
use futures::future::join_all;
use tracing::{error, info, warn};

use super::config::StorageConfig;
use super::error::StorageError;
use super::keys::{basename, order_file_key};
use super::local::LocalFsAdapter;
use super::remote::{ContentDisposition, ObjectStore, ObjectStoreClient, RemoteStore, S3ObjectStore};
use super::types::{
    AccessType, BatchDeleteResult, BatchFailure, BatchResult, FailedDelete, FileAccess,
    FileCategory, FileDescriptor, ResolvedAccess, SaveMetadata, StorageType, UploadFile,
};

/// Storage façade over the remote object store and the local filesystem.
///
/// Order files go to the remote store only; there is no local fallback.
/// QR codes and chat attachments go to the local filesystem. Every later
/// operation dispatches on the descriptor's `storage_type`.
#[derive(Debug)]
pub struct StorageManager<S = S3ObjectStore> {
    remote: RemoteStore<S>,
    local: LocalFsAdapter,
    max_concurrent_files: usize,
    url_batch_size: usize,
    max_failure_rate_percent: u8,
}

impl StorageManager<S3ObjectStore> {
    /// Build a manager with an S3 client when remote settings are complete.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid limits or local root.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let remote = match &config.remote {
            Some(remote) => {
                let store =
                    S3ObjectStore::new(remote, config.connect_timeout(), config.transfer_timeout());
                RemoteStore::from(ObjectStoreClient::new(store, config))
            }
            None => {
                warn!("Remote object store not configured, order files cannot be saved");
                RemoteStore::Unconfigured
            }
        };
        Self::new(remote, config)
    }
}

impl<S: ObjectStore> StorageManager<S> {
    /// Build a manager around an existing remote store.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the local root is unusable.
    pub fn new(remote: RemoteStore<S>, config: &StorageConfig) -> Result<Self, StorageError> {
        info!(
            remote = remote.is_configured(),
            local_root = %config.local_root.display(),
            max_concurrent_files = config.max_concurrent_files_per_batch,
            "Storage manager initialized"
        );
        Ok(Self {
            remote,
            local: LocalFsAdapter::new(config.local_root.clone())?,
            max_concurrent_files: config.max_concurrent_files_per_batch.max(1),
            url_batch_size: config.url_batch_size.max(1),
            max_failure_rate_percent: config.max_failure_rate_percent,
        })
    }

    /// Remote client, if configured.
    #[must_use]
    pub fn remote(&self) -> Option<&ObjectStoreClient<S>> {
        self.remote.client()
    }

    /// Local adapter.
    #[must_use]
    pub fn local(&self) -> &LocalFsAdapter {
        &self.local
    }

    /// Whether order files can be saved.
    #[must_use]
    pub fn is_remote_configured(&self) -> bool {
        self.remote.is_configured()
    }

    /// Whether the remote bucket is reachable. `false` when unconfigured.
    pub async fn health_check(&self) -> bool {
        match self.remote() {
            Some(client) => client.health_check().await,
            None => false,
        }
    }

    fn client(&self) -> Result<&ObjectStoreClient<S>, StorageError> {
        self.remote().ok_or(StorageError::StoreUnavailable)
    }

    fn remote_descriptor(
        &self,
        client: &ObjectStoreClient<S>,
        key: &str,
        original_name: &str,
        mime_type: &str,
        size_bytes: u64,
    ) -> FileDescriptor {
        FileDescriptor {
            filename: basename(key).to_string(),
            original_name: original_name.to_string(),
            mime_type: mime_type.to_string(),
            size_bytes,
            storage_key_or_path: key.to_string(),
            storage_type: StorageType::Remote,
            bucket: Some(client.bucket().to_string()),
        }
    }

    /// Persist one file according to its category.
    ///
    /// # Errors
    ///
    /// Order files fail with `StoreUnavailable` when the remote store is not
    /// configured, `MissingOrderId` without an order, and `Transfer` on
    /// remote failure. Other categories fail with `Local`.
    pub async fn save_file(
        &self,
        file: &UploadFile,
        category: FileCategory,
        metadata: &SaveMetadata,
    ) -> Result<FileDescriptor, StorageError> {
        if !category.is_durable() {
            return self.local.save(file, category, metadata.index).await;
        }

        let client = self.client()?;
        let order_id = order_id(metadata)?;
        let key = order_file_key(order_id, &file.original_name);
        let result = client
            .intelligent_upload(&key, file.bytes.clone(), &file.mime_type)
            .await?;

        Ok(self.remote_descriptor(
            client,
            &result.key,
            &file.original_name,
            &file.mime_type,
            file.size(),
        ))
    }

    /// Persist many files in bounded waves.
    ///
    /// Each wave runs to completion regardless of individual failures.
    /// Failures are reported per file in the result.
    ///
    /// # Errors
    ///
    /// Fails up front with `StoreUnavailable` or `MissingOrderId` for order
    /// files that could not be saved at all, and with
    /// `BatchFailureRateExceeded` when more than the tolerated share of files
    /// failed. The latter carries every persisted descriptor.
    pub async fn save_multiple_files(
        &self,
        files: &[UploadFile],
        category: FileCategory,
        metadata: &SaveMetadata,
    ) -> Result<BatchResult, StorageError> {
        let mut result = BatchResult::default();
        if files.is_empty() {
            return Ok(result);
        }
        if category.is_durable() {
            self.client()?;
            order_id(metadata)?;
        }

        let started = Instant::now();
        for (wave, chunk) in files.chunks(self.max_concurrent_files).enumerate() {
            let wave_started = Instant::now();
            let offset = wave * self.max_concurrent_files;

            let outcomes = join_all(chunk.iter().enumerate().map(|(i, file)| {
                let metadata = metadata.with_index(offset + i);
                async move { (file, self.save_file(file, category, &metadata).await) }
            }))
            .await;

            let mut wave_failed = 0_usize;
            for (file, outcome) in outcomes {
                match outcome {
                    Ok(descriptor) => result.succeeded.push(descriptor),
                    Err(e) => {
                        wave_failed += 1;
                        warn!(name = %file.original_name, error = %e, "File save failed");
                        result.failed.push(BatchFailure {
                            identifier: file.original_name.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }

            let wave_bytes: u64 = chunk.iter().map(UploadFile::size).sum();
            let elapsed_ms = wave_started.elapsed().as_millis();
            info!(
                wave = wave + 1,
                files = chunk.len(),
                failed = wave_failed,
                bytes = wave_bytes,
                elapsed_ms,
                bytes_per_sec = u128::from(wave_bytes) * 1000 / elapsed_ms.max(1),
                "Batch wave finished"
            );
        }

        let total = result.total();
        let failed = result.failed.len();
        info!(
            total,
            succeeded = result.succeeded.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis(),
            ?category,
            "Batch save finished"
        );

        if exceeds_failure_rate(failed, total, self.max_failure_rate_percent) {
            error!(failed, total, "Batch failure rate exceeded");
            return Err(StorageError::BatchFailureRateExceeded {
                failed,
                total,
                partial: Box::new(result),
            });
        }
        Ok(result)
    }

    /// Resolve a descriptor to a presigned URL (remote) or a path (local).
    ///
    /// Remote downloads force an attachment. Views and prints render inline
    /// with the original filename and MIME type.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the bytes are gone and `StoreUnavailable` for a
    /// remote descriptor when no remote store is configured.
    pub async fn get_file_access(
        &self,
        descriptor: &FileDescriptor,
        access_type: AccessType,
    ) -> Result<FileAccess, StorageError> {
        match descriptor.storage_type {
            StorageType::Local => Ok(FileAccess::Path(
                self.local.resolve(&descriptor.storage_key_or_path).await?,
            )),
            StorageType::Remote => {
                let client = self.client()?;
                let key = descriptor.storage_key_or_path.as_str();
                if client.head(key).await?.is_none() {
                    return Err(StorageError::not_found(key));
                }

                let url = match access_type {
                    AccessType::Download => {
                        client
                            .presigned_download_url(
                                key,
                                ContentDisposition::Attachment,
                                Some(&descriptor.original_name),
                            )
                            .await?
                    }
                    AccessType::View | AccessType::Print => {
                        client
                            .presigned_print_url(
                                key,
                                &descriptor.mime_type,
                                &descriptor.original_name,
                            )
                            .await?
                    }
                };
                Ok(FileAccess::Url(url))
            }
        }
    }

    /// Resolve many descriptors in bounded batches.
    ///
    /// Descriptors that fail to resolve are logged and left out.
    pub async fn get_batch_urls(
        &self,
        descriptors: &[FileDescriptor],
        access_type: AccessType,
    ) -> Vec<ResolvedAccess> {
        let mut resolved = Vec::with_capacity(descriptors.len());

        for chunk in descriptors.chunks(self.url_batch_size) {
            let outcomes = join_all(chunk.iter().map(|descriptor| async move {
                (descriptor, self.get_file_access(descriptor, access_type).await)
            }))
            .await;

            for (descriptor, outcome) in outcomes {
                match outcome {
                    Ok(access) => resolved.push(ResolvedAccess {
                        id: descriptor.filename.clone(),
                        original_name: descriptor.original_name.clone(),
                        mime_type: descriptor.mime_type.clone(),
                        storage_type: descriptor.storage_type,
                        access,
                    }),
                    Err(e) => warn!(
                        filename = %descriptor.filename,
                        error = %e,
                        "Dropping unresolvable file from batch"
                    ),
                }
            }
        }
        resolved
    }

    /// Read a file's bytes from its backend.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the bytes are gone.
    pub async fn read_file(&self, descriptor: &FileDescriptor) -> Result<Bytes, StorageError> {
        match descriptor.storage_type {
            StorageType::Local => self.local.read(&descriptor.storage_key_or_path).await,
            StorageType::Remote => {
                self.client()?
                    .download(&descriptor.storage_key_or_path)
                    .await
            }
        }
    }

    /// Delete a file. Returns `false` on any failure.
    pub async fn delete_file(&self, descriptor: &FileDescriptor) -> bool {
        let key = descriptor.storage_key_or_path.as_str();
        let outcome = match descriptor.storage_type {
            StorageType::Local => self.local.delete(key).await,
            StorageType::Remote => match self.client() {
                Ok(client) => client.delete(key).await,
                Err(e) => Err(e),
            },
        };

        match outcome {
            Ok(()) => true,
            Err(e) => {
                warn!(key, storage_type = ?descriptor.storage_type, error = %e, "File delete failed");
                false
            }
        }
    }

    /// Delete many files. Never fails; failures are reported per key.
    pub async fn delete_files(&self, descriptors: &[FileDescriptor]) -> BatchDeleteResult {
        let (remote, local): (Vec<_>, Vec<_>) = descriptors
            .iter()
            .partition(|d| d.storage_type == StorageType::Remote);

        let mut result = BatchDeleteResult::default();
        let keys: Vec<String> = remote
            .iter()
            .map(|d| d.storage_key_or_path.clone())
            .collect();
        match self.remote() {
            Some(client) => result.merge(client.batch_delete(&keys).await),
            None => result.failed.extend(keys.into_iter().map(|key| FailedDelete {
                key,
                error: StorageError::StoreUnavailable.to_string(),
            })),
        }

        for descriptor in local {
            let path = &descriptor.storage_key_or_path;
            match self.local.delete(path).await {
                Ok(()) => result.success.push(path.clone()),
                Err(e) => result.failed.push(FailedDelete {
                    key: path.clone(),
                    error: e.to_string(),
                }),
            }
        }
        result
    }

    /// Confirm a file the uploader pushed directly with a presigned URL.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if nothing was uploaded at `key` and `SizeMismatch`
    /// if the stored size differs from `expected_size`.
    pub async fn confirm_direct_upload(
        &self,
        key: &str,
        original_name: &str,
        mime_type: &str,
        expected_size: u64,
    ) -> Result<FileDescriptor, StorageError> {
        let client = self.client()?;
        let head = client
            .head(key)
            .await?
            .ok_or_else(|| StorageError::not_found(key))?;
        if head.size != expected_size {
            return Err(StorageError::SizeMismatch {
                key: key.to_string(),
                expected: expected_size,
                actual: head.size,
            });
        }

        info!(key, size = head.size, "Direct upload confirmed");
        Ok(self.remote_descriptor(client, key, original_name, mime_type, head.size))
    }
}

fn order_id(metadata: &SaveMetadata) -> Result<&str, StorageError> {
    metadata
        .order_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or(StorageError::MissingOrderId)
}

/// Whether `failed` of `total` exceeds `max_percent` percent.
fn exceeds_failure_rate(failed: usize, total: usize, max_percent: u8) -> bool {
    failed.saturating_mul(100) > total.saturating_mul(usize::from(max_percent))
}
