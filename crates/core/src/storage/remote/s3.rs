//! S3-compatible object store backed by the AWS SDK.

use std::time::Duration;

use aws_sdk_s3::Client;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use bytes::Bytes;
use tracing::info;

use super::store::{CompletedPart, ObjectHead, ObjectStore, PresignRequest};
use crate::storage::config::RemoteConfig;
use crate::storage::error::StorageError;

/// Object store for Cloudflare R2, AWS S3, MinIO and other S3-compatible services.
///
/// Holds one SDK client (and its connection pool) for the whole process.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from remote config.
    ///
    /// Connection attempts time out after `connect_timeout`; each request
    /// attempt may run for `transfer_timeout`. SDK retries are disabled so a
    /// failed transfer surfaces to the caller unchanged.
    #[must_use]
    pub fn new(remote: &RemoteConfig, connect_timeout: Duration, transfer_timeout: Duration) -> Self {
        info!(
            bucket = %remote.bucket,
            endpoint = %remote.endpoint,
            "Initializing S3 client"
        );

        let credentials = Credentials::new(
            remote.access_key_id.clone(),
            remote.secret_access_key.clone(),
            None,
            None,
            "printeasy-config",
        );
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(connect_timeout)
            .operation_attempt_timeout(transfer_timeout)
            .build();

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(remote.endpoint.clone())
            .region(Region::new(remote.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(remote.force_path_style)
            .timeout_config(timeouts)
            .retry_config(RetryConfig::disabled())
            .build();

        Self {
            client: Client::from_conf(config),
            bucket: remote.bucket.clone(),
        }
    }

    /// Wrap an existing SDK client.
    #[must_use]
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

fn part_number_i32(key: &str, part_number: u32) -> Result<i32, StorageError> {
    i32::try_from(part_number)
        .map_err(|_| StorageError::transfer("upload_part", key, "part number out of range"))
}

impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .metadata("uploaded-at", chrono::Utc::now().to_rfc3339())
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::transfer("put", key, DisplayErrorContext(&e)))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key)
                {
                    StorageError::not_found(key)
                } else {
                    StorageError::transfer("get", key, DisplayErrorContext(&e))
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::transfer("get", key, e))?;
        Ok(data.into_bytes())
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(ObjectHead {
                size: output
                    .content_length()
                    .and_then(|len| u64::try_from(len).ok())
                    .unwrap_or(0),
                content_type: output.content_type().map(String::from),
                e_tag: output.e_tag().map(|tag| tag.trim_matches('"').to_string()),
            })),
            Err(e)
                if e.as_service_error()
                    .is_some_and(HeadObjectError::is_not_found) =>
            {
                Ok(None)
            }
            Err(e) => Err(StorageError::transfer("head", key, DisplayErrorContext(&e))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::transfer("delete", key, DisplayErrorContext(&e)))?;
        Ok(())
    }

    async fn create_multipart(&self, key: &str, content_type: &str) -> Result<String, StorageError> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                StorageError::transfer("create_multipart", key, DisplayErrorContext(&e))
            })?;

        output.upload_id().map(String::from).ok_or_else(|| {
            StorageError::transfer(
                "create_multipart",
                key,
                "CreateMultipartUpload returned no upload_id",
            )
        })
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, StorageError> {
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number_i32(key, part_number)?)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::transfer("upload_part", key, DisplayErrorContext(&e)))?;

        output.e_tag().map(String::from).ok_or_else(|| {
            StorageError::transfer("upload_part", key, "UploadPart returned no ETag")
        })
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError> {
        let parts = parts
            .iter()
            .map(|part| {
                Ok(S3CompletedPart::builder()
                    .part_number(part_number_i32(key, part.part_number)?)
                    .e_tag(&part.e_tag)
                    .build())
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                StorageError::transfer("complete_multipart", key, DisplayErrorContext(&e))
            })?;
        Ok(())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<(), StorageError> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| {
                StorageError::transfer("abort_multipart", key, DisplayErrorContext(&e))
            })?;
        Ok(())
    }

    async fn presign(
        &self,
        request: PresignRequest<'_>,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let key = request.key().to_string();
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::transfer("presign", &key, e))?;

        let presigned = match request {
            PresignRequest::PutObject { key, content_type } => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .content_type(content_type)
                .presigned(presigning)
                .await
                .map_err(|e| StorageError::transfer("presign", key, DisplayErrorContext(&e)))?,
            PresignRequest::UploadPart {
                key,
                upload_id,
                part_number,
            } => self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number_i32(key, part_number)?)
                .presigned(presigning)
                .await
                .map_err(|e| StorageError::transfer("presign", key, DisplayErrorContext(&e)))?,
            PresignRequest::GetObject {
                key,
                content_disposition,
                content_type,
            } => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .set_response_content_disposition(content_disposition)
                .set_response_content_type(content_type)
                .presigned(presigning)
                .await
                .map_err(|e| StorageError::transfer("presign", key, DisplayErrorContext(&e)))?,
        };

        Ok(presigned.uri().to_string())
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::transfer("head_bucket", &self.bucket, DisplayErrorContext(&e))
            })?;
        Ok(())
    }
}
