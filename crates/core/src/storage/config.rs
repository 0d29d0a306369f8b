//! Storage configuration types.

use std::path::PathBuf;
use std::time::Duration;

use printeasy_shared::{RemoteStoreSettings, StorageSettings};

use super::error::StorageError;
use super::strategy::UploadPolicy;

/// S3-compatible remote store connection: Cloudflare R2, AWS S3, MinIO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Endpoint URL.
    pub endpoint: String,
    /// Bucket name.
    pub bucket: String,
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Region.
    pub region: String,
    /// Path-style addressing.
    pub force_path_style: bool,
    /// Public base URL for object links.
    pub public_base_url: Option<String>,
}

impl RemoteConfig {
    /// Create a remote config with region `auto` and virtual-hosted addressing.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: "auto".to_string(),
            force_path_style: false,
            public_base_url: None,
        }
    }

    /// Resolve settings; `None` when disabled or any credential is missing.
    #[must_use]
    pub fn from_settings(settings: &RemoteStoreSettings) -> Option<Self> {
        settings.is_complete().then(|| Self {
            endpoint: settings.endpoint.clone(),
            bucket: settings.bucket.clone(),
            access_key_id: settings.access_key_id.clone(),
            secret_access_key: settings.secret_access_key.clone(),
            region: settings.region.clone(),
            force_path_style: settings.force_path_style,
            public_base_url: settings.public_base_url.clone(),
        })
    }

    /// Public URL of an object.
    #[must_use]
    pub fn object_url(&self, key: &str) -> String {
        object_url(self.public_base_url.as_deref(), &self.bucket, key)
    }
}

/// Public URL of an object given an optional base URL.
#[must_use]
pub fn object_url(public_base_url: Option<&str>, bucket: &str, key: &str) -> String {
    match public_base_url {
        Some(base) => format!("{}/{key}", base.trim_end_matches('/')),
        None => format!("https://{bucket}.r2.cloudflarestorage.com/{key}"),
    }
}

/// Storage service configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Remote store, if configured.
    pub remote: Option<RemoteConfig>,
    /// Transfer strategy policy.
    pub upload: UploadPolicy,
    /// Files saved concurrently per batch wave.
    pub max_concurrent_files_per_batch: usize,
    /// Descriptors resolved concurrently for access URLs.
    pub url_batch_size: usize,
    /// Keys deleted concurrently.
    pub delete_batch_size: usize,
    /// Batch saves fail above this failure percentage.
    pub max_failure_rate_percent: u8,
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Data transfer timeout in seconds.
    pub transfer_timeout_secs: u64,
    /// Presigned upload URL TTL in seconds (default: 7200 = 2 hours).
    pub presign_upload_ttl_secs: u64,
    /// Presigned download URL TTL in seconds (default: 3600 = 1 hour).
    pub presign_download_ttl_secs: u64,
    /// Presigned print URL TTL in seconds (default: 3600 = 1 hour).
    pub presign_print_ttl_secs: u64,
    /// Root for local category directories.
    pub local_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            remote: None,
            upload: UploadPolicy::default(),
            max_concurrent_files_per_batch: Self::DEFAULT_MAX_CONCURRENT_FILES,
            url_batch_size: Self::DEFAULT_URL_BATCH_SIZE,
            delete_batch_size: Self::DEFAULT_DELETE_BATCH_SIZE,
            max_failure_rate_percent: Self::DEFAULT_MAX_FAILURE_RATE_PERCENT,
            connect_timeout_secs: Self::DEFAULT_CONNECT_TIMEOUT,
            transfer_timeout_secs: Self::DEFAULT_TRANSFER_TIMEOUT,
            presign_upload_ttl_secs: Self::DEFAULT_UPLOAD_TTL,
            presign_download_ttl_secs: Self::DEFAULT_DOWNLOAD_TTL,
            presign_print_ttl_secs: Self::DEFAULT_DOWNLOAD_TTL,
            local_root: PathBuf::from("."),
        }
    }
}

impl StorageConfig {
    /// Default files per batch wave.
    pub const DEFAULT_MAX_CONCURRENT_FILES: usize = 20;
    /// Default URL resolution batch size.
    pub const DEFAULT_URL_BATCH_SIZE: usize = 15;
    /// Default delete batch size.
    pub const DEFAULT_DELETE_BATCH_SIZE: usize = 10;
    /// Default tolerated failure rate.
    pub const DEFAULT_MAX_FAILURE_RATE_PERCENT: u8 = 10;
    /// Default connect timeout: 5 seconds.
    pub const DEFAULT_CONNECT_TIMEOUT: u64 = 5;
    /// Default transfer timeout: 5 minutes.
    pub const DEFAULT_TRANSFER_TIMEOUT: u64 = 300;
    /// Default upload TTL: 2 hours.
    pub const DEFAULT_UPLOAD_TTL: u64 = 7200;
    /// Default download TTL: 1 hour.
    pub const DEFAULT_DOWNLOAD_TTL: u64 = 3600;

    /// Build from loaded application settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any limit is invalid.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        let transfer = &settings.transfer;
        let config = Self {
            remote: settings.remote.as_ref().and_then(RemoteConfig::from_settings),
            upload: UploadPolicy {
                multipart_threshold: transfer.multipart_threshold_bytes,
                part_size: transfer.part_size_bytes,
                max_concurrent_parts: transfer.max_concurrent_parts,
            },
            max_concurrent_files_per_batch: transfer.max_concurrent_files_per_batch,
            url_batch_size: transfer.url_batch_size,
            delete_batch_size: transfer.delete_batch_size,
            max_failure_rate_percent: transfer.max_failure_rate_percent,
            connect_timeout_secs: transfer.connect_timeout_secs,
            transfer_timeout_secs: transfer.transfer_timeout_secs,
            presign_upload_ttl_secs: settings.presign.upload_ttl_secs,
            presign_download_ttl_secs: settings.presign.download_ttl_secs,
            presign_print_ttl_secs: settings.presign.print_ttl_secs,
            local_root: settings.local.root.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the remote store.
    #[must_use]
    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Set the upload policy.
    #[must_use]
    pub fn with_upload_policy(mut self, upload: UploadPolicy) -> Self {
        self.upload = upload;
        self
    }

    /// Set files per batch wave.
    #[must_use]
    pub fn with_max_concurrent_files(mut self, files: usize) -> Self {
        self.max_concurrent_files_per_batch = files;
        self
    }

    /// Set tolerated batch failure rate.
    #[must_use]
    pub fn with_max_failure_rate_percent(mut self, percent: u8) -> Self {
        self.max_failure_rate_percent = percent;
        self
    }

    /// Set the local root.
    #[must_use]
    pub fn with_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.local_root = root.into();
        self
    }

    /// Set presigned upload URL TTL.
    #[must_use]
    pub fn with_upload_ttl(mut self, secs: u64) -> Self {
        self.presign_upload_ttl_secs = secs;
        self
    }

    /// Set presigned download URL TTL.
    #[must_use]
    pub fn with_download_ttl(mut self, secs: u64) -> Self {
        self.presign_download_ttl_secs = secs;
        self
    }

    /// Connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Transfer timeout.
    #[must_use]
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    /// Check limits for values that would stall or divide by zero.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first invalid value.
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.upload.part_size == 0 {
            return Err(StorageError::configuration("part size must be positive"));
        }
        if self.upload.max_concurrent_parts == 0 {
            return Err(StorageError::configuration(
                "max concurrent parts must be positive",
            ));
        }
        if self.max_concurrent_files_per_batch == 0
            || self.url_batch_size == 0
            || self.delete_batch_size == 0
        {
            return Err(StorageError::configuration("batch sizes must be positive"));
        }
        if self.max_failure_rate_percent > 100 {
            return Err(StorageError::configuration(
                "max failure rate must be at most 100 percent",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printeasy_shared::AppConfig;

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::default();
        assert!(config.remote.is_none());
        assert_eq!(config.upload, UploadPolicy::default());
        assert_eq!(config.max_concurrent_files_per_batch, 20);
        assert_eq!(config.presign_upload_ttl_secs, 7200);
        assert_eq!(config.presign_download_ttl_secs, 3600);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.transfer_timeout(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_default_settings_matches_defaults() {
        let settings = AppConfig::default().storage;
        let config = StorageConfig::from_settings(&settings).expect("valid settings");
        assert!(config.remote.is_none());
        assert_eq!(config.upload, UploadPolicy::default());
        assert_eq!(config.url_batch_size, 15);
        assert_eq!(config.delete_batch_size, 10);
    }

    #[test]
    fn test_incomplete_remote_resolves_to_none() {
        let mut settings = AppConfig::default().storage;
        settings.remote = Some(RemoteStoreSettings {
            enabled: true,
            endpoint: "https://account.r2.cloudflarestorage.com".to_string(),
            bucket: "print-jobs".to_string(),
            access_key_id: String::new(),
            secret_access_key: "secret".to_string(),
            region: "auto".to_string(),
            force_path_style: false,
            public_base_url: None,
        });
        let config = StorageConfig::from_settings(&settings).expect("valid settings");
        assert!(config.remote.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = StorageConfig::default().with_upload_policy(UploadPolicy {
            part_size: 0,
            ..UploadPolicy::default()
        });
        assert!(matches!(
            config.validate(),
            Err(StorageError::Configuration(_))
        ));

        let config = StorageConfig::default().with_max_concurrent_files(0);
        assert!(config.validate().is_err());

        let config = StorageConfig::default().with_max_failure_rate_percent(101);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_object_url() {
        let remote = RemoteConfig::new("https://r2.example", "print-jobs", "k", "s");
        assert_eq!(
            remote.object_url("orders/a.pdf"),
            "https://print-jobs.r2.cloudflarestorage.com/orders/a.pdf"
        );
        assert_eq!(
            object_url(Some("https://cdn.example/"), "print-jobs", "orders/a.pdf"),
            "https://cdn.example/orders/a.pdf"
        );
    }
}
