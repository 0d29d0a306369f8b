//! Application configuration management.

use std::path::PathBuf;

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// File storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
}

/// File storage configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSettings {
    /// Remote S3-compatible store. Absent means unconfigured.
    #[serde(default)]
    pub remote: Option<RemoteStoreSettings>,
    /// Transfer tuning.
    #[serde(default)]
    pub transfer: TransferSettings,
    /// Presigned URL lifetimes.
    #[serde(default)]
    pub presign: PresignSettings,
    /// Local filesystem settings.
    #[serde(default)]
    pub local: LocalSettings,
}

/// Remote S3-compatible store credentials (Cloudflare R2, AWS S3, MinIO).
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteStoreSettings {
    /// Master switch; a disabled store is treated as unconfigured.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Endpoint URL.
    #[serde(default)]
    pub endpoint: String,
    /// Bucket name.
    #[serde(default)]
    pub bucket: String,
    /// Access key ID.
    #[serde(default)]
    pub access_key_id: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_access_key: String,
    /// Region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Use path-style addressing instead of virtual-hosted style.
    #[serde(default)]
    pub force_path_style: bool,
    /// Public base URL used to build object URLs after upload.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl RemoteStoreSettings {
    /// True when enabled and every credential field is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.enabled
            && !self.endpoint.trim().is_empty()
            && !self.bucket.trim().is_empty()
            && !self.access_key_id.trim().is_empty()
            && !self.secret_access_key.trim().is_empty()
    }
}

fn default_enabled() -> bool {
    true
}

fn default_region() -> String {
    "auto".to_string()
}

/// Transfer tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferSettings {
    /// Payloads above this size use multipart upload.
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold_bytes: u64,
    /// Size of each multipart part.
    #[serde(default = "default_part_size")]
    pub part_size_bytes: u64,
    /// In-flight parts per multipart transfer.
    #[serde(default = "default_max_concurrent_parts")]
    pub max_concurrent_parts: usize,
    /// Files saved concurrently per batch wave.
    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files_per_batch: usize,
    /// Descriptors resolved concurrently when building access URLs.
    #[serde(default = "default_url_batch_size")]
    pub url_batch_size: usize,
    /// Keys deleted concurrently in a batch delete.
    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,
    /// Batch saves fail when the failure rate is above this percentage.
    #[serde(default = "default_max_failure_rate")]
    pub max_failure_rate_percent: u8,
    /// Connection establishment timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Data transfer timeout in seconds.
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout_secs: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            multipart_threshold_bytes: default_multipart_threshold(),
            part_size_bytes: default_part_size(),
            max_concurrent_parts: default_max_concurrent_parts(),
            max_concurrent_files_per_batch: default_max_concurrent_files(),
            url_batch_size: default_url_batch_size(),
            delete_batch_size: default_delete_batch_size(),
            max_failure_rate_percent: default_max_failure_rate(),
            connect_timeout_secs: default_connect_timeout(),
            transfer_timeout_secs: default_transfer_timeout(),
        }
    }
}

fn default_multipart_threshold() -> u64 {
    10 * 1024 * 1024
}

fn default_part_size() -> u64 {
    10 * 1024 * 1024
}

fn default_max_concurrent_parts() -> usize {
    5
}

fn default_max_concurrent_files() -> usize {
    20
}

fn default_url_batch_size() -> usize {
    15
}

fn default_delete_batch_size() -> usize {
    10
}

fn default_max_failure_rate() -> u8 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_transfer_timeout() -> u64 {
    300 // 5 minutes
}

/// Presigned URL lifetimes.
#[derive(Debug, Clone, Deserialize)]
pub struct PresignSettings {
    /// Upload URL TTL in seconds.
    #[serde(default = "default_upload_ttl")]
    pub upload_ttl_secs: u64,
    /// Download URL TTL in seconds.
    #[serde(default = "default_download_ttl")]
    pub download_ttl_secs: u64,
    /// Print/inline-view URL TTL in seconds.
    #[serde(default = "default_download_ttl")]
    pub print_ttl_secs: u64,
}

impl Default for PresignSettings {
    fn default() -> Self {
        Self {
            upload_ttl_secs: default_upload_ttl(),
            download_ttl_secs: default_download_ttl(),
            print_ttl_secs: default_download_ttl(),
        }
    }
}

fn default_upload_ttl() -> u64 {
    7200 // 2 hours
}

fn default_download_ttl() -> u64 {
    3600 // 1 hour
}

/// Local filesystem settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalSettings {
    /// Root under which category directories are created.
    #[serde(default = "default_local_root")]
    pub root: PathBuf,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            root: default_local_root(),
        }
    }
}

fn default_local_root() -> PathBuf {
    PathBuf::from(".")
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("PRINTEASY").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
