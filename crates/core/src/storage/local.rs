//! Local filesystem adapter for low-durability artifacts (QR codes, chat attachments).

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use chrono::Utc;
use opendal::{ErrorKind, Operator, services};
use tracing::{debug, info};

use super::error::StorageError;
use super::keys::sanitize_filename;
use super::types::{FileCategory, FileDescriptor, StorageType, UploadFile};

/// Writes files under `<root>/<category directory>/`.
///
/// Filenames are `<millis>-<index>-<sanitized name>`, unique per batch by
/// construction. Directories are created on first write.
#[derive(Debug, Clone)]
pub struct LocalFsAdapter {
    operator: Operator,
    root: PathBuf,
}

impl LocalFsAdapter {
    /// Create an adapter rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the root is not valid UTF-8 or the
    /// operator cannot be built.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        let builder = services::Fs::default().root(
            root.to_str()
                .ok_or_else(|| StorageError::configuration("invalid local root path"))?,
        );
        let operator = Operator::new(builder)
            .map_err(|e| StorageError::configuration(e.to_string()))?
            .finish();

        Ok(Self { operator, root })
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist `file` under the category directory.
    ///
    /// # Errors
    ///
    /// Returns `Local` if the write fails.
    pub async fn save(
        &self,
        file: &UploadFile,
        category: FileCategory,
        index: usize,
    ) -> Result<FileDescriptor, StorageError> {
        let filename = format!(
            "{}-{index}-{}",
            Utc::now().timestamp_millis(),
            sanitize_filename(&file.original_name)
        );
        let relative = format!("{}/{filename}", category.directory());

        self.operator.write(&relative, file.bytes.clone()).await?;
        info!(path = %relative, size = file.size(), ?category, "File saved locally");

        Ok(FileDescriptor {
            filename,
            original_name: file.original_name.clone(),
            mime_type: file.mime_type.clone(),
            size_bytes: file.size(),
            storage_key_or_path: relative,
            storage_type: StorageType::Local,
            bucket: None,
        })
    }

    /// Read a stored file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file is missing.
    pub async fn read(&self, relative: &str) -> Result<Bytes, StorageError> {
        let relative = checked(relative)?;
        let buffer = self
            .operator
            .read(relative)
            .await
            .map_err(|e| not_found_or_local(e, relative))?;
        Ok(buffer.to_bytes())
    }

    /// Absolute path of a stored file, after checking it exists.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file is missing.
    pub async fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let relative = checked(relative)?;
        self.operator
            .stat(relative)
            .await
            .map_err(|e| not_found_or_local(e, relative))?;
        Ok(self.root.join(relative))
    }

    /// Delete a stored file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file is already gone, `Local` on I/O failure.
    pub async fn delete(&self, relative: &str) -> Result<(), StorageError> {
        let relative = checked(relative)?;
        self.operator
            .stat(relative)
            .await
            .map_err(|e| not_found_or_local(e, relative))?;
        self.operator.delete(relative).await?;
        debug!(path = %relative, "Deleted local file");
        Ok(())
    }
}

/// Reject absolute paths and parent traversal.
fn checked(relative: &str) -> Result<&str, StorageError> {
    let path = Path::new(relative);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if relative.is_empty() || escapes {
        return Err(StorageError::Local(format!(
            "path '{relative}' is outside the storage root"
        )));
    }
    Ok(relative)
}

fn not_found_or_local(err: opendal::Error, relative: &str) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::not_found(relative)
    } else {
        StorageError::from(err)
    }
}
