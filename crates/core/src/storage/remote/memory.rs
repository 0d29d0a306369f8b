//! In-memory object store for tests.
//!
//! Behaves like an S3 bucket for the operations the client uses, and can be
//! told to fail specific parts, puts or deletes. Multipart completions are
//! validated the way S3 validates them: parts must be sorted ascending with
//! no gaps and every ETag must match an uploaded part.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::{Bytes, BytesMut};

use super::store::{CompletedPart, ObjectHead, ObjectStore, PresignRequest};
use crate::storage::error::StorageError;

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Bytes,
    content_type: String,
}

#[derive(Debug)]
struct PendingUpload {
    key: String,
    content_type: String,
    parts: HashMap<u32, (String, Bytes)>,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: HashMap<String, StoredObject>,
    uploads: HashMap<String, PendingUpload>,
    next_upload_id: u64,
    aborted: Vec<String>,
    completions: Vec<Vec<u32>>,
    failing_parts: HashSet<u32>,
    failing_put_patterns: Vec<String>,
    failing_delete_keys: HashSet<String>,
    unreachable: bool,
}

/// In-memory bucket.
#[derive(Debug)]
pub struct MemoryObjectStore {
    bucket: String,
    state: Mutex<MemoryState>,
    part_delay: Option<Duration>,
    in_flight_parts: AtomicUsize,
    max_in_flight_parts: AtomicUsize,
    // upload ID -> (in flight now, highest seen)
    in_flight_by_upload: Mutex<HashMap<String, (usize, usize)>>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryObjectStore {
    /// Create an empty bucket.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            state: Mutex::new(MemoryState::default()),
            part_delay: None,
            in_flight_parts: AtomicUsize::new(0),
            max_in_flight_parts: AtomicUsize::new(0),
            in_flight_by_upload: Mutex::new(HashMap::new()),
        }
    }

    /// Delay each part upload by `delay / part_number`, so later parts finish first.
    #[must_use]
    pub fn with_part_delay(mut self, delay: Duration) -> Self {
        self.part_delay = Some(delay);
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail every upload of the given part number.
    pub fn fail_part(&self, part_number: u32) {
        self.state().failing_parts.insert(part_number);
    }

    /// Fail puts and multipart creations whose key contains `pattern`.
    pub fn fail_puts_containing(&self, pattern: impl Into<String>) {
        self.state().failing_put_patterns.push(pattern.into());
    }

    /// Fail deletes of `key`.
    pub fn fail_delete(&self, key: impl Into<String>) {
        self.state().failing_delete_keys.insert(key.into());
    }

    /// Make health checks fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Insert an object directly.
    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Bytes>, content_type: &str) {
        self.state().objects.insert(
            key.into(),
            StoredObject {
                bytes: bytes.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    /// Bytes stored at `key`.
    #[must_use]
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.state().objects.get(key).map(|o| o.bytes.clone())
    }

    /// Number of stored objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.state().objects.len()
    }

    /// Upload IDs that were aborted, in order.
    #[must_use]
    pub fn aborted_uploads(&self) -> Vec<String> {
        self.state().aborted.clone()
    }

    /// Part numbers of every successful completion, as sent.
    #[must_use]
    pub fn completed_part_lists(&self) -> Vec<Vec<u32>> {
        self.state().completions.clone()
    }

    /// Multipart transactions neither completed nor aborted.
    #[must_use]
    pub fn pending_uploads(&self) -> Vec<String> {
        self.state().uploads.keys().cloned().collect()
    }

    /// Highest number of part uploads observed in flight at once.
    #[must_use]
    pub fn max_in_flight_parts(&self) -> usize {
        self.max_in_flight_parts.load(Ordering::SeqCst)
    }

    /// Highest number of parts of one transaction observed in flight at once.
    #[must_use]
    pub fn max_in_flight_parts_for(&self, upload_id: &str) -> usize {
        self.in_flight_by_upload()
            .get(upload_id)
            .map_or(0, |(_, max)| *max)
    }

    fn in_flight_by_upload(&self) -> MutexGuard<'_, HashMap<String, (usize, usize)>> {
        self.in_flight_by_upload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_part(&self, upload_id: &str) -> InFlightGuard<'_> {
        let now = self.in_flight_parts.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight_parts.fetch_max(now, Ordering::SeqCst);

        let mut by_upload = self.in_flight_by_upload();
        let (current, max) = by_upload.entry(upload_id.to_string()).or_default();
        *current += 1;
        *max = (*max).max(*current);

        InFlightGuard {
            store: self,
            upload_id: upload_id.to_string(),
        }
    }

    /// Resolve a URL issued by [`ObjectStore::presign`] for a GET.
    #[must_use]
    pub fn fetch(&self, url: &str) -> Option<Bytes> {
        let rest = url.strip_prefix("memory://")?;
        let (bucket, rest) = rest.split_once('/')?;
        if bucket != self.bucket {
            return None;
        }
        let (key, _query) = rest.split_once('?').unwrap_or((rest, ""));
        self.object(key)
    }

    fn put_should_fail(&self, key: &str) -> bool {
        self.state()
            .failing_put_patterns
            .iter()
            .any(|pattern| key.contains(pattern.as_str()))
    }
}

struct InFlightGuard<'a> {
    store: &'a MemoryObjectStore,
    upload_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.store.in_flight_parts.fetch_sub(1, Ordering::SeqCst);
        if let Some((current, _)) = self.store.in_flight_by_upload().get_mut(&self.upload_id) {
            *current = current.saturating_sub(1);
        }
    }
}

impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        if self.put_should_fail(key) {
            return Err(StorageError::transfer("put", key, "injected failure"));
        }
        self.insert(key, body, content_type);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        self.object(key).ok_or_else(|| StorageError::not_found(key))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>, StorageError> {
        Ok(self.state().objects.get(key).map(|o| ObjectHead {
            size: o.bytes.len() as u64,
            content_type: Some(o.content_type.clone()),
            e_tag: None,
        }))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut state = self.state();
        if state.failing_delete_keys.contains(key) {
            return Err(StorageError::transfer("delete", key, "injected failure"));
        }
        state.objects.remove(key);
        Ok(())
    }

    async fn create_multipart(&self, key: &str, content_type: &str) -> Result<String, StorageError> {
        if self.put_should_fail(key) {
            return Err(StorageError::transfer(
                "create_multipart",
                key,
                "injected failure",
            ));
        }
        let mut state = self.state();
        state.next_upload_id += 1;
        let upload_id = format!("upload-{}", state.next_upload_id);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: HashMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, StorageError> {
        let _guard = self.begin_part(upload_id);

        if let Some(delay) = self.part_delay {
            tokio::time::sleep(delay / part_number.max(1)).await;
        }

        let mut state = self.state();
        if state.failing_parts.contains(&part_number) {
            return Err(StorageError::transfer(
                "upload_part",
                key,
                format!("injected failure on part {part_number}"),
            ));
        }
        let upload = state
            .uploads
            .get_mut(upload_id)
            .filter(|upload| upload.key == key)
            .ok_or_else(|| StorageError::transfer("upload_part", key, "NoSuchUpload"))?;
        let e_tag = format!("\"{upload_id}-{part_number}\"");
        upload.parts.insert(part_number, (e_tag.clone(), body));
        Ok(e_tag)
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError> {
        let mut state = self.state();
        let upload = state
            .uploads
            .get(upload_id)
            .filter(|upload| upload.key == key)
            .ok_or_else(|| StorageError::transfer("complete_multipart", key, "NoSuchUpload"))?;

        let mut body = BytesMut::new();
        for (index, part) in parts.iter().enumerate() {
            if usize::try_from(part.part_number).ok() != Some(index + 1) {
                return Err(StorageError::transfer(
                    "complete_multipart",
                    key,
                    "InvalidPartOrder",
                ));
            }
            match upload.parts.get(&part.part_number) {
                Some((e_tag, bytes)) if *e_tag == part.e_tag => body.extend_from_slice(bytes),
                _ => {
                    return Err(StorageError::transfer(
                        "complete_multipart",
                        key,
                        "InvalidPart",
                    ));
                }
            }
        }

        let content_type = upload.content_type.clone();
        state.uploads.remove(upload_id);
        state
            .completions
            .push(parts.iter().map(|p| p.part_number).collect());
        state.objects.insert(
            key.to_string(),
            StoredObject {
                bytes: body.freeze(),
                content_type,
            },
        );
        Ok(())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<(), StorageError> {
        let mut state = self.state();
        state.aborted.push(upload_id.to_string());
        match state.uploads.remove(upload_id) {
            Some(_) => Ok(()),
            None => Err(StorageError::transfer("abort_multipart", key, "NoSuchUpload")),
        }
    }

    async fn presign(
        &self,
        request: PresignRequest<'_>,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let mut url = format!(
            "memory://{}/{}?X-Method={}&X-Expires={}",
            self.bucket,
            request.key(),
            request.method(),
            expires_in.as_secs()
        );
        match &request {
            PresignRequest::PutObject { content_type, .. } => {
                url.push_str(&format!("&content-type={content_type}"));
            }
            PresignRequest::UploadPart {
                upload_id,
                part_number,
                ..
            } => {
                url.push_str(&format!("&uploadId={upload_id}&partNumber={part_number}"));
            }
            PresignRequest::GetObject {
                content_disposition,
                content_type,
                ..
            } => {
                if let Some(disposition) = content_disposition {
                    url.push_str(&format!("&response-content-disposition={disposition}"));
                }
                if let Some(content_type) = content_type {
                    url.push_str(&format!("&response-content-type={content_type}"));
                }
            }
        }
        Ok(url)
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        if self.state().unreachable {
            return Err(StorageError::transfer(
                "head_bucket",
                &self.bucket,
                "bucket unreachable",
            ));
        }
        Ok(())
    }
}
