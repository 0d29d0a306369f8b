use std::time::Duration;

use bytes::Bytes;

use super::*;
use crate::storage::remote::MemoryObjectStore;

fn policy(max_concurrent_parts: usize) -> UploadPolicy {
    UploadPolicy {
        multipart_threshold: 10,
        part_size: 4,
        max_concurrent_parts,
    }
}

fn client_with(store: MemoryObjectStore, max_concurrent_parts: usize) -> ObjectStoreClient<MemoryObjectStore> {
    let config = StorageConfig::default().with_upload_policy(policy(max_concurrent_parts));
    ObjectStoreClient::new(store, &config)
}

fn client() -> ObjectStoreClient<MemoryObjectStore> {
    client_with(MemoryObjectStore::new("print-jobs"), 2)
}

fn payload(len: u8) -> Bytes {
    Bytes::from((0..len).collect::<Vec<u8>>())
}

#[tokio::test]
async fn test_direct_upload_returns_public_url() {
    let client = client();
    let result = client
        .upload("orders/a.pdf", payload(3), "application/pdf")
        .await
        .unwrap();

    assert_eq!(result.strategy, UploadStrategy::Direct);
    assert_eq!(result.total_parts, 1);
    assert_eq!(result.bucket, "print-jobs");
    assert!(result.url.ends_with("/orders/a.pdf"));
    assert_eq!(client.store().object("orders/a.pdf"), Some(payload(3)));
}

#[tokio::test]
async fn test_intelligent_upload_routes_by_threshold() {
    let client = client();

    let at_threshold = client
        .intelligent_upload("exact.pdf", payload(10), "application/pdf")
        .await
        .unwrap();
    assert_eq!(at_threshold.strategy, UploadStrategy::Direct);

    let above = client
        .intelligent_upload("large.pdf", payload(11), "application/pdf")
        .await
        .unwrap();
    assert_eq!(above.strategy, UploadStrategy::Multipart);
    assert_eq!(above.total_parts, 3);
    assert_eq!(client.store().object("large.pdf"), Some(payload(11)));
}

#[tokio::test]
async fn test_failed_part_aborts_and_leaves_no_object() {
    let client = client();
    client.store().fail_part(3);

    let err = client
        .multipart_upload("orders/big.pdf", payload(20), "application/pdf")
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(client.store().object("orders/big.pdf").is_none());
    assert_eq!(client.store().aborted_uploads(), vec!["upload-1".to_string()]);
    assert!(client.store().pending_uploads().is_empty());
    assert!(client.store().completed_part_lists().is_empty());
}

#[tokio::test]
async fn test_completion_list_sorted_when_parts_finish_out_of_order() {
    let store = MemoryObjectStore::new("print-jobs").with_part_delay(Duration::from_millis(40));
    let client = client_with(store, 5);

    client
        .multipart_upload("orders/big.pdf", payload(20), "application/pdf")
        .await
        .unwrap();

    assert_eq!(client.store().completed_part_lists(), vec![vec![1, 2, 3, 4, 5]]);
    assert_eq!(client.store().object("orders/big.pdf"), Some(payload(20)));
}

#[tokio::test]
async fn test_part_concurrency_is_bounded() {
    let store = MemoryObjectStore::new("print-jobs").with_part_delay(Duration::from_millis(20));
    let client = client_with(store, 2);

    client
        .multipart_upload("orders/big.pdf", payload(20), "application/pdf")
        .await
        .unwrap();

    let observed = client.store().max_in_flight_parts();
    assert!((1..=2).contains(&observed), "observed {observed} parts in flight");
}

#[tokio::test]
async fn test_part_concurrency_is_scoped_per_transfer() {
    let store = MemoryObjectStore::new("print-jobs").with_part_delay(Duration::from_millis(20));
    let client = client_with(store, 2);

    let (first, second) = tokio::join!(
        client.multipart_upload("orders/first.pdf", payload(40), "application/pdf"),
        client.multipart_upload("orders/second.pdf", payload(40), "application/pdf"),
    );
    assert_eq!(first.unwrap().total_parts, 10);
    assert_eq!(second.unwrap().total_parts, 10);

    let store = client.store();
    for upload_id in ["upload-1", "upload-2"] {
        let observed = store.max_in_flight_parts_for(upload_id);
        assert!((1..=2).contains(&observed), "{upload_id}: {observed} parts in flight");
    }
    let combined = store.max_in_flight_parts();
    assert!((3..=4).contains(&combined), "{combined} parts in flight across transfers");
}

#[tokio::test]
async fn test_multipart_upload_rejects_too_many_parts_before_creating() {
    let client = client();
    let bytes = Bytes::from(vec![0u8; 4 * 10_001]);

    let err = client
        .multipart_upload("orders/huge.pdf", bytes, "application/pdf")
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::TooManyParts { parts: 10_001, max: 10_000, .. }));
    assert!(!err.is_retryable());
    assert!(client.store().pending_uploads().is_empty());
    assert!(client.store().aborted_uploads().is_empty());
}

#[tokio::test]
async fn test_empty_multipart_sends_single_part() {
    let client = client();
    let result = client
        .multipart_upload("empty.pdf", Bytes::new(), "application/pdf")
        .await
        .unwrap();

    assert_eq!(result.total_parts, 1);
    assert_eq!(client.store().object("empty.pdf"), Some(Bytes::new()));
}

#[tokio::test]
async fn test_batch_delete_continues_past_failures() {
    let client = client();
    for key in ["k1", "k2", "k3"] {
        client.store().insert(key, Bytes::from_static(b"x"), "text/plain");
    }
    client.store().fail_delete("k2");

    let keys = vec!["k1".to_string(), "k2".to_string(), "k3".to_string()];
    let result = client.batch_delete(&keys).await;

    assert_eq!(result.success, vec!["k1".to_string(), "k3".to_string()]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].key, "k2");
    assert_eq!(client.store().object_count(), 1);
}

#[tokio::test]
async fn test_download_url_dispositions() {
    let client = client();

    let attachment = client
        .presigned_download_url("a.pdf", ContentDisposition::Attachment, Some("My \"Doc\".pdf"))
        .await
        .unwrap();
    assert_eq!(attachment.method, "GET");
    assert!(
        attachment
            .url
            .contains("response-content-disposition=attachment; filename=\"My _Doc_.pdf\"")
    );
    assert!(attachment.url.contains("response-content-type=application/octet-stream"));

    let inline = client
        .presigned_download_url("a.pdf", ContentDisposition::Inline, Some("a.pdf"))
        .await
        .unwrap();
    assert!(inline.url.contains("response-content-disposition=inline"));
    assert!(!inline.url.contains("response-content-type"));

    let print = client
        .presigned_print_url("a.pdf", "application/pdf", "a.pdf")
        .await
        .unwrap();
    assert!(print.url.contains("inline; filename=\"a.pdf\""));
    assert!(print.url.contains("response-content-type=application/pdf"));
    assert!(print.url.contains("X-Expires=3600"));
}

#[tokio::test]
async fn test_upload_url_carries_content_type_header() {
    let client = client();
    let presigned = client
        .presigned_upload_url("a.pdf", "application/pdf")
        .await
        .unwrap();

    assert_eq!(presigned.method, "PUT");
    assert!(presigned.url.contains("X-Expires=7200"));
    assert_eq!(
        presigned.headers.get("Content-Type").map(String::as_str),
        Some("application/pdf")
    );
    assert!(presigned.expires_at > Utc::now());
}

fn pending(name: &str, size: u64) -> PendingFile {
    PendingFile {
        name: name.to_string(),
        mime_type: "application/pdf".to_string(),
        size,
    }
}

#[tokio::test]
async fn test_batch_presigned_urls_plans_each_file() {
    let client = client();
    let files = [pending("small.pdf", 5), pending("large.pdf", 18)];

    let plans = client.batch_presigned_urls(&files, "42").await.unwrap();
    assert_eq!(plans.len(), 2);

    assert!(matches!(&plans[0], PresignedUploadPlan::Direct { filename, .. } if filename == "small.pdf"));
    assert!(plans[0].key().starts_with("orders/"));
    assert!(plans[0].key().contains("/order-42/"));

    let PresignedUploadPlan::Multipart {
        upload_id,
        total_parts,
        parts,
        ..
    } = &plans[1]
    else {
        panic!("large file should be multipart");
    };
    assert_eq!(*total_parts, 5);
    let numbers: Vec<u32> = parts.iter().map(|p| p.part_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    assert_eq!(parts[4].byte_range, 16..18);
    assert!(parts[1].upload_url.url.contains(&format!("uploadId={upload_id}")));
    assert_eq!(client.store().pending_uploads(), vec![upload_id.clone()]);

    let json = serde_json::to_value(&plans[1]).unwrap();
    assert_eq!(json["uploadType"], "multipart");
    assert_eq!(json["totalParts"], 5);
}

#[tokio::test]
async fn test_batch_presigned_urls_aborts_created_uploads_on_failure() {
    let client = client();
    client.store().fail_puts_containing("bad");
    let files = [pending("good.pdf", 20), pending("bad.pdf", 20)];

    let err = client.batch_presigned_urls(&files, "42").await.unwrap_err();

    assert!(matches!(err, StorageError::Transfer { operation: "create_multipart", .. }));
    assert_eq!(client.store().aborted_uploads(), vec!["upload-1".to_string()]);
    assert!(client.store().pending_uploads().is_empty());
}

#[tokio::test]
async fn test_batch_presigned_urls_rejects_files_needing_too_many_parts() {
    let client = client();

    let err = client
        .batch_presigned_urls(&[pending("huge.pdf", 4 * 20_001)], "1")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::TooManyParts { parts: 20_001, .. }));

    let err = client
        .batch_presigned_urls(&[pending("endless.pdf", u64::MAX)], "1")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::TooManyParts { .. }));
    assert!(client.store().pending_uploads().is_empty());

    let files = [pending("large.pdf", 20), pending("huge.pdf", 4 * 20_001)];
    client.batch_presigned_urls(&files, "1").await.unwrap_err();
    assert_eq!(client.store().aborted_uploads(), vec!["upload-1".to_string()]);
    assert!(client.store().pending_uploads().is_empty());
}

#[tokio::test]
async fn test_complete_presigned_multipart_accepts_any_order() {
    let client = client();
    let store = client.store();
    let upload_id = store.create_multipart("big.pdf", "application/pdf").await.unwrap();

    let mut parts = Vec::new();
    for (n, chunk) in [(1, &b"abcd"[..]), (2, &b"ef"[..])] {
        let e_tag = store
            .upload_part("big.pdf", &upload_id, n, Bytes::copy_from_slice(chunk))
            .await
            .unwrap();
        parts.push(CompletedPart::new(n, e_tag));
    }
    parts.reverse();

    let result = client
        .complete_presigned_multipart("big.pdf", &upload_id, parts, Some(2))
        .await
        .unwrap();
    assert_eq!(result.total_parts, 2);
    assert_eq!(store.object("big.pdf"), Some(Bytes::from_static(b"abcdef")));
}

#[tokio::test]
async fn test_complete_presigned_multipart_rejects_gaps() {
    let client = client();
    let store = client.store();
    let upload_id = store.create_multipart("big.pdf", "application/pdf").await.unwrap();
    let e_tag = store
        .upload_part("big.pdf", &upload_id, 1, Bytes::from_static(b"abcd"))
        .await
        .unwrap();

    let err = client
        .complete_presigned_multipart("big.pdf", &upload_id, vec![CompletedPart::new(1, e_tag)], Some(2))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::InvalidParts(_)));
    assert_eq!(store.aborted_uploads(), vec![upload_id]);
    assert!(store.object("big.pdf").is_none());
}

#[tokio::test]
async fn test_exists_and_health_check() {
    let client = client();
    client.store().insert("a.pdf", Bytes::from_static(b"x"), "application/pdf");

    assert!(client.exists("a.pdf").await);
    assert!(!client.exists("missing.pdf").await);
    assert!(client.health_check().await);

    client.store().set_unreachable(true);
    assert!(!client.health_check().await);
}
