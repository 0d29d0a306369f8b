//! Round-trip tests: save a file, resolve it for access, fetch the bytes back.

#![allow(clippy::cast_possible_truncation)]

use printeasy_core::storage::{
    AccessType, FileAccess, FileCategory, MemoryObjectStore, ObjectStoreClient, SaveMetadata,
    StorageConfig, StorageManager, StorageType, UploadFile, UploadPolicy,
};
use rstest::rstest;
use tempfile::TempDir;

fn manager() -> (TempDir, StorageManager<MemoryObjectStore>) {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig::default()
        .with_local_root(dir.path())
        .with_upload_policy(UploadPolicy {
            multipart_threshold: 64,
            part_size: 16,
            max_concurrent_parts: 3,
        });
    let client = ObjectStoreClient::new(MemoryObjectStore::new("print-jobs"), &config);
    let manager = StorageManager::new(client.into(), &config).unwrap();
    (dir, manager)
}

fn fetch(manager: &StorageManager<MemoryObjectStore>, access: &FileAccess) -> Vec<u8> {
    match access {
        FileAccess::Url(presigned) => manager
            .remote()
            .unwrap()
            .store()
            .fetch(&presigned.url)
            .unwrap()
            .to_vec(),
        FileAccess::Path(path) => std::fs::read(path).unwrap(),
    }
}

#[rstest]
#[case::direct(10)]
#[case::at_threshold(64)]
#[case::multipart(200)]
#[tokio::test]
async fn test_order_file_round_trip(#[case] size: usize) {
    let (_dir, manager) = manager();
    let bytes: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    let file = UploadFile::new("Final Report.pdf", "application/pdf", bytes.clone());

    let descriptor = manager
        .save_file(&file, FileCategory::Order, &SaveMetadata::for_order("55"))
        .await
        .unwrap();
    assert_eq!(descriptor.storage_type, StorageType::Remote);

    for access_type in [AccessType::Download, AccessType::View, AccessType::Print] {
        let access = manager
            .get_file_access(&descriptor, access_type)
            .await
            .unwrap();
        assert_eq!(fetch(&manager, &access), bytes);
    }
}

#[tokio::test]
async fn test_download_and_inline_dispositions_differ() {
    let (_dir, manager) = manager();
    let file = UploadFile::new("a.pdf", "application/pdf", &b"%PDF-1.7"[..]);
    let descriptor = manager
        .save_file(&file, FileCategory::Order, &SaveMetadata::for_order("1"))
        .await
        .unwrap();

    let download = manager
        .get_file_access(&descriptor, AccessType::Download)
        .await
        .unwrap()
        .location();
    let view = manager
        .get_file_access(&descriptor, AccessType::View)
        .await
        .unwrap()
        .location();
    let print = manager
        .get_file_access(&descriptor, AccessType::Print)
        .await
        .unwrap()
        .location();

    assert!(download.contains("attachment; filename=\"a.pdf\""));
    for inline in [&view, &print] {
        assert!(inline.contains("inline; filename=\"a.pdf\""));
        assert!(inline.contains("response-content-type=application/pdf"));
    }
}

#[tokio::test]
async fn test_local_file_round_trip() {
    let (_dir, manager) = manager();
    let file = UploadFile::new("hello.txt", "text/plain", &b"hello"[..]);

    let descriptor = manager
        .save_file(&file, FileCategory::Chat, &SaveMetadata::default())
        .await
        .unwrap();
    let access = manager
        .get_file_access(&descriptor, AccessType::Download)
        .await
        .unwrap();

    assert!(matches!(access, FileAccess::Path(_)));
    assert_eq!(fetch(&manager, &access), b"hello");
    assert_eq!(manager.read_file(&descriptor).await.unwrap().as_ref(), b"hello");
}

#[tokio::test]
async fn test_batch_urls_drop_unresolvable_files() {
    let (_dir, manager) = manager();
    let mut descriptors = Vec::new();
    for i in 0..20 {
        let file = UploadFile::new(format!("f{i}.pdf"), "application/pdf", vec![1, 2, 3]);
        descriptors.push(
            manager
                .save_file(&file, FileCategory::Order, &SaveMetadata::for_order("9"))
                .await
                .unwrap(),
        );
    }
    let removed = descriptors[4].clone();
    assert!(manager.delete_file(&removed).await);

    let resolved = manager
        .get_batch_urls(&descriptors, AccessType::View)
        .await;

    assert_eq!(resolved.len(), 19);
    assert!(resolved.iter().all(|r| r.id != removed.filename));
}

#[tokio::test]
async fn test_delete_files_across_backends() {
    let (_dir, manager) = manager();
    let remote = manager
        .save_file(
            &UploadFile::new("a.pdf", "application/pdf", &b"a"[..]),
            FileCategory::Order,
            &SaveMetadata::for_order("3"),
        )
        .await
        .unwrap();
    let local = manager
        .save_file(
            &UploadFile::new("qr.png", "image/png", &b"q"[..]),
            FileCategory::Qr,
            &SaveMetadata::default(),
        )
        .await
        .unwrap();
    manager
        .remote()
        .unwrap()
        .store()
        .fail_delete(remote.storage_key_or_path.clone());

    let result = manager.delete_files(&[remote.clone(), local.clone()]).await;

    assert_eq!(result.success, vec![local.storage_key_or_path]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].key, remote.storage_key_or_path);
    assert!(!manager.delete_file(&remote).await);
}
