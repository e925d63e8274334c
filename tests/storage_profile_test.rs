//! Upload flow and profile bootstrap against the in-memory gateway.

use std::sync::Arc;

use async_trait::async_trait;

use agora::gateway::{ObjectStore, TextExtractor, UnavailableExtractor};
use agora::models::file_models::{FileUpload, MAX_FILE_SIZE};
use agora::models::user_models::{SessionUser, UserRole};
use agora::{MemoryGateway, ProfileCoordinator, StorageCoordinator};

struct CannedExtractor;

#[async_trait]
impl TextExtractor for CannedExtractor {
    async fn extract(
        &self,
        _file_name: &str,
        _content_type: &str,
        _bytes: &[u8],
    ) -> Result<String, String> {
        Ok("extracted text".to_string())
    }
}

fn pdf(name: &str) -> FileUpload {
    FileUpload { name: name.to_string(), content_type: "application/pdf".to_string(), bytes: vec![1, 2, 3] }
}

fn storage(extractor: Arc<dyn TextExtractor>) -> (Arc<MemoryGateway>, StorageCoordinator) {
    let gateway = Arc::new(MemoryGateway::new());
    let coordinator = StorageCoordinator::new(gateway.clone(), extractor, "uploads");
    (gateway, coordinator)
}

#[tokio::test]
async fn upload_extracts_text_and_lists_the_object() {
    let (gateway, coordinator) = storage(Arc::new(CannedExtractor));
    coordinator.check_bucket().await.expect("bucket");
    assert_eq!(coordinator.snapshot().bucket_ready, Some(true));

    let uploaded = coordinator.upload_files(vec![pdf("notes.pdf")]).await.expect("upload");

    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0].extracted_text.as_deref(), Some("extracted text"));
    assert!(uploaded[0].text_extraction_error.is_none());
    assert!(uploaded[0].url.starts_with("memory://uploads/"));
    assert!(uploaded[0].url.ends_with(".pdf"));

    let objects = gateway.list("uploads").await.expect("list");
    assert_eq!(objects.len(), 1);
    assert_eq!(coordinator.snapshot().files.len(), 1);
    assert!(!coordinator.snapshot().uploading);
}

#[tokio::test]
async fn extraction_failure_is_recorded_per_file_not_fatal() {
    let (_gateway, coordinator) = storage(Arc::new(UnavailableExtractor));
    coordinator.check_bucket().await.expect("bucket");

    let uploaded = coordinator.upload_files(vec![pdf("notes.pdf")]).await.expect("upload");

    assert_eq!(uploaded.len(), 1);
    assert!(uploaded[0].extracted_text.is_none());
    assert!(uploaded[0].text_extraction_error.is_some());
}

#[tokio::test]
async fn images_skip_text_extraction() {
    let (_gateway, coordinator) = storage(Arc::new(UnavailableExtractor));
    coordinator.check_bucket().await.expect("bucket");

    let image = FileUpload {
        name: "photo.png".to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0; 16],
    };
    let uploaded = coordinator.upload_files(vec![image]).await.expect("upload");

    assert!(uploaded[0].extracted_text.is_none());
    assert!(uploaded[0].text_extraction_error.is_none());
}

#[tokio::test]
async fn disallowed_and_oversized_files_are_rejected_client_side() {
    let (gateway, coordinator) = storage(Arc::new(CannedExtractor));
    coordinator.check_bucket().await.expect("bucket");

    let exe = FileUpload {
        name: "malware.exe".to_string(),
        content_type: "application/octet-stream".to_string(),
        bytes: vec![0; 8],
    };
    let err = coordinator.upload_files(vec![exe]).await.err().expect("must fail");
    assert!(matches!(err, agora::AppError::Validation(_)), "got {err}");

    let huge = FileUpload {
        name: "huge.png".to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0; (MAX_FILE_SIZE + 1) as usize],
    };
    let err = coordinator.upload_files(vec![huge]).await.err().expect("must fail");
    assert!(matches!(err, agora::AppError::Validation(_)), "got {err}");

    assert!(gateway.list("uploads").await.expect("list").is_empty(), "nothing left the machine");
    assert!(coordinator.snapshot().error.is_some());
}

#[tokio::test]
async fn delete_and_download_round_trip() {
    let (gateway, coordinator) = storage(Arc::new(CannedExtractor));
    coordinator.check_bucket().await.expect("bucket");
    let uploaded = coordinator.upload_files(vec![pdf("notes.pdf")]).await.expect("upload");

    let bytes = coordinator.download(&uploaded[0]).await.expect("download");
    assert_eq!(bytes, vec![1, 2, 3]);

    coordinator.delete_file(&uploaded[0]).await.expect("delete");
    assert!(coordinator.snapshot().files.is_empty());
    assert!(gateway.list("uploads").await.expect("list").is_empty());
}

#[tokio::test]
async fn bucket_failure_is_reported_with_instructions() {
    let (gateway, coordinator) = storage(Arc::new(CannedExtractor));
    gateway.set_fail_writes(true);

    let err = coordinator.check_bucket().await.err().expect("must fail");
    assert!(matches!(err, agora::AppError::Write(_)), "got {err}");
    gateway.set_fail_writes(false);

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.bucket_ready, Some(false));
    assert!(snapshot.error.as_deref().unwrap_or_default().contains("uploads"));
}

#[tokio::test]
async fn profile_is_created_on_first_sight_with_default_role() {
    let gateway = Arc::new(MemoryGateway::new());
    let coordinator = ProfileCoordinator::new(gateway.clone());
    let user = SessionUser { id: uuid::Uuid::new_v4(), email: "newbie@example.com".to_string() };

    let created = coordinator.load(&user).await.expect("load");
    assert_eq!(created.role, UserRole::User);
    assert!(!coordinator.is_admin());

    // Second load finds the same row instead of creating another.
    let again = coordinator.load(&user).await.expect("load");
    assert_eq!(again.id, created.id);
}

#[tokio::test]
async fn role_update_persists_and_flips_the_admin_flag() {
    let gateway = Arc::new(MemoryGateway::new());
    let coordinator = ProfileCoordinator::new(gateway.clone());
    let user = SessionUser { id: uuid::Uuid::new_v4(), email: "chair@example.com".to_string() };
    coordinator.load(&user).await.expect("load");

    let updated = coordinator.update_role(UserRole::Admin).await.expect("update");
    assert_eq!(updated.role, UserRole::Admin);
    assert!(coordinator.is_admin());

    coordinator.reset();
    assert!(!coordinator.is_admin());
    assert!(coordinator.snapshot().profile.is_none());
}
