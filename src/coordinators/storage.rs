//! Attachment uploads: bucket readiness, client-side validation, the
//! upload loop with per-file text extraction, and deletion by public
//! URL.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::warn;

use crate::gateway::{ObjectStore, TextExtractor};
use crate::models::file_models::{
    FileUpload, UploadedFile, TEXT_EXTRACTABLE_EXTENSIONS, TEXT_EXTRACTABLE_TYPES,
};
use crate::state::{SharedState, StorageSnapshot};
use crate::utils::error::{AppError, AppResult};
use crate::utils::file_utils::{unique_object_name, validate_files};

#[derive(Clone)]
pub struct StorageCoordinator {
    store: Arc<dyn ObjectStore>,
    extractor: Arc<dyn TextExtractor>,
    bucket: String,
    state: SharedState<StorageSnapshot>,
}

impl StorageCoordinator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn TextExtractor>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            store,
            extractor,
            bucket: bucket.into(),
            state: SharedState::new(StorageSnapshot::default()),
        }
    }

    pub fn snapshot(&self) -> StorageSnapshot {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<StorageSnapshot> {
        self.state.subscribe()
    }

    /// Probe the bucket, creating it when missing. A bucket that cannot
    /// be created is recorded as not ready along with instructions; the
    /// upload path refuses until it is.
    pub async fn check_bucket(&self) -> AppResult<()> {
        match self.store.ensure_bucket(&self.bucket).await {
            Ok(()) => {
                self.state.update(|s| {
                    s.bucket_ready = Some(true);
                    s.error = None;
                });
                Ok(())
            }
            Err(err) => {
                let message = format!(
                    "Storage error: {}. Please create the '{}' bucket manually in your project dashboard.",
                    err, self.bucket
                );
                self.state.update(|s| {
                    s.bucket_ready = Some(false);
                    s.error = Some(message.clone());
                });
                Err(AppError::Write(message))
            }
        }
    }

    /// Validate, then upload each file in turn: unique object name,
    /// public URL, and text extraction for PDF/DOCX payloads. A failed
    /// extraction is recorded on the file; a failed upload aborts the
    /// rest of the batch. Returns the files that made it up.
    pub async fn upload_files(&self, files: Vec<FileUpload>) -> AppResult<Vec<UploadedFile>> {
        if files.is_empty() {
            return Err(AppError::Validation("please select files to upload".to_string()));
        }

        let result = validate_files(files);
        if !result.errors.is_empty() {
            let message = result.errors.join("; ");
            self.state.update(|s| s.error = Some(message.clone()));
            return Err(AppError::Validation(message));
        }

        self.state.update(|s| {
            s.uploading = true;
            s.error = None;
        });

        let mut uploaded = Vec::with_capacity(result.valid.len());
        for file in result.valid {
            let object_name = unique_object_name(&file.name);
            if let Err(err) =
                self.store.upload(&self.bucket, &object_name, &file.bytes, &file.content_type).await
            {
                let message = format!("failed to upload {}: {}", file.name, err);
                self.state.update(|s| {
                    s.uploading = false;
                    s.error = Some(message.clone());
                });
                return Err(AppError::Write(message));
            }

            let url = self.store.public_url(&self.bucket, &object_name);

            let mut extracted_text = None;
            let mut text_extraction_error = None;
            if is_text_extractable(&file) {
                match self.extractor.extract(&file.name, &file.content_type, &file.bytes).await {
                    Ok(text) => extracted_text = Some(text),
                    Err(err) => {
                        warn!(file = %file.name, error = %err, "text extraction failed");
                        text_extraction_error = Some(err);
                    }
                }
            }

            uploaded.push(UploadedFile {
                name: file.name,
                url,
                size: file.bytes.len() as u64,
                content_type: file.content_type,
                uploaded_at: Utc::now(),
                extracted_text,
                text_extraction_error,
            });
        }

        self.state.update(|s| {
            s.uploading = false;
            s.files.extend(uploaded.clone());
        });
        Ok(uploaded)
    }

    /// Remove a previously uploaded file, locating the object by the
    /// tail of its public URL.
    pub async fn delete_file(&self, file: &UploadedFile) -> AppResult<()> {
        let object_name = file
            .url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::Validation(format!("not an object url: {}", file.url)))?;

        self.store
            .remove(&self.bucket, object_name)
            .await
            .map_err(|e| AppError::Write(format!("failed to delete file: {}", e)))?;

        let url = file.url.clone();
        self.state.update(|s| s.files.retain(|f| f.url != url));
        Ok(())
    }

    pub async fn download(&self, file: &UploadedFile) -> AppResult<Vec<u8>> {
        self.store
            .download(&file.url)
            .await
            .map_err(|e| AppError::Fetch(format!("failed to download file: {}", e)))
    }
}

fn is_text_extractable(file: &FileUpload) -> bool {
    let lower = file.name.to_lowercase();
    TEXT_EXTRACTABLE_TYPES.contains(&file.content_type.as_str())
        || TEXT_EXTRACTABLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
