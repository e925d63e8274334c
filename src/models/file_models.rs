use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ALLOWED_FILE_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/gif",
    "image/webp",
];

pub const ALLOWED_EXTENSIONS: &[&str] =
    &[".pdf", ".docx", ".png", ".jpg", ".jpeg", ".gif", ".webp"];

pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Content types the text-extraction collaborator understands.
pub const TEXT_EXTRACTABLE_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

pub const TEXT_EXTRACTABLE_EXTENSIONS: &[&str] = &[".pdf", ".docx"];

/// A file handed to the storage coordinator for upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A file after upload: public URL plus whatever text extraction said.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub url: String,
    pub size: u64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub extracted_text: Option<String>,
    pub text_extraction_error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoredObject {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Default)]
pub struct FileValidationResult {
    pub valid: Vec<FileUpload>,
    pub rejected: Vec<FileUpload>,
    pub errors: Vec<String>,
}
