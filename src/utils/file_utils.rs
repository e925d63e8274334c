use std::collections::HashMap;

use chrono::Utc;
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::models::file_models::{
    FileUpload, FileValidationResult, ALLOWED_EXTENSIONS, ALLOWED_FILE_TYPES, MAX_FILE_SIZE,
};

static EXTENSION_MIME: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("pdf", "application/pdf"),
        (
            "docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        ("png", "image/png"),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("gif", "image/gif"),
        ("webp", "image/webp"),
    ])
});

pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: &[&str] = &["Bytes", "KB", "MB", "GB"];
    let exp = (bytes as f64).log(1024.0).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exp as i32);
    format!("{:.2} {}", value, UNITS[exp])
        .replace(".00 ", " ")
}

fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

/// MIME type for a file whose browser-reported type is empty.
pub fn mime_for_name(name: &str) -> Option<&'static str> {
    extension_of(&name.to_lowercase()).and_then(|ext| EXTENSION_MIME.get(ext).copied())
}

/// Client-side gate before any bytes leave the machine: allowed
/// type/extension and the 50 MB cap. Rejections carry a message per
/// file; valid files pass through untouched.
pub fn validate_files(files: Vec<FileUpload>) -> FileValidationResult {
    let mut result = FileValidationResult::default();

    for file in files {
        let lower = file.name.to_lowercase();
        let type_ok = ALLOWED_FILE_TYPES.contains(&file.content_type.as_str());
        let ext_ok = ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext));

        if !(type_ok || ext_ok) {
            result.errors.push(format!(
                "{}: File type not allowed. Only PDF, DOCX, and Image files are accepted.",
                file.name
            ));
            result.rejected.push(file);
        } else if file.size() > MAX_FILE_SIZE {
            result.errors.push(format!(
                "{}: File too large. Maximum size is 50MB.",
                file.name
            ));
            result.rejected.push(file);
        } else {
            result.valid.push(file);
        }
    }

    result
}

/// Object name that cannot collide with a concurrent upload of the same
/// file: timestamp plus a fresh id, original extension preserved.
pub fn unique_object_name(original: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    match extension_of(original) {
        Some(ext) => format!("{}-{}.{}", Utc::now().timestamp_millis(), &suffix[..12], ext),
        None => format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..12]),
    }
}
