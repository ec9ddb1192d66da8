//! Validation and storage of uploaded book files.

use std::path::Path;

use bookstore_kernel::settings::{BookSettings, MediaSettings};
use thiserror::Error;
use uuid::Uuid;

/// Subdirectory of the media root that book files are written to
pub const UPLOAD_DIR: &str = "books";

#[derive(Debug, Error)]
pub enum FileValidationError {
    #[error("Unsupported file extension. Only the following extensions are allowed: {allowed}")]
    UnsupportedExtension { allowed: String },

    #[error("Max file size is {limit_mb}MB")]
    TooLarge { limit_mb: u64 },

    #[error("file has no usable name: {0}")]
    InvalidName(String),

    #[error("failed to store book file: {0}")]
    Io(#[from] std::io::Error),
}

/// Lower-cased extension including the dot, or an empty string. A leading
/// dot alone (`.pdf`) is a hidden file name, not an extension.
pub fn file_extension(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(idx) if base[..idx].chars().any(|c| c != '.') => base[idx..].to_lowercase(),
        _ => String::new(),
    }
}

pub fn validate_file_extension(name: &str, books: &BookSettings) -> Result<(), FileValidationError> {
    let ext = file_extension(name);
    if books.file_valid_extensions.iter().any(|allowed| *allowed == ext) {
        Ok(())
    } else {
        Err(FileValidationError::UnsupportedExtension {
            allowed: books.file_valid_extensions.join(", "),
        })
    }
}

pub fn validate_file_size(size: u64, books: &BookSettings) -> Result<(), FileValidationError> {
    if size > books.file_size_limit_bytes() {
        Err(FileValidationError::TooLarge {
            limit_mb: books.file_size_limit_mb,
        })
    } else {
        Ok(())
    }
}

/// Validate `source` and copy it into `<media root>/books/`.
///
/// Returns the path relative to the media root. An existing file with the
/// same name is never overwritten; a random suffix is added instead.
pub async fn store_book_file(
    source: &Path,
    books: &BookSettings,
    media: &MediaSettings,
) -> Result<String, FileValidationError> {
    let file_name = source
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| FileValidationError::InvalidName(source.display().to_string()))?;

    validate_file_extension(file_name, books)?;
    let size = tokio::fs::metadata(source).await?.len();
    validate_file_size(size, books)?;

    let upload_dir = media.root.join(UPLOAD_DIR);
    tokio::fs::create_dir_all(&upload_dir).await?;

    let stored_name = available_name(&upload_dir, file_name).await;
    tokio::fs::copy(source, upload_dir.join(&stored_name)).await?;

    tracing::info!(source = %source.display(), stored = %stored_name, size, "book file stored");
    Ok(format!("{UPLOAD_DIR}/{stored_name}"))
}

async fn available_name(dir: &Path, file_name: &str) -> String {
    if !path_exists(&dir.join(file_name)).await {
        return file_name.to_string();
    }

    let (stem, ext) = if file_extension(file_name).is_empty() {
        (file_name, "")
    } else {
        file_name
            .rfind('.')
            .map_or((file_name, ""), |idx| file_name.split_at(idx))
    };
    loop {
        let suffix = Uuid::new_v4().simple().to_string();
        let candidate = format!("{stem}_{}{ext}", &suffix[..7]);
        if !path_exists(&dir.join(&candidate)).await {
            return candidate;
        }
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
