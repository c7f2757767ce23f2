//! On-disk document store and content hashing.
//!
//! Uploaded originals live under `<data_dir>/documents/<person>/[<folder>/]`
//! with a generated file name; the database keeps the path relative to the
//! data directory.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const DOCUMENTS_DIR: &str = "documents";
const STAGING_DIR: &str = "tmp";

/// Compute SHA-256 hash of a byte slice, returning a hex string.
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Lowercased extension of an uploaded file name, empty when there is none
pub fn file_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Relative storage path for a new upload
pub fn document_path(person_id: &str, folder_id: Option<&str>, extension: &str) -> PathBuf {
    let mut path = PathBuf::from(DOCUMENTS_DIR).join(person_id);
    if let Some(folder_id) = folder_id {
        path.push(folder_id);
    }

    let stem = uuid::Uuid::new_v4().to_string();
    if extension.is_empty() {
        path.push(stem);
    } else {
        path.push(format!("{}.{}", stem, extension));
    }
    path
}

/// Write `content` to `data_dir/relative`, creating parent directories
pub fn store(data_dir: &Path, relative: &Path, content: &[u8]) -> std::io::Result<PathBuf> {
    let full = data_dir.join(relative);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&full, content)?;
    Ok(full)
}

/// Scratch directory for uploads that are processed but never archived
pub fn staging_dir(data_dir: &Path) -> std::io::Result<PathBuf> {
    let dir = data_dir.join(STAGING_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Relative paths are stored with forward slashes regardless of platform
pub fn to_stored_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
