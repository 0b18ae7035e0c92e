//! Resume storage: PDF uploads into per-applicant folders in object storage.
//!
//! The [`ResumeStorage`] trait is the seam. [`s3::S3ResumeStorage`] talks to any
//! S3-compatible bucket and [`DisabledStorage`] stands in when no bucket is
//! configured.

pub mod handlers;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub use s3::S3ResumeStorage;

const PDF_MAGIC: &[u8] = b"%PDF-";
const FALLBACK_FOLDER_NAME: &str = "applicant";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("resume file is empty")]
    Empty,

    #[error("resume must be a PDF document")]
    NotPdf,

    #[error("resume is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("object storage is not configured")]
    NotConfigured,

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A resume on its way to storage.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub bytes: Bytes,
    pub file_name: String,
    pub applicant_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResume {
    pub url: String,
    /// Object key; what the rest of the system calls the storage id.
    #[serde(rename = "publicId")]
    pub storage_id: String,
    pub file_name: String,
    pub folder: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderDeletion {
    pub deleted_count: usize,
    pub total_files: usize,
    pub failed_deletions: Vec<String>,
}

#[async_trait]
pub trait ResumeStorage: Send + Sync {
    /// Stores a PDF under the applicant's folder. Never overwrites an existing object.
    async fn upload(&self, upload: ResumeUpload) -> Result<StoredResume, StorageError>;

    async fn delete_one(&self, storage_id: &str) -> Result<(), StorageError>;

    /// Deletes every object under `folder`. One failed object does not stop the rest.
    async fn delete_folder(&self, folder: &str) -> Result<FolderDeletion, StorageError>;
}

/// Used when no bucket is configured: uploads fail, deletions find nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledStorage;

#[async_trait]
impl ResumeStorage for DisabledStorage {
    async fn upload(&self, _upload: ResumeUpload) -> Result<StoredResume, StorageError> {
        Err(StorageError::NotConfigured)
    }

    async fn delete_one(&self, _storage_id: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn delete_folder(&self, _folder: &str) -> Result<FolderDeletion, StorageError> {
        Ok(FolderDeletion::default())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Naming and content checks shared by all backends
// ────────────────────────────────────────────────────────────────────────────

/// Rejects empty, oversize and non-PDF input before any network call.
pub fn check_pdf(bytes: &[u8], file_name: &str, limit: usize) -> Result<(), StorageError> {
    if bytes.is_empty() {
        return Err(StorageError::Empty);
    }
    if bytes.len() > limit {
        return Err(StorageError::TooLarge {
            size: bytes.len(),
            limit,
        });
    }
    let has_pdf_extension = file_name.to_ascii_lowercase().ends_with(".pdf");
    if !has_pdf_extension || !bytes.starts_with(PDF_MAGIC) {
        return Err(StorageError::NotPdf);
    }
    Ok(())
}

/// Strips everything but letters, digits and whitespace, then joins words with `_`.
pub fn sanitize_folder_name(applicant_name: &str) -> String {
    let kept: String = applicant_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    let joined = kept.split_whitespace().collect::<Vec<_>>().join("_");
    if joined.is_empty() {
        FALLBACK_FOLDER_NAME.to_string()
    } else {
        joined
    }
}

pub fn applicant_folder(root: &str, applicant_name: &str) -> String {
    format!(
        "{}/{}",
        root.trim_matches('/'),
        sanitize_folder_name(applicant_name)
    )
}

/// `{stem}_{unix millis}_{8 hex}.pdf`, so repeated uploads never collide.
pub fn unique_object_name(file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let stem = stem.trim_matches('_');
    let stem = if stem.is_empty() { "resume" } else { stem };
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{stem}_{}_{}.pdf",
        Utc::now().timestamp_millis(),
        &suffix[..8]
    )
}
