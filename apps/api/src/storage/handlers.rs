use axum::{extract::State, Json};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::state::AppState;
use crate::storage::{check_pdf, ResumeUpload, StorageError, StoredResume};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResumeRequest {
    /// Base64 payload, optionally as a `data:` URL.
    pub file: String,
    pub file_name: String,
    pub applicant_name: String,
}

/// POST /api/upload-resume
///
/// Public. Stores the PDF and returns the reference the applicant then submits
/// with the application.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    Json(req): Json<UploadResumeRequest>,
) -> Result<Json<StoredResume>, AppError> {
    if req.file_name.trim().is_empty() {
        return Err(AppError::invalid("fileName", "File name is required"));
    }
    if req.applicant_name.trim().is_empty() {
        return Err(AppError::invalid("applicantName", "Applicant name is required"));
    }

    let bytes = decode_payload(&req.file)?;
    check_pdf(&bytes, &req.file_name, state.config.max_resume_bytes).map_err(upload_error)?;

    let stored = state
        .storage
        .upload(ResumeUpload {
            bytes,
            file_name: req.file_name.trim().to_string(),
            applicant_name: req.applicant_name,
        })
        .await
        .map_err(upload_error)?;

    info!("Resume stored in folder {}", stored.folder);
    Ok(Json(stored))
}

fn decode_payload(file: &str) -> Result<Bytes, AppError> {
    let encoded = match file.strip_prefix("data:") {
        Some(data_url) => data_url
            .split_once(',')
            .map(|(_, payload)| payload)
            .ok_or_else(|| AppError::invalid("file", "Malformed data URL"))?,
        None => file,
    };
    let encoded: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(encoded)
        .map(Bytes::from)
        .map_err(|_| AppError::invalid("file", "File must be base64 encoded"))
}

/// Content problems are the caller's to fix; backend failures are retryable.
fn upload_error(err: StorageError) -> AppError {
    match err {
        StorageError::Empty => AppError::invalid("resume", "Resume file is empty"),
        StorageError::NotPdf => AppError::invalid("resume", "Resume must be a PDF file"),
        StorageError::TooLarge { limit, .. } => AppError::PayloadTooLarge(format!(
            "Resume must be {} MB or smaller",
            limit / (1024 * 1024)
        )),
        other => AppError::Storage(other),
    }
}
