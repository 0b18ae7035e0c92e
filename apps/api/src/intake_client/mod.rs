//! HTTP client for the public application flow.
//!
//! Drives the same sequence as the careers site: validate locally, ask whether
//! this email already applied, upload the resume, then submit the application
//! that references it. Each step starts only after the previous one succeeded.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::applications::intake::SubmitApplicationRequest;
use crate::applications::validation::{
    validate_with_limit, ApplicationDraft, ResumeAttachment, PDF_CONTENT_TYPE,
};
use crate::config::DEFAULT_MAX_RESUME_BYTES;
use crate::errors::FieldErrors;
use crate::models::application::ApplicationStatus;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_RETRIES: u32 = 2;
const BASE_BACKOFF_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("application is invalid: {} field(s) need attention", .0.len())]
    Invalid(FieldErrors),

    #[error("this email has already applied for the position")]
    AlreadyApplied,

    #[error("server rejected the request (status {status}, {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// What the applicant fills in, minus the resume.
#[derive(Debug, Clone)]
pub struct ApplicationForm {
    pub job_id: Uuid,
    pub job_title: Option<String>,
    /// Its `resume` field is ignored; the file passed to [`IntakeClient::apply`] wins.
    pub draft: ApplicationDraft,
}

#[derive(Debug, Clone)]
pub struct ResumeFile {
    pub file_name: String,
    pub bytes: Bytes,
}

impl ResumeFile {
    fn content_type(&self) -> &'static str {
        if self.bytes.starts_with(b"%PDF-") {
            PDF_CONTENT_TYPE
        } else {
            "application/octet-stream"
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedApplication {
    pub id: Uuid,
    pub status: ApplicationStatus,
    pub email: String,
    pub job_title: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DuplicateCheckBody {
    has_applied: bool,
    #[serde(default)]
    application: Option<ExistingApplicationBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExistingApplicationBody {
    id: Uuid,
    status: ApplicationStatus,
    job_title: String,
    applied_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedResume {
    url: String,
    public_id: String,
    file_name: String,
    folder: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
    #[serde(default)]
    errors: FieldErrors,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct IntakeClient {
    client: Client,
    base_url: String,
    max_resume_bytes: usize,
}

impl IntakeClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, IntakeError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_resume_bytes: DEFAULT_MAX_RESUME_BYTES,
        })
    }

    pub fn with_max_resume_bytes(mut self, max_resume_bytes: usize) -> Self {
        self.max_resume_bytes = max_resume_bytes;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Runs the whole flow. Nothing is uploaded unless validation and the
    /// duplicate check pass, and nothing is submitted unless the upload did.
    pub async fn apply(
        &self,
        form: &ApplicationForm,
        resume: ResumeFile,
    ) -> Result<SubmittedApplication, IntakeError> {
        let mut draft = form.draft.clone();
        draft.resume = Some(ResumeAttachment::File {
            file_name: resume.file_name.clone(),
            content_type: resume.content_type().to_string(),
            size_bytes: resume.bytes.len(),
        });
        let report = validate_with_limit(&draft, self.max_resume_bytes);
        if !report.is_valid {
            return Err(IntakeError::Invalid(report.errors));
        }

        if self.has_applied(&draft.email, form.job_id).await? {
            return Err(IntakeError::AlreadyApplied);
        }

        let applicant_name = format!("{} {}", draft.first_name.trim(), draft.last_name.trim());
        let uploaded = self.upload_resume(&resume, &applicant_name).await?;
        info!("Resume uploaded to {}", uploaded.folder);

        let request = SubmitApplicationRequest {
            job_id: Some(form.job_id),
            job_title: form.job_title.clone(),
            first_name: draft.first_name,
            last_name: draft.last_name,
            email: draft.email,
            phone: draft.phone,
            current_position: draft.current_position,
            experience: draft.experience,
            expected_salary: draft.expected_salary,
            current_location: draft.current_location,
            willing_to_relocate: draft.willing_to_relocate,
            skills: draft.skills,
            portfolio_url: draft.portfolio_url,
            resume_url: Some(uploaded.url),
            resume_file_name: Some(uploaded.file_name),
            resume_public_id: Some(uploaded.public_id),
            resume_folder: Some(uploaded.folder),
            consent_to_process: draft.consent_to_process,
        };

        let submitted = self.submit(&request, form.job_id).await?;
        info!("Application {} submitted", submitted.id);
        Ok(submitted)
    }

    pub async fn has_applied(&self, email: &str, job_id: Uuid) -> Result<bool, IntakeError> {
        Ok(self.duplicate_check(email, job_id).await?.has_applied)
    }

    async fn duplicate_check(
        &self,
        email: &str,
        job_id: Uuid,
    ) -> Result<DuplicateCheckBody, IntakeError> {
        self.send_json(|| {
            self.client
                .get(self.url("/api/job-applications/check-duplicate"))
                .query(&[("email", email.to_string()), ("jobId", job_id.to_string())])
        })
        .await
    }

    /// A duplicate answer to a retried submit means an earlier attempt was
    /// stored before its response got lost, so the stored record is returned.
    async fn submit(
        &self,
        request: &SubmitApplicationRequest,
        job_id: Uuid,
    ) -> Result<SubmittedApplication, IntakeError> {
        let (response, retried) = self
            .send_with_retry(|| self.client.post(self.url("/api/job-applications")).json(request))
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        match rejection(status, response).await {
            IntakeError::AlreadyApplied if retried => {
                let check = self.duplicate_check(&request.email, job_id).await?;
                let existing = check.application.ok_or(IntakeError::AlreadyApplied)?;
                info!("Submit was retried; application {} was already stored", existing.id);
                Ok(SubmittedApplication {
                    id: existing.id,
                    status: existing.status,
                    email: request.email.clone(),
                    job_title: existing.job_title,
                    applied_at: existing.applied_at,
                })
            }
            err => Err(err),
        }
    }

    async fn upload_resume(
        &self,
        resume: &ResumeFile,
        applicant_name: &str,
    ) -> Result<UploadedResume, IntakeError> {
        let body = serde_json::json!({
            "file": STANDARD.encode(&resume.bytes),
            "fileName": resume.file_name,
            "applicantName": applicant_name,
        });
        self.send_json(|| self.client.post(self.url("/api/upload-resume")).json(&body))
            .await
    }

    /// Sends with retries and decodes a success body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<T, IntakeError> {
        let (response, _) = self.send_with_retry(build).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        Err(rejection(status, response).await)
    }

    /// Retries timeouts, connection failures and 5xx responses with
    /// exponential backoff: 500ms, then 1s. The flag reports whether any
    /// retry happened.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<(Response, bool), IntakeError> {
        let mut attempt = 0;
        loop {
            match build().send().await {
                Ok(response) if response.status().is_server_error() && attempt < MAX_RETRIES => {
                    warn!("Server returned {}", response.status());
                }
                Ok(response) => return Ok((response, attempt > 0)),
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < MAX_RETRIES => {
                    warn!("Request failed: {e}");
                }
                Err(e) => return Err(IntakeError::Http(e)),
            }

            let delay = Duration::from_millis(BASE_BACKOFF_MS << attempt);
            attempt += 1;
            debug!("Retry {attempt}/{MAX_RETRIES} in {}ms", delay.as_millis());
            tokio::time::sleep(delay).await;
        }
    }
}

async fn rejection(status: StatusCode, response: Response) -> IntakeError {
    let body = response.text().await.unwrap_or_default();
    let envelope: ErrorEnvelope = serde_json::from_str(&body).unwrap_or_default();

    if envelope.error.code == "DUPLICATE_APPLICATION" {
        return IntakeError::AlreadyApplied;
    }
    if status == StatusCode::BAD_REQUEST && !envelope.errors.is_empty() {
        return IntakeError::Invalid(envelope.errors);
    }

    IntakeError::Rejected {
        status: status.as_u16(),
        code: envelope.error.code,
        message: if envelope.error.message.is_empty() {
            body
        } else {
            envelope.error.message
        },
    }
}
