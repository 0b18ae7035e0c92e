//! Public intake: submitting an application and the duplicate pre-flight check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::applications::validation::{
    normalize_phone, normalize_skills, validate_with_limit, ApplicationDraft, ResumeAttachment,
};
use crate::errors::AppError;
use crate::models::application::{
    ApplicationStatus, ExperienceLevel, JobApplication, NewApplication, ResumeRef,
};
use crate::notifications::Notification;
use crate::state::AppState;

/// Body of `POST /api/job-applications`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitApplicationRequest {
    pub job_id: Option<Uuid>,
    pub job_title: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub current_position: Option<String>,
    pub experience: String,
    pub expected_salary: Option<String>,
    pub current_location: String,
    #[serde(deserialize_with = "flexible_bool")]
    pub willing_to_relocate: bool,
    pub skills: Vec<String>,
    pub portfolio_url: Option<String>,
    pub resume_url: Option<String>,
    pub resume_file_name: Option<String>,
    pub resume_public_id: Option<String>,
    pub resume_folder: Option<String>,
    /// Form posts send `"true"`/`"false"`; JSON clients send booleans.
    #[serde(deserialize_with = "flexible_bool")]
    pub consent_to_process: bool,
}

fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<BoolOrString>::deserialize(deserializer)? {
        Some(BoolOrString::Bool(b)) => b,
        Some(BoolOrString::Text(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "on" | "yes" | "1"
        ),
        None => false,
    })
}

impl SubmitApplicationRequest {
    fn resume_attachment(&self) -> Option<ResumeAttachment> {
        let parts = [
            &self.resume_url,
            &self.resume_file_name,
            &self.resume_public_id,
            &self.resume_folder,
        ];
        let present = parts
            .iter()
            .filter(|p| p.as_deref().is_some_and(|v| !v.trim().is_empty()))
            .count();

        match (
            present,
            &self.resume_url,
            &self.resume_file_name,
            &self.resume_public_id,
            &self.resume_folder,
        ) {
            (0, ..) => None,
            (4, Some(url), Some(file_name), Some(storage_id), Some(folder)) => {
                Some(ResumeAttachment::Uploaded(ResumeRef {
                    url: url.trim().to_string(),
                    file_name: file_name.trim().to_string(),
                    storage_id: storage_id.trim().to_string(),
                    folder: folder.trim().to_string(),
                }))
            }
            _ => Some(ResumeAttachment::Incomplete),
        }
    }

    pub fn to_draft(&self) -> ApplicationDraft {
        ApplicationDraft {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            current_position: self.current_position.clone(),
            experience: self.experience.clone(),
            expected_salary: self.expected_salary.clone(),
            current_location: self.current_location.clone(),
            willing_to_relocate: self.willing_to_relocate,
            skills: self.skills.clone(),
            portfolio_url: self.portfolio_url.clone(),
            resume: self.resume_attachment(),
            consent_to_process: self.consent_to_process,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Builds the record to persist from a draft that already passed validation.
fn into_new_application(
    draft: ApplicationDraft,
    job_id: Uuid,
    job_title: String,
) -> Result<NewApplication, AppError> {
    let experience: ExperienceLevel = draft
        .experience
        .trim()
        .parse()
        .map_err(|_| AppError::invalid("experience", "Please select a valid experience level"))?;
    let resume = match draft.resume {
        Some(ResumeAttachment::Uploaded(resume)) => Some(resume),
        _ => None,
    };

    Ok(NewApplication {
        job_id,
        job_title,
        first_name: draft.first_name.trim().to_string(),
        last_name: draft.last_name.trim().to_string(),
        email: normalize_email(&draft.email),
        phone: normalize_phone(draft.phone.trim()),
        current_position: non_blank(&draft.current_position),
        experience,
        expected_salary: non_blank(&draft.expected_salary),
        current_location: draft.current_location.trim().to_string(),
        willing_to_relocate: draft.willing_to_relocate,
        skills: normalize_skills(&draft.skills),
        portfolio_url: non_blank(&draft.portfolio_url),
        resume,
    })
}

/// Validates, checks the job and duplicates, persists, then notifies in the background.
pub async fn submit(
    state: &AppState,
    request: SubmitApplicationRequest,
) -> Result<JobApplication, AppError> {
    submit_at(state, request, Utc::now()).await
}

pub async fn submit_at(
    state: &AppState,
    request: SubmitApplicationRequest,
    now: DateTime<Utc>,
) -> Result<JobApplication, AppError> {
    let Some(job_id) = request.job_id else {
        return Err(AppError::invalid("jobId", "Job reference is required"));
    };

    let draft = request.to_draft();
    let report = validate_with_limit(&draft, state.config.max_resume_bytes);
    if !report.is_valid {
        return Err(AppError::Validation(report.errors));
    }

    let job = state
        .store
        .find_job(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;

    let email = normalize_email(&draft.email);
    if state
        .store
        .find_by_email_and_job(&email, job_id)
        .await?
        .is_some()
    {
        return Err(AppError::duplicate_application());
    }

    let job_title = non_blank(&request.job_title).unwrap_or_else(|| job.title.clone());
    let application = into_new_application(draft, job_id, job_title)?
        .into_application(Uuid::new_v4(), now);

    // A racing submit that slipped past the pre-check surfaces here as Duplicate
    state.store.insert(&application).await?;
    info!(
        "Application {} received for job {} ({})",
        application.id, job_id, job.title
    );

    state.notifier.dispatch(
        Notification::ApplicantConfirmation {
            application: application.clone(),
        },
        application.email.clone(),
    );
    match state.notifier.hr_mailbox() {
        Some(hr) => {
            state.notifier.dispatch(
                Notification::HrNewApplication {
                    application: application.clone(),
                },
                hr.to_string(),
            );
        }
        None => warn!(
            "No HR mailbox configured; skipping new-application alert for {}",
            application.id
        ),
    }

    Ok(application)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingApplication {
    pub id: Uuid,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub job_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCheck {
    pub has_applied: bool,
    pub application: Option<ExistingApplication>,
}

/// Read-only: has this email already applied to this job?
pub async fn check_duplicate(
    state: &AppState,
    email: &str,
    job_id: Uuid,
) -> Result<DuplicateCheck, AppError> {
    let existing = state
        .store
        .find_by_email_and_job(&normalize_email(email), job_id)
        .await?;

    Ok(DuplicateCheck {
        has_applied: existing.is_some(),
        application: existing.map(|app| ExistingApplication {
            id: app.id,
            status: app.status,
            applied_at: app.applied_at,
            job_title: app.job_title,
        }),
    })
}
