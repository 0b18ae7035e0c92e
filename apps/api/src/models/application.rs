use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Enumerations
// ────────────────────────────────────────────────────────────────────────────

/// Lifecycle status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Reviewing,
    Shortlisted,
    InterviewScheduled,
    Interviewed,
    Selected,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 8] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Reviewing,
        ApplicationStatus::Shortlisted,
        ApplicationStatus::InterviewScheduled,
        ApplicationStatus::Interviewed,
        ApplicationStatus::Selected,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Reviewing => "reviewing",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::InterviewScheduled => "interview_scheduled",
            ApplicationStatus::Interviewed => "interviewed",
            ApplicationStatus::Selected => "selected",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    /// Human-readable label used in notes and emails.
    pub fn label(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::Reviewing => "Under Review",
            ApplicationStatus::Shortlisted => "Shortlisted",
            ApplicationStatus::InterviewScheduled => "Interview Scheduled",
            ApplicationStatus::Interviewed => "Interviewed",
            ApplicationStatus::Selected => "Selected",
            ApplicationStatus::Rejected => "Not Selected",
            ApplicationStatus::Withdrawn => "Withdrawn",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid {}", self.value, self.kind)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for ApplicationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "status",
                value: s.to_string(),
            })
    }
}

/// Self-reported experience bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperienceLevel {
    #[serde(rename = "0-1 years")]
    UpToOne,
    #[serde(rename = "1-3 years")]
    OneToThree,
    #[serde(rename = "3-5 years")]
    ThreeToFive,
    #[serde(rename = "5-10 years")]
    FiveToTen,
    #[serde(rename = "10+ years")]
    TenPlus,
}

impl ExperienceLevel {
    pub const ALL: [ExperienceLevel; 5] = [
        ExperienceLevel::UpToOne,
        ExperienceLevel::OneToThree,
        ExperienceLevel::ThreeToFive,
        ExperienceLevel::FiveToTen,
        ExperienceLevel::TenPlus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::UpToOne => "0-1 years",
            ExperienceLevel::OneToThree => "1-3 years",
            ExperienceLevel::ThreeToFive => "3-5 years",
            ExperienceLevel::FiveToTen => "5-10 years",
            ExperienceLevel::TenPlus => "10+ years",
        }
    }
}

impl FromStr for ExperienceLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExperienceLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "experience level",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationChannel {
    Email,
    Phone,
    Meeting,
}

// ────────────────────────────────────────────────────────────────────────────
// Embedded append-only records
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminNote {
    pub text: String,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Communication {
    #[serde(rename = "type")]
    pub channel: CommunicationChannel,
    pub subject: String,
    pub message: String,
    pub sent_by: String,
    pub sent_to: String,
    pub sent_at: DateTime<Utc>,
}

/// Reference to a resume that has already been uploaded to object storage.
/// All four parts travel together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRef {
    pub url: String,
    pub file_name: String,
    pub storage_id: String,
    pub folder: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Application entity
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApplication {
    pub id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub current_position: Option<String>,
    pub experience: ExperienceLevel,
    pub expected_salary: Option<String>,
    pub current_location: String,
    pub willing_to_relocate: bool,
    pub skills: Vec<String>,
    pub portfolio_url: Option<String>,
    pub resume_url: Option<String>,
    pub resume_file_name: Option<String>,
    #[serde(rename = "resumePublicId")]
    pub resume_storage_id: Option<String>,
    pub resume_folder: Option<String>,
    pub status: ApplicationStatus,
    pub admin_notes: Vec<AdminNote>,
    pub communications: Vec<Communication>,
    pub consent_to_process: bool,
    pub applied_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl JobApplication {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn resume(&self) -> Option<ResumeRef> {
        match (
            &self.resume_url,
            &self.resume_file_name,
            &self.resume_storage_id,
            &self.resume_folder,
        ) {
            (Some(url), Some(file_name), Some(storage_id), Some(folder)) => Some(ResumeRef {
                url: url.clone(),
                file_name: file_name.clone(),
                storage_id: storage_id.clone(),
                folder: folder.clone(),
            }),
            _ => None,
        }
    }
}

/// Validated input for a new application, ready to persist.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub job_id: Uuid,
    pub job_title: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub current_position: Option<String>,
    pub experience: ExperienceLevel,
    pub expected_salary: Option<String>,
    pub current_location: String,
    pub willing_to_relocate: bool,
    pub skills: Vec<String>,
    pub portfolio_url: Option<String>,
    pub resume: Option<ResumeRef>,
}

impl NewApplication {
    /// Builds the stored record: status `pending`, both timestamps equal.
    pub fn into_application(self, id: Uuid, now: DateTime<Utc>) -> JobApplication {
        let resume = self.resume;
        JobApplication {
            id,
            job_id: self.job_id,
            job_title: self.job_title,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            current_position: self.current_position,
            experience: self.experience,
            expected_salary: self.expected_salary,
            current_location: self.current_location,
            willing_to_relocate: self.willing_to_relocate,
            skills: self.skills,
            portfolio_url: self.portfolio_url,
            resume_url: resume.as_ref().map(|r| r.url.clone()),
            resume_file_name: resume.as_ref().map(|r| r.file_name.clone()),
            resume_storage_id: resume.as_ref().map(|r| r.storage_id.clone()),
            resume_folder: resume.map(|r| r.folder),
            status: ApplicationStatus::Pending,
            admin_notes: Vec::new(),
            communications: Vec::new(),
            consent_to_process: true,
            applied_at: now,
            last_updated: now,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Database row
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, FromRow)]
pub struct JobApplicationRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub current_position: Option<String>,
    pub experience: String,
    pub expected_salary: Option<String>,
    pub current_location: String,
    pub willing_to_relocate: bool,
    pub skills: Vec<String>,
    pub portfolio_url: Option<String>,
    pub resume_url: Option<String>,
    pub resume_file_name: Option<String>,
    pub resume_storage_id: Option<String>,
    pub resume_folder: Option<String>,
    pub status: String,
    pub admin_notes: Json<Vec<AdminNote>>,
    pub communications: Json<Vec<Communication>>,
    pub consent_to_process: bool,
    pub applied_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl TryFrom<JobApplicationRow> for JobApplication {
    type Error = UnknownVariant;

    fn try_from(row: JobApplicationRow) -> Result<Self, Self::Error> {
        Ok(JobApplication {
            id: row.id,
            job_id: row.job_id,
            job_title: row.job_title,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            current_position: row.current_position,
            experience: row.experience.parse()?,
            expected_salary: row.expected_salary,
            current_location: row.current_location,
            willing_to_relocate: row.willing_to_relocate,
            skills: row.skills,
            portfolio_url: row.portfolio_url,
            resume_url: row.resume_url,
            resume_file_name: row.resume_file_name,
            resume_storage_id: row.resume_storage_id,
            resume_folder: row.resume_folder,
            status: row.status.parse()?,
            admin_notes: row.admin_notes.0,
            communications: row.communications.0,
            consent_to_process: row.consent_to_process,
            applied_at: row.applied_at,
            last_updated: row.last_updated,
        })
    }
}
