//! Field validation for applicant-submitted data.
//!
//! Pure functions with no I/O. The intake client runs them before any network
//! call and the submit handler runs them again over the request body.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::DEFAULT_MAX_RESUME_BYTES;
use crate::errors::FieldErrors;
use crate::models::application::{ExperienceLevel, ResumeRef};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

const MAX_NAME_CHARS: usize = 50;
const MAX_LOCATION_CHARS: usize = 100;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{0,15}$").expect("phone regex is valid"));

/// Where the applicant's resume currently lives.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeAttachment {
    /// A local file that has not been uploaded yet.
    File {
        file_name: String,
        content_type: String,
        size_bytes: usize,
    },
    /// Already in object storage.
    Uploaded(ResumeRef),
    /// Some, but not all, of the stored-resume fields were supplied.
    Incomplete,
}

/// Raw applicant input, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationDraft {
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
    pub resume: Option<ResumeAttachment>,
    pub consent_to_process: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: FieldErrors,
}

impl ValidationReport {
    fn from_errors(errors: FieldErrors) -> Self {
        ValidationReport {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validates a draft against the default 5 MiB resume limit.
pub fn validate(draft: &ApplicationDraft) -> ValidationReport {
    validate_with_limit(draft, DEFAULT_MAX_RESUME_BYTES)
}

pub fn validate_with_limit(draft: &ApplicationDraft, max_resume_bytes: usize) -> ValidationReport {
    let mut errors = FieldErrors::new();

    check_name(&mut errors, "firstName", "First name", &draft.first_name);
    check_name(&mut errors, "lastName", "Last name", &draft.last_name);

    if let Some(message) = email_error(&draft.email) {
        errors.insert("email".to_string(), message.to_string());
    }
    if let Some(message) = phone_error(&draft.phone) {
        errors.insert("phone".to_string(), message.to_string());
    }

    if draft.experience.trim().is_empty() {
        errors.insert(
            "experience".to_string(),
            "Please select your experience level".to_string(),
        );
    } else if draft.experience.trim().parse::<ExperienceLevel>().is_err() {
        errors.insert(
            "experience".to_string(),
            "Please select a valid experience level".to_string(),
        );
    }

    let location = draft.current_location.trim();
    if location.is_empty() {
        errors.insert(
            "currentLocation".to_string(),
            "Current location is required".to_string(),
        );
    } else if location.chars().count() > MAX_LOCATION_CHARS {
        errors.insert(
            "currentLocation".to_string(),
            format!("Current location must be at most {MAX_LOCATION_CHARS} characters"),
        );
    }

    if normalize_skills(&draft.skills).is_empty() {
        errors.insert(
            "skills".to_string(),
            "Please add at least one skill".to_string(),
        );
    }

    if let Some(url) = draft.portfolio_url.as_deref().map(str::trim) {
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.insert(
                "portfolioUrl".to_string(),
                "Portfolio URL must start with http:// or https://".to_string(),
            );
        }
    }

    if let Some(message) = resume_error(draft.resume.as_ref(), max_resume_bytes) {
        errors.insert("resume".to_string(), message);
    }

    if !draft.consent_to_process {
        errors.insert(
            "consentToProcess".to_string(),
            "You must consent to the processing of your data".to_string(),
        );
    }

    ValidationReport::from_errors(errors)
}

fn check_name(errors: &mut FieldErrors, field: &str, label: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        errors.insert(field.to_string(), format!("{label} is required"));
    } else if value.chars().count() > MAX_NAME_CHARS {
        errors.insert(
            field.to_string(),
            format!("{label} must be at most {MAX_NAME_CHARS} characters"),
        );
    }
}

pub fn email_error(email: &str) -> Option<&'static str> {
    let email = email.trim();
    if email.is_empty() {
        Some("Email is required")
    } else if !is_valid_email(email) {
        Some("Please enter a valid email address")
    } else {
        None
    }
}

pub fn phone_error(phone: &str) -> Option<&'static str> {
    if phone.trim().is_empty() {
        Some("Phone number is required")
    } else if !is_valid_phone(phone) {
        Some("Please enter a valid phone number")
    } else {
        None
    }
}

fn resume_error(resume: Option<&ResumeAttachment>, max_resume_bytes: usize) -> Option<String> {
    match resume {
        None => Some("Please upload your resume".to_string()),
        Some(ResumeAttachment::File {
            content_type,
            size_bytes,
            ..
        }) => {
            if content_type != PDF_CONTENT_TYPE {
                Some("Resume must be a PDF file".to_string())
            } else if *size_bytes == 0 {
                Some("Resume file is empty".to_string())
            } else if *size_bytes > max_resume_bytes {
                Some(format!(
                    "Resume must be {} MB or smaller",
                    max_resume_bytes / (1024 * 1024)
                ))
            } else {
                None
            }
        }
        Some(ResumeAttachment::Uploaded(resume)) => {
            let missing_part = [
                &resume.url,
                &resume.file_name,
                &resume.storage_id,
                &resume.folder,
            ]
            .iter()
            .any(|part| part.trim().is_empty());
            missing_part.then(|| "Resume upload is incomplete, please upload again".to_string())
        }
        Some(ResumeAttachment::Incomplete) => {
            Some("Resume upload is incomplete, please upload again".to_string())
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Accepts common separators (spaces, dashes, dots, parentheses) around the digits.
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(&normalize_phone(phone))
}

pub fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect()
}

/// Trims every skill and drops blanks and case-insensitive repeats.
pub fn normalize_skills(skills: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for skill in skills {
        let skill = skill.trim();
        if skill.is_empty() {
            continue;
        }
        let key = skill.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(skill.to_string());
        }
    }
    out
}
