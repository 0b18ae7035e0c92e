use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A job posting. Only the fields the application workflow reads are modelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobPosting {
    pub id: Uuid,
    pub title: String,
    pub department: String,
    pub location: String,
    pub job_type: String,
    pub skills: Vec<String>,
    /// `active`, `paused` or `closed`.
    pub status: String,
    pub application_count: i32,
    pub created_at: DateTime<Utc>,
}

impl JobPosting {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}
