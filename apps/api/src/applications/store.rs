//! Persistence port for applications and the job postings they reference.
//!
//! `AppState` carries an `Arc<dyn ApplicationStore>`; production uses
//! [`PgApplicationStore`](crate::applications::pg_store::PgApplicationStore).

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::application::{AdminNote, ApplicationStatus, Communication, JobApplication};
use crate::models::job::JobPosting;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("an application for this email and job already exists")]
    Duplicate,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored record is invalid: {0}")]
    Corrupt(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Listing
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
    pub job_id: Option<Uuid>,
    /// Case-insensitive substring over first name, last name, email and job title.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    AppliedAt,
    LastUpdated,
    FirstName,
    LastName,
    Email,
    Status,
    JobTitle,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::AppliedAt => "applied_at",
            SortField::LastUpdated => "last_updated",
            SortField::FirstName => "first_name",
            SortField::LastName => "last_name",
            SortField::Email => "email",
            SortField::Status => "status",
            SortField::JobTitle => "job_title",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "appliedAt" | "createdAt" => Ok(SortField::AppliedAt),
            "lastUpdated" | "updatedAt" => Ok(SortField::LastUpdated),
            "firstName" => Ok(SortField::FirstName),
            "lastName" => Ok(SortField::LastName),
            "email" => Ok(SortField::Email),
            "status" => Ok(SortField::Status),
            "jobTitle" => Ok(SortField::JobTitle),
            other => Err(format!("cannot sort by '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "1" => Ok(SortOrder::Asc),
            "desc" | "-1" => Ok(SortOrder::Desc),
            other => Err(format!("sort order must be 'asc' or 'desc', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: ApplicationFilter,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    /// 1-indexed.
    pub page: u32,
    pub limit: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        ListQuery {
            filter: ApplicationFilter::default(),
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationPage {
    pub items: Vec<JobApplication>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u64,
    pub total_items: u64,
    pub items_per_page: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total_items: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total_items.div_ceil(u64::from(limit))
        };
        Pagination {
            current_page: page,
            total_pages,
            total_items,
            items_per_page: limit,
            has_next_page: u64::from(page) < total_pages,
            has_prev_page: page > 1,
        }
    }
}

/// Per-status totals across the whole collection, independent of any filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCounts {
    #[serde(flatten)]
    pub by_status: BTreeMap<ApplicationStatus, u64>,
    pub total: u64,
}

impl StatusCounts {
    /// Every status gets an entry, zero when absent from `pairs`.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (ApplicationStatus, u64)>) -> Self {
        let mut by_status: BTreeMap<ApplicationStatus, u64> =
            ApplicationStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        for (status, count) in pairs {
            *by_status.entry(status).or_default() += count;
        }
        let total = by_status.values().sum();
        StatusCounts { by_status, total }
    }

    pub fn get(&self, status: ApplicationStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Port
// ────────────────────────────────────────────────────────────────────────────

/// Persistence operations over applications and job postings.
///
/// Every mutation touches one application record and refreshes its
/// `last_updated`. `insert` and `delete` also adjust the posting's
/// application counter.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn find_job(&self, job_id: Uuid) -> Result<Option<JobPosting>, StoreError>;

    async fn list_jobs(&self, active_only: bool) -> Result<Vec<JobPosting>, StoreError>;

    /// Email comparison is case-insensitive.
    async fn find_by_email_and_job(
        &self,
        email: &str,
        job_id: Uuid,
    ) -> Result<Option<JobApplication>, StoreError>;

    /// Persists a new application and bumps the job's counter.
    /// Returns [`StoreError::Duplicate`] when (email, job) is taken.
    async fn insert(&self, application: &JobApplication) -> Result<(), StoreError>;

    async fn list(&self, query: &ListQuery) -> Result<ApplicationPage, StoreError>;

    async fn status_counts(&self) -> Result<StatusCounts, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<JobApplication>, StoreError>;

    /// Number of applications other than `exclude` whose resume lives in `folder`.
    async fn count_sharing_resume_folder(
        &self,
        folder: &str,
        exclude: Uuid,
    ) -> Result<u64, StoreError>;

    /// Sets the status and appends `note` when given. `None` when the id is unknown.
    async fn update_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        note: Option<&AdminNote>,
        now: DateTime<Utc>,
    ) -> Result<Option<JobApplication>, StoreError>;

    async fn append_note(
        &self,
        id: Uuid,
        note: &AdminNote,
        now: DateTime<Utc>,
    ) -> Result<Option<JobApplication>, StoreError>;

    async fn append_communication(
        &self,
        id: Uuid,
        communication: &Communication,
        now: DateTime<Utc>,
    ) -> Result<Option<JobApplication>, StoreError>;

    /// Removes the record and decrements the job's counter (never below zero).
    /// Returns the removed record.
    async fn delete(&self, id: Uuid) -> Result<Option<JobApplication>, StoreError>;
}
