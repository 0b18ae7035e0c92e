//! In-memory adapters and builders for tests that run without Postgres, S3 or SMTP.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::applications::intake::SubmitApplicationRequest;
use crate::applications::store::{
    ApplicationFilter, ApplicationPage, ApplicationStore, ListQuery, SortField, SortOrder,
    StatusCounts, StoreError,
};
use crate::config::Config;
use crate::models::application::{
    AdminNote, ApplicationStatus, Communication, ExperienceLevel, JobApplication, NewApplication,
    ResumeRef,
};
use crate::models::job::JobPosting;
use crate::notifications::{EmailError, Mailer, NotificationSettings, Notifier, OutgoingEmail};
use crate::state::AppState;
use crate::storage::{
    applicant_folder, sanitize_folder_name, unique_object_name, FolderDeletion, ResumeStorage,
    ResumeUpload, StorageError, StoredResume,
};

pub const TEST_HR_MAILBOX: &str = "hr@example.com";
const RESUME_ROOT: &str = "career-applications";
const FILES_BASE_URL: &str = "https://files.example.com";

// ────────────────────────────────────────────────────────────────────────────
// Store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct StoreData {
    jobs: Vec<JobPosting>,
    applications: Vec<JobApplication>,
}

#[derive(Default)]
pub struct MemoryApplicationStore {
    data: Mutex<StoreData>,
}

impl MemoryApplicationStore {
    pub fn seed_job(&self, title: &str) -> JobPosting {
        let job = JobPosting {
            id: Uuid::new_v4(),
            title: title.to_string(),
            department: "Engineering".to_string(),
            location: "Remote".to_string(),
            job_type: "full-time".to_string(),
            skills: vec!["React".to_string()],
            status: "active".to_string(),
            application_count: 0,
            created_at: Utc::now(),
        };
        self.data.lock().unwrap().jobs.push(job.clone());
        job
    }

    pub fn set_job_status(&self, job_id: Uuid, status: &str) {
        let mut data = self.data.lock().unwrap();
        if let Some(job) = data.jobs.iter_mut().find(|j| j.id == job_id) {
            job.status = status.to_string();
        }
    }

    pub fn job_application_count(&self, job_id: Uuid) -> i32 {
        self.data
            .lock()
            .unwrap()
            .jobs
            .iter()
            .find(|j| j.id == job_id)
            .map(|j| j.application_count)
            .unwrap_or(0)
    }

    pub fn application_total(&self) -> usize {
        self.data.lock().unwrap().applications.len()
    }

    fn modify(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        change: impl FnOnce(&mut JobApplication),
    ) -> Option<JobApplication> {
        let mut data = self.data.lock().unwrap();
        let app = data.applications.iter_mut().find(|a| a.id == id)?;
        change(app);
        app.last_updated = now;
        Some(app.clone())
    }
}

fn matches_filter(app: &JobApplication, filter: &ApplicationFilter) -> bool {
    if filter.status.is_some_and(|s| s != app.status) {
        return false;
    }
    if filter.job_id.is_some_and(|id| id != app.job_id) {
        return false;
    }
    match filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(needle) => {
            let needle = needle.to_lowercase();
            [&app.first_name, &app.last_name, &app.email, &app.job_title]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        }
        None => true,
    }
}

fn compare(a: &JobApplication, b: &JobApplication, field: SortField) -> Ordering {
    match field {
        SortField::AppliedAt => a.applied_at.cmp(&b.applied_at),
        SortField::LastUpdated => a.last_updated.cmp(&b.last_updated),
        SortField::FirstName => a.first_name.cmp(&b.first_name),
        SortField::LastName => a.last_name.cmp(&b.last_name),
        SortField::Email => a.email.cmp(&b.email),
        SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        SortField::JobTitle => a.job_title.cmp(&b.job_title),
    }
}

#[async_trait]
impl ApplicationStore for MemoryApplicationStore {
    async fn find_job(&self, job_id: Uuid) -> Result<Option<JobPosting>, StoreError> {
        let data = self.data.lock().unwrap();
        Ok(data.jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn list_jobs(&self, active_only: bool) -> Result<Vec<JobPosting>, StoreError> {
        let data = self.data.lock().unwrap();
        let mut jobs: Vec<JobPosting> = data
            .jobs
            .iter()
            .filter(|j| !active_only || j.is_active())
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn find_by_email_and_job(
        &self,
        email: &str,
        job_id: Uuid,
    ) -> Result<Option<JobApplication>, StoreError> {
        let data = self.data.lock().unwrap();
        Ok(data
            .applications
            .iter()
            .find(|a| a.job_id == job_id && a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert(&self, application: &JobApplication) -> Result<(), StoreError> {
        let mut data = self.data.lock().unwrap();
        let taken = data.applications.iter().any(|a| {
            a.job_id == application.job_id && a.email.eq_ignore_ascii_case(&application.email)
        });
        if taken {
            return Err(StoreError::Duplicate);
        }
        if let Some(job) = data.jobs.iter_mut().find(|j| j.id == application.job_id) {
            job.application_count += 1;
        }
        data.applications.push(application.clone());
        Ok(())
    }

    async fn list(&self, query: &ListQuery) -> Result<ApplicationPage, StoreError> {
        let data = self.data.lock().unwrap();
        let mut matching: Vec<JobApplication> = data
            .applications
            .iter()
            .filter(|a| matches_filter(a, &query.filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            let ordering = compare(a, b, query.sort_by);
            match query.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .collect();
        Ok(ApplicationPage { items, total })
    }

    async fn status_counts(&self) -> Result<StatusCounts, StoreError> {
        let data = self.data.lock().unwrap();
        Ok(StatusCounts::from_pairs(
            data.applications.iter().map(|a| (a.status, 1)),
        ))
    }

    async fn get(&self, id: Uuid) -> Result<Option<JobApplication>, StoreError> {
        let data = self.data.lock().unwrap();
        Ok(data.applications.iter().find(|a| a.id == id).cloned())
    }

    async fn count_sharing_resume_folder(
        &self,
        folder: &str,
        exclude: Uuid,
    ) -> Result<u64, StoreError> {
        let data = self.data.lock().unwrap();
        let count = data
            .applications
            .iter()
            .filter(|a| a.id != exclude && a.resume_folder.as_deref() == Some(folder))
            .count();
        Ok(count as u64)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        note: Option<&AdminNote>,
        now: DateTime<Utc>,
    ) -> Result<Option<JobApplication>, StoreError> {
        Ok(self.modify(id, now, |app| {
            app.status = status;
            if let Some(note) = note {
                app.admin_notes.push(note.clone());
            }
        }))
    }

    async fn append_note(
        &self,
        id: Uuid,
        note: &AdminNote,
        now: DateTime<Utc>,
    ) -> Result<Option<JobApplication>, StoreError> {
        Ok(self.modify(id, now, |app| app.admin_notes.push(note.clone())))
    }

    async fn append_communication(
        &self,
        id: Uuid,
        communication: &Communication,
        now: DateTime<Utc>,
    ) -> Result<Option<JobApplication>, StoreError> {
        Ok(self.modify(id, now, |app| {
            app.communications.push(communication.clone())
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<JobApplication>, StoreError> {
        let mut data = self.data.lock().unwrap();
        let Some(index) = data.applications.iter().position(|a| a.id == id) else {
            return Ok(None);
        };
        let removed = data.applications.remove(index);
        if let Some(job) = data.jobs.iter_mut().find(|j| j.id == removed.job_id) {
            job.application_count = (job.application_count - 1).max(0);
        }
        Ok(Some(removed))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Resume storage
// ────────────────────────────────────────────────────────────────────────────

/// Object map keyed like the S3 adapter. `set_failing` makes every call fail
/// with a backend error; `set_listing_failing` only breaks folder listings.
#[derive(Default)]
pub struct MemoryResumeStorage {
    objects: Mutex<BTreeMap<String, Bytes>>,
    failing: AtomicBool,
    listing_failing: AtomicBool,
}

impl MemoryResumeStorage {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, AtomicOrdering::SeqCst);
    }

    pub fn set_listing_failing(&self, failing: bool) {
        self.listing_failing.store(failing, AtomicOrdering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn seed(&self, folder: &str, names: &[&str]) {
        let mut objects = self.objects.lock().unwrap();
        for name in names {
            objects.insert(format!("{folder}/{name}"), Bytes::from_static(b"%PDF-1.4"));
        }
    }

    pub fn keys_under(&self, folder: &str) -> Vec<String> {
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(AtomicOrdering::SeqCst) {
            Err(StorageError::Backend("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ResumeStorage for MemoryResumeStorage {
    async fn upload(&self, upload: ResumeUpload) -> Result<StoredResume, StorageError> {
        self.check()?;
        let folder = applicant_folder(RESUME_ROOT, &upload.applicant_name);
        let key = format!("{folder}/{}", unique_object_name(&upload.file_name));
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(StorageError::AlreadyExists(key));
        }
        objects.insert(key.clone(), upload.bytes);
        Ok(StoredResume {
            url: format!("{FILES_BASE_URL}/{key}"),
            storage_id: key,
            file_name: upload.file_name,
            folder,
        })
    }

    async fn delete_one(&self, storage_id: &str) -> Result<(), StorageError> {
        self.check()?;
        self.objects.lock().unwrap().remove(storage_id);
        Ok(())
    }

    async fn delete_folder(&self, folder: &str) -> Result<FolderDeletion, StorageError> {
        self.check()?;
        if self.listing_failing.load(AtomicOrdering::SeqCst) {
            return Err(StorageError::Backend("listing failed".to_string()));
        }
        let keys = self.keys_under(folder);
        let mut summary = FolderDeletion {
            total_files: keys.len(),
            ..Default::default()
        };
        for key in keys {
            match self.delete_one(&key).await {
                Ok(()) => summary.deleted_count += 1,
                Err(_) => summary.failed_deletions.push(key),
            }
        }
        Ok(summary)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Mailer
// ────────────────────────────────────────────────────────────────────────────

/// Records every delivered message. Failing mode rejects with a transport error.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        let mailer = Self::default();
        mailer.set_failing(true);
        mailer
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, AtomicOrdering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Waits for background dispatches to deliver at least `count` messages.
    pub async fn wait_for(&self, count: usize) -> Vec<OutgoingEmail> {
        for _ in 0..200 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} emails, got {}", self.sent().len());
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<String, EmailError> {
        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(EmailError::Transport("injected failure".to_string()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(format!("<{}@test.local>", Uuid::new_v4()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builders
// ────────────────────────────────────────────────────────────────────────────

pub struct TestHarness {
    pub state: AppState,
    pub store: Arc<MemoryApplicationStore>,
    pub storage: Arc<MemoryResumeStorage>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_state() -> TestHarness {
    let store = Arc::new(MemoryApplicationStore::default());
    let storage = Arc::new(MemoryResumeStorage::default());
    let mailer = Arc::new(RecordingMailer::default());
    let config = Config::for_tests();
    let notifier = Notifier::new(
        mailer.clone(),
        NotificationSettings {
            company_name: config.company_name.clone(),
            frontend_url: config.frontend_url.clone(),
            hr_mailbox: Some(TEST_HR_MAILBOX.to_string()),
        },
    );

    TestHarness {
        state: AppState {
            store: store.clone(),
            storage: storage.clone(),
            notifier,
            config,
        },
        store,
        storage,
        mailer,
    }
}

/// A valid submission whose resume already sits in a per-email folder.
pub fn submit_request(job_id: Uuid, email: &str) -> SubmitApplicationRequest {
    let local_part = email.trim().split('@').next().unwrap_or_default();
    let folder = format!(
        "{RESUME_ROOT}/{}",
        sanitize_folder_name(&format!("Asha Rao {local_part}"))
    );
    let storage_id = format!("{folder}/cv_1700000000000_0a1b2c3d.pdf");

    SubmitApplicationRequest {
        job_id: Some(job_id),
        job_title: None,
        first_name: "Asha".to_string(),
        last_name: "Rao".to_string(),
        email: email.to_string(),
        phone: "+911234567890".to_string(),
        current_position: Some("Frontend Developer".to_string()),
        experience: "3-5 years".to_string(),
        expected_salary: None,
        current_location: "Bengaluru".to_string(),
        willing_to_relocate: true,
        skills: vec!["React".to_string(), "TypeScript".to_string()],
        portfolio_url: Some("https://github.com/asha".to_string()),
        resume_url: Some(format!("{FILES_BASE_URL}/{storage_id}")),
        resume_file_name: Some("cv.pdf".to_string()),
        resume_public_id: Some(storage_id),
        resume_folder: Some(folder),
        consent_to_process: true,
    }
}

pub fn sample_application() -> JobApplication {
    let folder = format!("{RESUME_ROOT}/Asha_Rao");
    NewApplication {
        job_id: Uuid::new_v4(),
        job_title: "Frontend Engineer".to_string(),
        first_name: "Asha".to_string(),
        last_name: "Rao".to_string(),
        email: "asha.rao@example.com".to_string(),
        phone: "+911234567890".to_string(),
        current_position: Some("Frontend Developer".to_string()),
        experience: ExperienceLevel::ThreeToFive,
        expected_salary: Some("18 LPA".to_string()),
        current_location: "Bengaluru".to_string(),
        willing_to_relocate: true,
        skills: vec!["React".to_string(), "TypeScript".to_string()],
        portfolio_url: Some("https://github.com/asha".to_string()),
        resume: Some(ResumeRef {
            url: format!("{FILES_BASE_URL}/{folder}/cv.pdf"),
            file_name: "cv.pdf".to_string(),
            storage_id: format!("{folder}/cv.pdf"),
            folder,
        }),
    }
    .into_application(Uuid::new_v4(), Utc::now())
}
