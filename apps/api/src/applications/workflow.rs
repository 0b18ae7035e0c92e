//! Admin workflow over existing applications: listing, status changes, notes,
//! communications and deletion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::applications::status::{StatusChange, TransitionPolicy};
use crate::applications::store::{ListQuery, Pagination, StatusCounts};
use crate::applications::validation::is_valid_email;
use crate::errors::AppError;
use crate::models::application::{
    AdminNote, ApplicationStatus, Communication, CommunicationChannel, JobApplication,
};
use crate::notifications::Notification;
use crate::state::AppState;
use crate::storage::FolderDeletion;

const DEFAULT_ACTOR: &str = "Admin";

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Application {id} not found"))
}

fn actor(name: Option<&str>) -> String {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_ACTOR)
        .to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Listing
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationList {
    pub applications: Vec<JobApplication>,
    pub pagination: Pagination,
    pub status_counts: StatusCounts,
}

pub async fn list(state: &AppState, query: &ListQuery) -> Result<ApplicationList, AppError> {
    let page = state.store.list(query).await?;
    let status_counts = state.store.status_counts().await?;
    Ok(ApplicationList {
        pagination: Pagination::new(query.page, query.limit, page.total),
        applications: page.items,
        status_counts,
    })
}

pub async fn get(state: &AppState, id: Uuid) -> Result<JobApplication, AppError> {
    state.store.get(id).await?.ok_or_else(|| not_found(id))
}

// ────────────────────────────────────────────────────────────────────────────
// Status
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub status: String,
    pub note: Option<String>,
    pub updated_by: Option<String>,
}

pub async fn update_status(
    state: &AppState,
    id: Uuid,
    request: StatusUpdateRequest,
) -> Result<JobApplication, AppError> {
    update_status_at(state, id, request, Utc::now()).await
}

/// The status write does not wait on, or depend on, the applicant email.
pub async fn update_status_at(
    state: &AppState,
    id: Uuid,
    request: StatusUpdateRequest,
    now: DateTime<Utc>,
) -> Result<JobApplication, AppError> {
    let new_status: ApplicationStatus = request.status.trim().parse().map_err(|_| {
        AppError::invalid(
            "status",
            format!(
                "Status must be one of: {}",
                ApplicationStatus::ALL.map(|s| s.as_str()).join(", ")
            ),
        )
    })?;

    let current = get(state, id).await?;
    if !TransitionPolicy.permits(current.status, new_status) {
        return Err(AppError::invalid(
            "status",
            format!("Cannot move from {} to {}", current.status, new_status),
        ));
    }

    let updated_by = actor(request.updated_by.as_deref());
    let change = StatusChange::plan(
        current.status,
        new_status,
        request.note.as_deref(),
        &updated_by,
        now,
    );

    let updated = state
        .store
        .update_status(id, new_status, change.note.as_ref(), now)
        .await?
        .ok_or_else(|| not_found(id))?;

    info!(
        "Application {id} status {} -> {} by {updated_by}",
        change.from, change.to
    );

    if change.notifies_applicant() {
        state.notifier.dispatch(
            Notification::StatusUpdate {
                application: updated.clone(),
                previous: change.from,
            },
            updated.email.clone(),
        );
    }

    Ok(updated)
}

// ────────────────────────────────────────────────────────────────────────────
// Notes and communications
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNoteRequest {
    pub note: String,
    pub added_by: Option<String>,
}

pub async fn add_note(
    state: &AppState,
    id: Uuid,
    request: AddNoteRequest,
) -> Result<JobApplication, AppError> {
    let text = request.note.trim();
    if text.is_empty() {
        return Err(AppError::invalid("note", "Note text is required"));
    }

    let now = Utc::now();
    let note = AdminNote {
        text: text.to_string(),
        added_by: actor(request.added_by.as_deref()),
        added_at: now,
    };

    state
        .store
        .append_note(id, &note, now)
        .await?
        .ok_or_else(|| not_found(id))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommunicationRequest {
    #[serde(rename = "type", default = "default_channel")]
    pub channel: CommunicationChannel,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
    pub sent_by: Option<String>,
    pub sent_to: Option<String>,
}

fn default_channel() -> CommunicationChannel {
    CommunicationChannel::Email
}

/// Email entries are sent first and recorded only once the send succeeds.
/// Phone and meeting entries record contact made elsewhere and send nothing.
pub async fn add_communication(
    state: &AppState,
    id: Uuid,
    request: AddCommunicationRequest,
) -> Result<JobApplication, AppError> {
    let subject = request.subject.trim();
    let message = request.message.trim();
    let mut errors = crate::errors::FieldErrors::new();
    if subject.is_empty() {
        errors.insert("subject".to_string(), "Subject is required".to_string());
    }
    if message.is_empty() {
        errors.insert("message".to_string(), "Message is required".to_string());
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let application = get(state, id).await?;
    let sent_to = request
        .sent_to
        .as_deref()
        .map(str::trim)
        .filter(|to| !to.is_empty())
        .unwrap_or(application.email.as_str())
        .to_string();

    if request.channel == CommunicationChannel::Email {
        if !is_valid_email(&sent_to) {
            return Err(AppError::invalid("sentTo", "Please enter a valid email address"));
        }
        state
            .notifier
            .send(
                &Notification::Custom {
                    applicant_name: application.first_name.clone(),
                    subject: subject.to_string(),
                    message: message.to_string(),
                },
                &sent_to,
            )
            .await?;
    }

    let now = Utc::now();
    let communication = Communication {
        channel: request.channel,
        subject: subject.to_string(),
        message: message.to_string(),
        sent_by: actor(request.sent_by.as_deref()),
        sent_to,
        sent_at: now,
    };

    state
        .store
        .append_communication(id, &communication, now)
        .await?
        .ok_or_else(|| not_found(id))
}

// ────────────────────────────────────────────────────────────────────────────
// Deletion
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedApplication {
    pub application_id: Uuid,
    /// What storage cleanup achieved. Absent when there was nothing to clean.
    pub storage: Option<FolderDeletion>,
}

/// Storage cleanup is best effort and never blocks the database delete.
pub async fn delete(state: &AppState, id: Uuid) -> Result<DeletedApplication, AppError> {
    let application = get(state, id).await?;
    let storage = cleanup_resume(state, &application).await;

    state
        .store
        .delete(id)
        .await?
        .ok_or_else(|| not_found(id))?;

    info!("Application {id} deleted");
    Ok(DeletedApplication {
        application_id: id,
        storage,
    })
}

/// Removes the application's own resume. The whole folder goes only when no
/// other application keeps a resume in it; otherwise, or when the folder
/// cannot be listed, just the linked object is deleted.
async fn cleanup_resume(state: &AppState, application: &JobApplication) -> Option<FolderDeletion> {
    let id = application.id;
    if let Some(folder) = &application.resume_folder {
        let shared = match state.store.count_sharing_resume_folder(folder, id).await {
            Ok(others) => others > 0,
            Err(e) => {
                warn!("Application {id}: could not check who shares {folder}: {e}");
                true
            }
        };

        if shared {
            info!("Application {id}: resume folder {folder} is shared, deleting own file only");
        } else {
            match state.storage.delete_folder(folder).await {
                Ok(summary) => {
                    if !summary.failed_deletions.is_empty() {
                        warn!(
                            "Application {id}: {} of {} resume files could not be deleted",
                            summary.failed_deletions.len(),
                            summary.total_files
                        );
                    }
                    return Some(summary);
                }
                Err(e) => {
                    warn!("Application {id}: resume folder {folder} cleanup failed: {e}");
                    return Some(match application.resume_storage_id.as_deref() {
                        Some(storage_id) => delete_single(state, id, storage_id).await,
                        None => FolderDeletion {
                            failed_deletions: vec![folder.clone()],
                            ..Default::default()
                        },
                    });
                }
            }
        }
    }

    let storage_id = application.resume_storage_id.as_deref()?;
    Some(delete_single(state, id, storage_id).await)
}

async fn delete_single(state: &AppState, id: Uuid, storage_id: &str) -> FolderDeletion {
    let mut summary = FolderDeletion {
        total_files: 1,
        ..Default::default()
    };
    match state.storage.delete_one(storage_id).await {
        Ok(()) => summary.deleted_count = 1,
        Err(e) => {
            warn!("Application {id}: resume {storage_id} cleanup failed: {e}");
            summary.failed_deletions.push(storage_id.to_string());
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applications::intake::submit;
    use crate::applications::store::{ApplicationFilter, SortField, SortOrder};
    use crate::test_support::{submit_request, test_state, TestHarness};

    async fn seeded(harness: &TestHarness, email: &str) -> JobApplication {
        let job = harness.store.seed_job("Engineer");
        submit(&harness.state, submit_request(job.id, email))
            .await
            .unwrap()
    }

    fn status_request(status: &str, note: Option<&str>) -> StatusUpdateRequest {
        StatusUpdateRequest {
            status: status.to_string(),
            note: note.map(str::to_string),
            updated_by: Some("HR".to_string()),
        }
    }

    #[tokio::test]
    async fn test_add_note_appends_exactly_one() {
        let harness = test_state();
        let app = seeded(&harness, "a@b.com").await;

        let updated = add_note(
            &harness.state,
            app.id,
            AddNoteRequest {
                note: "x".to_string(),
                added_by: Some("HR".to_string()),
            },
        )
        .await
        .unwrap();

        let fetched = get(&harness.state, app.id).await.unwrap();
        assert_eq!(fetched, updated);
        assert_eq!(fetched.admin_notes.len(), app.admin_notes.len() + 1);
        assert_eq!(fetched.admin_notes[0].text, "x");
        assert_eq!(fetched.admin_notes[0].added_by, "HR");

        // Nothing else moved except last_updated
        let mut expected = app.clone();
        expected.admin_notes = fetched.admin_notes.clone();
        expected.last_updated = fetched.last_updated;
        assert_eq!(fetched, expected);
    }

    #[tokio::test]
    async fn test_empty_note_rejected() {
        let harness = test_state();
        let app = seeded(&harness, "a@b.com").await;
        let err = add_note(&harness.state, app.id, AddNoteRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_note_on_missing_application() {
        let harness = test_state();
        let err = add_note(
            &harness.state,
            Uuid::new_v4(),
            AddNoteRequest {
                note: "x".to_string(),
                added_by: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_status_is_idempotent_without_reason() {
        let harness = test_state();
        let app = seeded(&harness, "a@b.com").await;

        let first = update_status(&harness.state, app.id, status_request("selected", None))
            .await
            .unwrap();
        let second = update_status(&harness.state, app.id, status_request("selected", None))
            .await
            .unwrap();

        assert_eq!(first.status, ApplicationStatus::Selected);
        assert_eq!(second.status, ApplicationStatus::Selected);
        assert!(second.admin_notes.is_empty());
        assert_eq!(
            get(&harness.state, app.id).await.unwrap().status,
            ApplicationStatus::Selected
        );
    }

    #[tokio::test]
    async fn test_each_reason_adds_one_note() {
        let harness = test_state();
        let app = seeded(&harness, "a@b.com").await;

        update_status(&harness.state, app.id, status_request("reviewing", Some("Looks promising")))
            .await
            .unwrap();
        let request = status_request("reviewing", Some("Second look"));
        let updated = update_status(&harness.state, app.id, request).await.unwrap();

        assert_eq!(updated.admin_notes.len(), 2);
        assert_eq!(
            updated.admin_notes[0].text,
            "Status changed from Pending to Under Review: Looks promising"
        );
        assert_eq!(
            updated.admin_notes[1].text,
            "Status remains Under Review: Second look"
        );
    }

    #[tokio::test]
    async fn test_unknown_status_rejected() {
        let harness = test_state();
        let app = seeded(&harness, "a@b.com").await;
        let err = update_status(&harness.state, app.id, status_request("hired", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.contains_key("status")));
        assert_eq!(
            get(&harness.state, app.id).await.unwrap().status,
            ApplicationStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_rejection_emails_applicant() {
        let harness = test_state();
        let app = seeded(&harness, "a@b.com").await;
        harness.mailer.wait_for(2).await;
        harness.mailer.clear();

        let request = status_request("rejected", Some("Not a fit"));
        let updated = update_status(&harness.state, app.id, request).await.unwrap();
        assert_eq!(updated.status, ApplicationStatus::Rejected);

        let sent = harness.mailer.wait_for(1).await;
        assert_eq!(sent[0].to, "a@b.com");
        assert!(sent[0].html.contains("not to move forward"));
    }

    #[tokio::test]
    async fn test_status_changes_even_when_email_fails() {
        let harness = test_state();
        let app = seeded(&harness, "a@b.com").await;
        harness.mailer.set_failing(true);

        let request = status_request("rejected", Some("Not a fit"));
        let updated = update_status(&harness.state, app.id, request).await.unwrap();
        assert_eq!(updated.status, ApplicationStatus::Rejected);
        assert_eq!(
            get(&harness.state, app.id).await.unwrap().status,
            ApplicationStatus::Rejected
        );
    }

    #[tokio::test]
    async fn test_same_status_sends_no_email() {
        let harness = test_state();
        let app = seeded(&harness, "a@b.com").await;
        harness.mailer.wait_for(2).await;
        harness.mailer.clear();

        update_status(&harness.state, app.id, status_request("pending", Some("Still waiting")))
            .await
            .unwrap();
        tokio::task::yield_now().await;
        assert!(harness.mailer.sent().is_empty());
    }

    fn email_request() -> AddCommunicationRequest {
        AddCommunicationRequest {
            channel: CommunicationChannel::Email,
            subject: "Interview invite".to_string(),
            message: "Are you free on Monday?".to_string(),
            sent_by: Some("HR".to_string()),
            sent_to: None,
        }
    }

    #[tokio::test]
    async fn test_communication_recorded_after_send() {
        let harness = test_state();
        let app = seeded(&harness, "a@b.com").await;
        harness.mailer.wait_for(2).await;
        harness.mailer.clear();

        let updated = add_communication(&harness.state, app.id, email_request())
            .await
            .unwrap();

        assert_eq!(updated.communications.len(), 1);
        let comm = &updated.communications[0];
        assert_eq!(comm.sent_to, "a@b.com");
        assert_eq!(comm.channel, CommunicationChannel::Email);
        assert_eq!(harness.mailer.sent().len(), 1);
        assert_eq!(harness.mailer.sent()[0].subject, "Interview invite");
    }

    #[tokio::test]
    async fn test_failed_send_records_nothing() {
        let harness = test_state();
        let app = seeded(&harness, "a@b.com").await;
        harness.mailer.set_failing(true);

        let err = add_communication(&harness.state, app.id, email_request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Email(_)));
        assert!(get(&harness.state, app.id)
            .await
            .unwrap()
            .communications
            .is_empty());
    }

    #[tokio::test]
    async fn test_phone_call_is_logged_without_email() {
        let harness = test_state();
        let app = seeded(&harness, "a@b.com").await;
        harness.mailer.set_failing(true);

        let mut request = email_request();
        request.channel = CommunicationChannel::Phone;
        request.sent_to = Some("+911234567890".to_string());

        let updated = add_communication(&harness.state, app.id, request).await.unwrap();
        assert_eq!(updated.communications[0].channel, CommunicationChannel::Phone);
        assert_eq!(updated.communications[0].sent_to, "+911234567890");
    }

    #[tokio::test]
    async fn test_delete_cleans_folder_and_decrements_counter() {
        let harness = test_state();
        let job = harness.store.seed_job("Engineer");
        let app = submit(&harness.state, submit_request(job.id, "a@b.com"))
            .await
            .unwrap();
        let folder = app.resume_folder.clone().unwrap();
        harness.storage.seed(&folder, &["cv_1.pdf", "cv_old.pdf"]);
        assert_eq!(harness.store.job_application_count(job.id), 1);

        let deleted = delete(&harness.state, app.id).await.unwrap();

        assert_eq!(deleted.application_id, app.id);
        let summary = deleted.storage.unwrap();
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.deleted_count, 2);
        assert_eq!(harness.store.job_application_count(job.id), 0);
        assert!(harness.storage.keys_under(&folder).is_empty());

        let listed = list(&harness.state, &ListQuery::default()).await.unwrap();
        assert!(listed.applications.iter().all(|a| a.id != app.id));
    }

    #[tokio::test]
    async fn test_delete_survives_storage_failure() {
        let harness = test_state();
        let app = seeded(&harness, "a@b.com").await;
        harness
            .storage
            .seed(app.resume_folder.as_deref().unwrap(), &["cv.pdf"]);
        harness.storage.set_failing(true);

        let deleted = delete(&harness.state, app.id).await.unwrap();
        let summary = deleted.storage.unwrap();
        assert_eq!(summary.total_files, 1);
        assert_eq!(summary.deleted_count, 0);
        assert_eq!(summary.failed_deletions.len(), 1);
        assert!(harness.state.store.get(app.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_keeps_resumes_in_a_shared_folder() {
        let harness = test_state();
        let first_job = harness.store.seed_job("Engineer");
        let second_job = harness.store.seed_job("Designer");
        let folder = "career-applications/John_Smith";
        harness.storage.seed(folder, &["cv_1.pdf", "cv_2.pdf"]);

        let mut ids = Vec::new();
        for (job_id, email, name) in [
            (first_job.id, "john@a.com", "cv_1.pdf"),
            (second_job.id, "john@b.com", "cv_2.pdf"),
        ] {
            let mut request = submit_request(job_id, email);
            let key = format!("{folder}/{name}");
            request.resume_url = Some(format!("https://files.example.com/{key}"));
            request.resume_public_id = Some(key);
            request.resume_folder = Some(folder.to_string());
            ids.push(submit(&harness.state, request).await.unwrap().id);
        }

        let deleted = delete(&harness.state, ids[0]).await.unwrap();

        let summary = deleted.storage.unwrap();
        assert_eq!(summary.total_files, 1);
        assert_eq!(summary.deleted_count, 1);
        assert!(!harness.storage.contains(&format!("{folder}/cv_1.pdf")));
        assert!(harness.storage.contains(&format!("{folder}/cv_2.pdf")));

        // Last one out takes the folder.
        let deleted = delete(&harness.state, ids[1]).await.unwrap();
        assert_eq!(deleted.storage.unwrap().deleted_count, 1);
        assert!(harness.storage.keys_under(folder).is_empty());
    }

    #[tokio::test]
    async fn test_delete_falls_back_to_single_file_when_listing_fails() {
        let harness = test_state();
        let app = seeded(&harness, "a@b.com").await;
        let folder = app.resume_folder.clone().unwrap();
        let storage_id = app.resume_storage_id.clone().unwrap();
        let stored_name = storage_id.rsplit('/').next().unwrap().to_string();
        harness.storage.seed(&folder, &[stored_name.as_str(), "cv_old.pdf"]);
        harness.storage.set_listing_failing(true);

        let deleted = delete(&harness.state, app.id).await.unwrap();

        let summary = deleted.storage.unwrap();
        assert_eq!(summary.total_files, 1);
        assert_eq!(summary.deleted_count, 1);
        assert!(summary.failed_deletions.is_empty());
        assert!(!harness.storage.contains(&storage_id));
        assert!(harness.storage.contains(&format!("{folder}/cv_old.pdf")));
        assert!(harness.state.store.get(app.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_application() {
        let harness = test_state();
        let err = delete(&harness.state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_and_counts() {
        let harness = test_state();
        let job = harness.store.seed_job("Backend Engineer");
        let other = harness.store.seed_job("Designer");
        let a = submit(&harness.state, submit_request(job.id, "a@b.com")).await.unwrap();
        submit(&harness.state, submit_request(job.id, "c@d.com")).await.unwrap();
        submit(&harness.state, submit_request(other.id, "e@f.com")).await.unwrap();
        update_status(&harness.state, a.id, status_request("shortlisted", None))
            .await
            .unwrap();

        let query = ListQuery {
            filter: ApplicationFilter {
                status: Some(ApplicationStatus::Shortlisted),
                ..Default::default()
            },
            ..Default::default()
        };
        let listed = list(&harness.state, &query).await.unwrap();
        assert_eq!(listed.applications.len(), 1);
        assert_eq!(listed.pagination.total_items, 1);
        // Counts ignore the filter
        assert_eq!(listed.status_counts.total, 3);
        assert_eq!(listed.status_counts.get(ApplicationStatus::Pending), 2);
        assert_eq!(listed.status_counts.get(ApplicationStatus::Shortlisted), 1);

        let search = ListQuery {
            filter: ApplicationFilter {
                search: Some("DESIGN".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let found = list(&harness.state, &search).await.unwrap();
        assert_eq!(found.applications.len(), 1);
        assert_eq!(found.applications[0].email, "e@f.com");

        let by_job = ListQuery {
            filter: ApplicationFilter {
                job_id: Some(job.id),
                ..Default::default()
            },
            sort_by: SortField::Email,
            sort_order: SortOrder::Asc,
            page: 1,
            limit: 1,
        };
        let paged = list(&harness.state, &by_job).await.unwrap();
        assert_eq!(paged.applications.len(), 1);
        assert_eq!(paged.applications[0].email, "a@b.com");
        assert_eq!(paged.pagination.total_pages, 2);
        assert!(paged.pagination.has_next_page);
    }
}
