pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::applications::handlers;
use crate::jobs::handlers as jobs;
use crate::state::AppState;
use crate::storage::handlers::handle_upload_resume;

/// Upload bodies carry base64, which inflates the file by a third. Doubling
/// the resume limit leaves room for that and for the JSON wrapper, so an
/// oversize file reaches the handler and gets a structured 413.
fn upload_body_limit(max_resume_bytes: usize) -> usize {
    max_resume_bytes.saturating_mul(2)
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = upload_body_limit(state.config.max_resume_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        // Public job listing
        .route("/api/jobs", get(jobs::handle_list_jobs))
        .route("/api/jobs/:id", get(jobs::handle_get_job))
        // Resume upload (public)
        .route(
            "/api/upload-resume",
            post(handle_upload_resume).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Applications: submit and check-duplicate are public, the rest need AdminCaller
        .route(
            "/api/job-applications",
            post(handlers::handle_submit).get(handlers::handle_list),
        )
        .route(
            "/api/job-applications/check-duplicate",
            get(handlers::handle_check_duplicate),
        )
        .route(
            "/api/job-applications/:id",
            get(handlers::handle_get).delete(handlers::handle_delete),
        )
        .route(
            "/api/job-applications/:id/status",
            put(handlers::handle_update_status),
        )
        .route(
            "/api/job-applications/:id/notes",
            post(handlers::handle_add_note),
        )
        .route(
            "/api/job-applications/:id/communications",
            post(handlers::handle_add_communication),
        )
        .with_state(state)
}
