use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::applications::intake::{self, DuplicateCheck, SubmitApplicationRequest};
use crate::applications::store::{
    ApplicationFilter, ListQuery, SortField, SortOrder, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use crate::applications::workflow::{
    self, AddCommunicationRequest, AddNoteRequest, ApplicationList, DeletedApplication,
    StatusUpdateRequest,
};
use crate::auth::AdminCaller;
use crate::errors::AppError;
use crate::models::application::{ApplicationStatus, JobApplication};
use crate::state::AppState;

/// POST /api/job-applications
pub async fn handle_submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitApplicationRequest>,
) -> Result<(StatusCode, Json<JobApplication>), AppError> {
    let application = intake::submit(&state, req).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateQuery {
    pub email: Option<String>,
    pub job_id: Option<Uuid>,
}

/// GET /api/job-applications/check-duplicate?email=&jobId=
pub async fn handle_check_duplicate(
    State(state): State<AppState>,
    Query(params): Query<DuplicateQuery>,
) -> Result<Json<DuplicateCheck>, AppError> {
    let email = params
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| AppError::invalid("email", "Email is required"))?;
    let job_id = params
        .job_id
        .ok_or_else(|| AppError::invalid("jobId", "Job reference is required"))?;

    Ok(Json(intake::check_duplicate(&state, &email, job_id).await?))
}

/// Raw query string of the admin listing. Kept as strings so a bad value
/// becomes a field error instead of a bare 400 from the extractor.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub status: Option<String>,
    pub job_id: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl ListParams {
    /// Page floors at 1; limit is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn into_query(self) -> Result<ListQuery, AppError> {
        let page = match non_blank(self.page.as_deref()) {
            Some(p) => p
                .parse::<u32>()
                .map_err(|_| AppError::invalid("page", "Page must be a positive number"))?
                .max(1),
            None => 1,
        };
        let limit = match non_blank(self.limit.as_deref()) {
            Some(l) => l
                .parse::<u32>()
                .map_err(|_| AppError::invalid("limit", "Limit must be a positive number"))?
                .clamp(1, MAX_PAGE_SIZE),
            None => DEFAULT_PAGE_SIZE,
        };

        let status = match non_blank(self.status.as_deref()) {
            None | Some("all") => None,
            Some(s) => Some(
                s.parse::<ApplicationStatus>()
                    .map_err(|e| AppError::invalid("status", e.to_string()))?,
            ),
        };
        let job_id = non_blank(self.job_id.as_deref())
            .map(|id| id.parse::<Uuid>())
            .transpose()
            .map_err(|_| AppError::invalid("jobId", "Job reference is not a valid id"))?;

        let sort_by = non_blank(self.sort_by.as_deref())
            .map(|s| s.parse::<SortField>())
            .transpose()
            .map_err(|e| AppError::invalid("sortBy", e))?
            .unwrap_or_default();
        let sort_order = non_blank(self.sort_order.as_deref())
            .map(|s| s.parse::<SortOrder>())
            .transpose()
            .map_err(|e| AppError::invalid("sortOrder", e))?
            .unwrap_or_default();

        Ok(ListQuery {
            filter: ApplicationFilter {
                status,
                job_id,
                search: non_blank(self.search.as_deref()).map(str::to_string),
            },
            sort_by,
            sort_order,
            page,
            limit,
        })
    }
}

/// GET /api/job-applications
pub async fn handle_list(
    _admin: AdminCaller,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApplicationList>, AppError> {
    let query = params.into_query()?;
    Ok(Json(workflow::list(&state, &query).await?))
}

/// GET /api/job-applications/:id
pub async fn handle_get(
    _admin: AdminCaller,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobApplication>, AppError> {
    Ok(Json(workflow::get(&state, id).await?))
}

/// PUT /api/job-applications/:id/status
pub async fn handle_update_status(
    _admin: AdminCaller,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<JobApplication>, AppError> {
    Ok(Json(workflow::update_status(&state, id, req).await?))
}

/// POST /api/job-applications/:id/notes
pub async fn handle_add_note(
    _admin: AdminCaller,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddNoteRequest>,
) -> Result<Json<JobApplication>, AppError> {
    Ok(Json(workflow::add_note(&state, id, req).await?))
}

/// POST /api/job-applications/:id/communications
pub async fn handle_add_communication(
    _admin: AdminCaller,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddCommunicationRequest>,
) -> Result<Json<JobApplication>, AppError> {
    Ok(Json(workflow::add_communication(&state, id, req).await?))
}

/// DELETE /api/job-applications/:id
pub async fn handle_delete(
    _admin: AdminCaller,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedApplication>, AppError> {
    Ok(Json(workflow::delete(&state, id).await?))
}
