use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::applications::store::{
    ApplicationFilter, ApplicationPage, ApplicationStore, ListQuery, StatusCounts, StoreError,
};
use crate::models::application::{
    AdminNote, ApplicationStatus, Communication, JobApplication, JobApplicationRow,
};
use crate::models::job::JobPosting;

/// PostgreSQL-backed [`ApplicationStore`].
#[derive(Clone)]
pub struct PgApplicationStore {
    pool: PgPool,
}

impl PgApplicationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_domain(row: JobApplicationRow) -> Result<JobApplication, StoreError> {
    let id = row.id;
    JobApplication::try_from(row)
        .map_err(|e| StoreError::Corrupt(format!("application {id}: {e}")))
}

fn into_domain_opt(row: Option<JobApplicationRow>) -> Result<Option<JobApplication>, StoreError> {
    row.map(into_domain).transpose()
}

/// Escapes `%`, `_` and `\` so user input is matched literally by ILIKE.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ApplicationFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(job_id) = filter.job_id {
        qb.push(" AND job_id = ").push_bind(job_id);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        qb.push(" AND (");
        for (i, column) in ["first_name", "last_name", "email", "job_title"]
            .into_iter()
            .enumerate()
        {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(column).push(" ILIKE ").push_bind(pattern.clone());
        }
        qb.push(")");
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn find_job(&self, job_id: Uuid) -> Result<Option<JobPosting>, StoreError> {
        Ok(
            sqlx::query_as::<_, JobPosting>("SELECT * FROM job_postings WHERE id = $1")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_jobs(&self, active_only: bool) -> Result<Vec<JobPosting>, StoreError> {
        Ok(sqlx::query_as::<_, JobPosting>(
            r#"
            SELECT * FROM job_postings
            WHERE NOT $1 OR status = 'active'
            ORDER BY created_at DESC
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_by_email_and_job(
        &self,
        email: &str,
        job_id: Uuid,
    ) -> Result<Option<JobApplication>, StoreError> {
        let row = sqlx::query_as::<_, JobApplicationRow>(
            "SELECT * FROM job_applications WHERE lower(email) = lower($1) AND job_id = $2",
        )
        .bind(email)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        into_domain_opt(row)
    }

    async fn insert(&self, app: &JobApplication) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO job_applications
                (id, job_id, job_title, first_name, last_name, email, phone,
                 current_position, experience, expected_salary, current_location,
                 willing_to_relocate, skills, portfolio_url, resume_url, resume_file_name,
                 resume_storage_id, resume_folder, status, admin_notes, communications,
                 consent_to_process, applied_at, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(app.id)
        .bind(app.job_id)
        .bind(&app.job_title)
        .bind(&app.first_name)
        .bind(&app.last_name)
        .bind(&app.email)
        .bind(&app.phone)
        .bind(&app.current_position)
        .bind(app.experience.as_str())
        .bind(&app.expected_salary)
        .bind(&app.current_location)
        .bind(app.willing_to_relocate)
        .bind(&app.skills)
        .bind(&app.portfolio_url)
        .bind(&app.resume_url)
        .bind(&app.resume_file_name)
        .bind(&app.resume_storage_id)
        .bind(&app.resume_folder)
        .bind(app.status.as_str())
        .bind(Json(&app.admin_notes))
        .bind(Json(&app.communications))
        .bind(app.consent_to_process)
        .bind(app.applied_at)
        .bind(app.last_updated)
        .execute(&mut *tx)
        .await;

        match inserted {
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(StoreError::Duplicate)
            }
            other => {
                other?;
            }
        }

        sqlx::query(
            "UPDATE job_postings SET application_count = application_count + 1 WHERE id = $1",
        )
        .bind(app.job_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Inserted application {} for job {}", app.id, app.job_id);
        Ok(())
    }

    async fn list(&self, query: &ListQuery) -> Result<ApplicationPage, StoreError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM job_applications");
        push_filters(&mut count_qb, &query.filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM job_applications");
        push_filters(&mut qb, &query.filter);
        // Column and direction come from closed enums, never from raw input.
        qb.push(format!(
            " ORDER BY {} {}, id {}",
            query.sort_by.column(),
            query.sort_order.keyword(),
            query.sort_order.keyword()
        ));
        qb.push(" LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));

        let rows: Vec<JobApplicationRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(into_domain)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ApplicationPage {
            items,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    async fn status_counts(&self) -> Result<StatusCounts, StoreError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM job_applications GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let pairs = rows
            .into_iter()
            .map(|(status, count)| {
                let status = status
                    .parse::<ApplicationStatus>()
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                Ok((status, u64::try_from(count).unwrap_or(0)))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(StatusCounts::from_pairs(pairs))
    }

    async fn get(&self, id: Uuid) -> Result<Option<JobApplication>, StoreError> {
        let row = sqlx::query_as::<_, JobApplicationRow>(
            "SELECT * FROM job_applications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        into_domain_opt(row)
    }

    async fn count_sharing_resume_folder(
        &self,
        folder: &str,
        exclude: Uuid,
    ) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM job_applications WHERE resume_folder = $1 AND id <> $2",
        )
        .bind(folder)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        note: Option<&AdminNote>,
        now: DateTime<Utc>,
    ) -> Result<Option<JobApplication>, StoreError> {
        let notes: Vec<&AdminNote> = note.into_iter().collect();
        let row = sqlx::query_as::<_, JobApplicationRow>(
            r#"
            UPDATE job_applications
            SET status = $2,
                admin_notes = admin_notes || $3::jsonb,
                last_updated = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(Json(notes))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        into_domain_opt(row)
    }

    async fn append_note(
        &self,
        id: Uuid,
        note: &AdminNote,
        now: DateTime<Utc>,
    ) -> Result<Option<JobApplication>, StoreError> {
        // Append-only: concatenate, never rewrite existing entries
        let row = sqlx::query_as::<_, JobApplicationRow>(
            r#"
            UPDATE job_applications
            SET admin_notes = admin_notes || $2::jsonb,
                last_updated = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json([note]))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        into_domain_opt(row)
    }

    async fn append_communication(
        &self,
        id: Uuid,
        communication: &Communication,
        now: DateTime<Utc>,
    ) -> Result<Option<JobApplication>, StoreError> {
        let row = sqlx::query_as::<_, JobApplicationRow>(
            r#"
            UPDATE job_applications
            SET communications = communications || $2::jsonb,
                last_updated = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json([communication]))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        into_domain_opt(row)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<JobApplication>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, JobApplicationRow>(
            "DELETE FROM job_applications WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE job_postings
            SET application_count = GREATEST(application_count - 1, 0)
            WHERE id = $1
            "#,
        )
        .bind(row.job_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Deleted application {id}");
        into_domain(row).map(Some)
    }
}
