use crate::domain::{JobStatus, JobType};
use crate::entities::{job_runs, prelude::*};
use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Serialize;

/// Repository for background job run history
pub struct JobRepository {
    conn: DatabaseConnection,
}

impl JobRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(r: job_runs::Model) -> Result<JobRun> {
        Ok(JobRun {
            id: r.id,
            job_type: r
                .job_type
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("job run {}", r.id))?,
            status: r
                .status
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("job run {}", r.id))?,
            progress: u8::try_from(r.progress.clamp(0, 100)).unwrap_or(0),
            processed: u32::try_from(r.processed).unwrap_or(0),
            total: u32::try_from(r.total).unwrap_or(0),
            message: r.message,
            started_at: r.started_at,
            finished_at: r.finished_at,
        })
    }

    pub async fn create(&self, job_type: JobType) -> Result<JobRun> {
        let model = job_runs::ActiveModel {
            job_type: Set(job_type.as_str().to_string()),
            status: Set(JobStatus::Running.as_str().to_string()),
            progress: Set(0),
            processed: Set(0),
            total: Set(0),
            message: Set(None),
            started_at: Set(chrono::Utc::now().to_rfc3339()),
            finished_at: Set(None),
            ..Default::default()
        }
        .insert(&self.conn)
        .await?;

        Self::map_model(model)
    }

    pub async fn update_progress(
        &self,
        id: i32,
        processed: u32,
        total: u32,
        progress: u8,
    ) -> Result<()> {
        JobRuns::update_many()
            .col_expr(
                job_runs::Column::Processed,
                sea_orm::sea_query::Expr::value(i32::try_from(processed).unwrap_or(i32::MAX)),
            )
            .col_expr(
                job_runs::Column::Total,
                sea_orm::sea_query::Expr::value(i32::try_from(total).unwrap_or(i32::MAX)),
            )
            .col_expr(
                job_runs::Column::Progress,
                sea_orm::sea_query::Expr::value(i32::from(progress)),
            )
            .filter(job_runs::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn finish(&self, id: i32, status: JobStatus, message: Option<&str>) -> Result<()> {
        let mut update = JobRuns::update_many()
            .col_expr(
                job_runs::Column::Status,
                sea_orm::sea_query::Expr::value(status.as_str()),
            )
            .col_expr(
                job_runs::Column::FinishedAt,
                sea_orm::sea_query::Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .col_expr(
                job_runs::Column::Message,
                sea_orm::sea_query::Expr::value(message.map(str::to_string)),
            );

        if status == JobStatus::Completed {
            update = update.col_expr(
                job_runs::Column::Progress,
                sea_orm::sea_query::Expr::value(100),
            );
        }

        update
            .filter(job_runs::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: i32) -> Result<Option<JobRun>> {
        JobRuns::find_by_id(id)
            .one(&self.conn)
            .await?
            .map(Self::map_model)
            .transpose()
    }

    pub async fn list(&self, limit: u64) -> Result<Vec<JobRun>> {
        let rows = JobRuns::find()
            .order_by_desc(job_runs::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await?;
        rows.into_iter().map(Self::map_model).collect()
    }

    pub async fn latest(&self, job_type: JobType) -> Result<Option<JobRun>> {
        JobRuns::find()
            .filter(job_runs::Column::JobType.eq(job_type.as_str()))
            .order_by_desc(job_runs::Column::Id)
            .one(&self.conn)
            .await?
            .map(Self::map_model)
            .transpose()
    }

    /// Runs still marked running at startup belong to a previous process.
    pub async fn fail_stale(&self) -> Result<u64> {
        let result = JobRuns::update_many()
            .col_expr(
                job_runs::Column::Status,
                sea_orm::sea_query::Expr::value(JobStatus::Failed.as_str()),
            )
            .col_expr(
                job_runs::Column::Message,
                sea_orm::sea_query::Expr::value("interrupted by shutdown"),
            )
            .col_expr(
                job_runs::Column::FinishedAt,
                sea_orm::sea_query::Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(job_runs::Column::Status.eq(JobStatus::Running.as_str()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}

// ============================================================================
// Data Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct JobRun {
    pub id: i32,
    pub job_type: JobType,
    pub status: JobStatus,
    pub progress: u8,
    pub processed: u32,
    pub total: u32,
    pub message: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
}
