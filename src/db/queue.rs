//! Job queue repository.
//!
//! Entries are produced by the publish endpoints and consumed by the drain
//! job; rows are only removed after the remote change set is confirmed, so a
//! failed drain retries the same batch on its next tick.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{JobAction, NewThemeJob, ThemeJobQueueEntry};

/// Repository for pending theme publish/unpublish jobs.
#[derive(Clone)]
pub struct JobQueueRepository {
    pool: SqlitePool,
}

impl JobQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Enqueue a new theme job.
    pub async fn enqueue(&self, job: &NewThemeJob) -> Result<ThemeJobQueueEntry, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO theme_job_queue (id, user_id, theme_id, name, description, version, action, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&job.user_id)
        .bind(&job.theme_id)
        .bind(&job.name)
        .bind(&job.description)
        .bind(&job.version)
        .bind(job.action.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(ThemeJobQueueEntry {
            id,
            user_id: job.user_id.clone(),
            theme_id: job.theme_id.clone(),
            name: job.name.clone(),
            description: job.description.clone(),
            version: job.version.clone(),
            action: job.action,
            created_at: now,
        })
    }

    /// List all pending entries, oldest first.
    pub async fn pending(&self) -> Result<Vec<ThemeJobQueueEntry>, AppError> {
        let rows = sqlx::query(
            "SELECT id, user_id, theme_id, name, description, version, action, created_at FROM theme_job_queue ORDER BY created_at, id"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    /// Theme ids with at least one pending entry.
    ///
    /// The reconciler treats these as in flight and never deletes them.
    pub async fn pending_theme_ids(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query("SELECT DISTINCT theme_id FROM theme_job_queue")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.get("theme_id")).collect())
    }

    /// Remove consumed entries by job id.
    pub async fn remove(&self, ids: &[String]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM theme_job_queue WHERE id IN ({})", placeholders);

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ThemeJobQueueEntry, AppError> {
    let action: String = row.get("action");
    let action = JobAction::from_str(&action)
        .ok_or_else(|| AppError::Database(format!("Unknown job action: {}", action)))?;

    Ok(ThemeJobQueueEntry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        theme_id: row.get("theme_id"),
        name: row.get("name"),
        description: row.get("description"),
        version: row.get("version"),
        action,
        created_at: row.get("created_at"),
    })
}
