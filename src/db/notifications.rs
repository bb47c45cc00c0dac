//! Job notification persistence (§4.?, job-progress notification fabric).
//!
//! One row per `(library_section_id, job_type)`. The in-memory fabric (broadcast channel +
//! `DashMap` cache) is the hot path for live subscribers; this table is the durable record a
//! client reconnecting after a restart replays from, keyed by `epoch` so stale updates in flight
//! during the gap are dropped rather than applied out of order.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct JobNotificationRecord {
    pub library_section_id: i64,
    pub job_type: String,
    pub epoch: i64,
    pub total: i64,
    pub completed: i64,
    pub status: String,
    pub last_update: DateTime<Utc>,
    pub error_message: Option<String>,
}

fn from_row(
    row: (i64, String, i64, i64, i64, String, DateTime<Utc>, Option<String>),
) -> JobNotificationRecord {
    JobNotificationRecord {
        library_section_id: row.0,
        job_type: row.1,
        epoch: row.2,
        total: row.3,
        completed: row.4,
        status: row.5,
        last_update: row.6,
        error_message: row.7,
    }
}

const COLUMNS: &str =
    "library_section_id, job_type, epoch, total, completed, status, last_update, error_message";

pub struct JobNotificationRepository {
    pool: SqlitePool,
}

impl JobNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(
        &self,
        library_section_id: i64,
        job_type: &str,
    ) -> Result<Option<JobNotificationRecord>> {
        let row = sqlx::query_as::<_, (i64, String, i64, i64, i64, String, DateTime<Utc>, Option<String>)>(
            &format!("SELECT {COLUMNS} FROM job_notifications WHERE library_section_id = ? AND job_type = ?"),
        )
        .bind(library_section_id)
        .bind(job_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    pub async fn list_active(&self) -> Result<Vec<JobNotificationRecord>> {
        let rows = sqlx::query_as::<_, (i64, String, i64, i64, i64, String, DateTime<Utc>, Option<String>)>(
            &format!("SELECT {COLUMNS} FROM job_notifications WHERE status NOT IN ('Completed', 'Failed') ORDER BY last_update"),
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    /// Start a new epoch for this `(library_section_id, job_type)`, replacing any prior row.
    /// Called when a scan or job begins, so reconnecting subscribers can tell a fresh run from
    /// the tail of a previous one.
    pub async fn begin_epoch(
        &self,
        library_section_id: i64,
        job_type: &str,
        total: i64,
    ) -> Result<JobNotificationRecord> {
        sqlx::query(
            r#"
            INSERT INTO job_notifications (library_section_id, job_type, epoch, total, completed, status, last_update)
            VALUES (?, ?, 1, ?, 0, 'Running', CURRENT_TIMESTAMP)
            ON CONFLICT (library_section_id, job_type) DO UPDATE SET
                epoch = job_notifications.epoch + 1,
                total = excluded.total,
                completed = 0,
                status = 'Running',
                error_message = NULL,
                last_update = CURRENT_TIMESTAMP
            "#,
        )
        .bind(library_section_id)
        .bind(job_type)
        .bind(total)
        .execute(&self.pool)
        .await?;

        self.get(library_section_id, job_type)
            .await?
            .ok_or_else(|| anyhow::anyhow!("job notification row vanished after begin_epoch"))
    }

    pub async fn advance(
        &self,
        library_section_id: i64,
        job_type: &str,
        completed: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE job_notifications
            SET completed = ?, last_update = CURRENT_TIMESTAMP
            WHERE library_section_id = ? AND job_type = ?
            "#,
        )
        .bind(completed)
        .bind(library_section_id)
        .bind(job_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn complete(&self, library_section_id: i64, job_type: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE job_notifications
            SET status = 'Completed', last_update = CURRENT_TIMESTAMP
            WHERE library_section_id = ? AND job_type = ?
            "#,
        )
        .bind(library_section_id)
        .bind(job_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fail(
        &self,
        library_section_id: i64,
        job_type: &str,
        error_message: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE job_notifications
            SET status = 'Failed', error_message = ?, last_update = CURRENT_TIMESTAMP
            WHERE library_section_id = ? AND job_type = ?
            "#,
        )
        .bind(error_message)
        .bind(library_section_id)
        .bind(job_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Deletes terminal (`Completed`/`Failed`) rows whose `last_update` is older than `cutoff`,
    /// backing the Ambient Scheduler's daily job-notification retention sweep (§4.6/§4.17).
    pub async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM job_notifications WHERE status IN ('Completed', 'Failed') AND last_update < ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
