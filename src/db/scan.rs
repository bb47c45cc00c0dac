//! Library scan persistence (§3 LibraryScan, §4.? checkpointing).
//!
//! `checkpoint_json` lets a crashed or cancelled scan resume discovery from where it left off
//! instead of walking the whole tree again.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::util::{str_to_uuid, uuid_to_str};

#[derive(Debug, Clone)]
pub struct LibraryScanRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub library_section_id: i64,
    pub state: String,
    pub checkpoint: Option<JsonValue>,
    pub total_files: i64,
    pub processed_files: i64,
    pub added: i64,
    pub modified: i64,
    pub removed: i64,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[allow(clippy::type_complexity)]
fn from_row(
    row: (
        i64,
        String,
        i64,
        String,
        Option<String>,
        i64,
        i64,
        i64,
        i64,
        i64,
        String,
        DateTime<Utc>,
        Option<DateTime<Utc>>,
    ),
) -> Result<LibraryScanRecord> {
    Ok(LibraryScanRecord {
        id: row.0,
        uuid: str_to_uuid(&row.1)?,
        library_section_id: row.2,
        state: row.3,
        checkpoint: row.4.map(|s| serde_json::from_str(&s)).transpose()?,
        total_files: row.5,
        processed_files: row.6,
        added: row.7,
        modified: row.8,
        removed: row.9,
        errors: serde_json::from_str(&row.10)?,
        started_at: row.11,
        finished_at: row.12,
    })
}

const COLUMNS: &str = "id, uuid, library_section_id, state, checkpoint_json, total_files, \
     processed_files, added, modified, removed, errors_json, started_at, finished_at";

pub struct LibraryScanRepository {
    pool: SqlitePool,
}

impl LibraryScanRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn begin(&self, library_section_id: i64) -> Result<LibraryScanRecord> {
        let uuid = Uuid::new_v4();

        sqlx::query("INSERT INTO library_scans (uuid, library_section_id) VALUES (?, ?)")
            .bind(uuid_to_str(uuid))
            .bind(library_section_id)
            .execute(&self.pool)
            .await?;

        self.get_by_uuid(uuid)
            .await?
            .ok_or_else(|| anyhow::anyhow!("library scan vanished after insert"))
    }

    pub async fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<LibraryScanRecord>> {
        #[allow(clippy::type_complexity)]
        let row = sqlx::query_as::<_, (i64, String, i64, String, Option<String>, i64, i64, i64, i64, i64, String, DateTime<Utc>, Option<DateTime<Utc>>)>(
            &format!("SELECT {COLUMNS} FROM library_scans WHERE uuid = ?"),
        )
        .bind(uuid_to_str(uuid))
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).transpose()
    }

    /// Most recent non-terminal scan for a section, if a resume is possible.
    pub async fn get_resumable(&self, library_section_id: i64) -> Result<Option<LibraryScanRecord>> {
        #[allow(clippy::type_complexity)]
        let row = sqlx::query_as::<_, (i64, String, i64, String, Option<String>, i64, i64, i64, i64, i64, String, DateTime<Utc>, Option<DateTime<Utc>>)>(
            &format!("SELECT {COLUMNS} FROM library_scans WHERE library_section_id = ? AND state IN ('Running', 'Queued') ORDER BY started_at DESC LIMIT 1"),
        )
        .bind(library_section_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).transpose()
    }

    pub async fn checkpoint(&self, uuid: Uuid, checkpoint: &JsonValue, processed_files: i64) -> Result<()> {
        sqlx::query(
            "UPDATE library_scans SET checkpoint_json = ?, processed_files = ?, state = 'Running' WHERE uuid = ?",
        )
        .bind(checkpoint.to_string())
        .bind(processed_files)
        .bind(uuid_to_str(uuid))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_totals(&self, uuid: Uuid, total_files: i64) -> Result<()> {
        sqlx::query("UPDATE library_scans SET total_files = ? WHERE uuid = ?")
            .bind(total_files)
            .bind(uuid_to_str(uuid))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_delta(&self, uuid: Uuid, added: i64, modified: i64, removed: i64) -> Result<()> {
        sqlx::query(
            "UPDATE library_scans SET added = added + ?, modified = modified + ?, removed = removed + ? WHERE uuid = ?",
        )
        .bind(added)
        .bind(modified)
        .bind(removed)
        .bind(uuid_to_str(uuid))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn push_error(&self, uuid: Uuid, error: &str) -> Result<()> {
        let existing = self
            .get_by_uuid(uuid)
            .await?
            .ok_or_else(|| anyhow::anyhow!("scan {uuid} not found"))?;
        let mut errors = existing.errors;
        errors.push(error.to_string());

        sqlx::query("UPDATE library_scans SET errors_json = ? WHERE uuid = ?")
            .bind(serde_json::to_string(&errors)?)
            .bind(uuid_to_str(uuid))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn finish(&self, uuid: Uuid, state: &str) -> Result<()> {
        sqlx::query("UPDATE library_scans SET state = ?, finished_at = CURRENT_TIMESTAMP WHERE uuid = ?")
            .bind(state)
            .bind(uuid_to_str(uuid))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_recent(&self, library_section_id: i64, limit: i64) -> Result<Vec<LibraryScanRecord>> {
        #[allow(clippy::type_complexity)]
        let rows = sqlx::query_as::<_, (i64, String, i64, String, Option<String>, i64, i64, i64, i64, i64, String, DateTime<Utc>, Option<DateTime<Utc>>)>(
            &format!("SELECT {COLUMNS} FROM library_scans WHERE library_section_id = ? ORDER BY started_at DESC LIMIT ?"),
        )
        .bind(library_section_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(from_row).collect()
    }
}
