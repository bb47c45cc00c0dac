//! Library section and scan-location persistence (§3 LibrarySection/SectionLocation).

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::util::{str_to_uuid, uuid_to_str};

// ============================================================================
// Library sections
// ============================================================================

#[derive(Debug, Clone)]
pub struct LibrarySectionRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub section_type: String,
    pub settings: JsonValue,
    pub requires_full_rescan: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn section_from_row(
    row: (i64, String, String, String, String, i64, DateTime<Utc>, DateTime<Utc>),
) -> Result<LibrarySectionRecord> {
    Ok(LibrarySectionRecord {
        id: row.0,
        uuid: str_to_uuid(&row.1)?,
        name: row.2,
        section_type: row.3,
        settings: serde_json::from_str(&row.4)?,
        requires_full_rescan: row.5 != 0,
        created_at: row.6,
        updated_at: row.7,
    })
}

const SECTION_COLUMNS: &str =
    "id, uuid, name, section_type, settings_json, requires_full_rescan, created_at, updated_at";

pub struct CreateLibrarySection {
    pub name: String,
    pub section_type: String,
    pub settings: JsonValue,
}

#[derive(Debug, Default)]
pub struct UpdateLibrarySection {
    pub name: Option<String>,
    pub settings: Option<JsonValue>,
    pub requires_full_rescan: Option<bool>,
}

pub struct LibrarySectionRepository {
    pool: SqlitePool,
}

impl LibrarySectionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<LibrarySectionRecord>> {
        let rows = sqlx::query_as::<_, (i64, String, String, String, String, i64, DateTime<Utc>, DateTime<Utc>)>(
            &format!("SELECT {SECTION_COLUMNS} FROM library_sections ORDER BY name"),
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(section_from_row).collect()
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<LibrarySectionRecord>> {
        let row = sqlx::query_as::<_, (i64, String, String, String, String, i64, DateTime<Utc>, DateTime<Utc>)>(
            &format!("SELECT {SECTION_COLUMNS} FROM library_sections WHERE id = ?"),
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(section_from_row).transpose()
    }

    pub async fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<LibrarySectionRecord>> {
        let row = sqlx::query_as::<_, (i64, String, String, String, String, i64, DateTime<Utc>, DateTime<Utc>)>(
            &format!("SELECT {SECTION_COLUMNS} FROM library_sections WHERE uuid = ?"),
        )
        .bind(uuid_to_str(uuid))
        .fetch_optional(&self.pool)
        .await?;

        row.map(section_from_row).transpose()
    }

    pub async fn create(&self, input: CreateLibrarySection) -> Result<LibrarySectionRecord> {
        let uuid = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO library_sections (uuid, name, section_type, settings_json) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid_to_str(uuid))
        .bind(&input.name)
        .bind(&input.section_type)
        .bind(input.settings.to_string())
        .execute(&self.pool)
        .await?;

        self.get_by_uuid(uuid)
            .await?
            .ok_or_else(|| anyhow::anyhow!("library section vanished after insert"))
    }

    pub async fn update(&self, id: i64, input: UpdateLibrarySection) -> Result<Option<LibrarySectionRecord>> {
        if let Some(name) = input.name {
            sqlx::query("UPDATE library_sections SET name = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
                .bind(name)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(settings) = input.settings {
            sqlx::query("UPDATE library_sections SET settings_json = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
                .bind(settings.to_string())
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(requires_full_rescan) = input.requires_full_rescan {
            sqlx::query("UPDATE library_sections SET requires_full_rescan = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
                .bind(requires_full_rescan)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }

        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM library_sections WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Section locations
// ============================================================================

#[derive(Debug, Clone)]
pub struct SectionLocationRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub library_section_id: i64,
    pub root_path: String,
    pub watch_depth: i64,
    pub poll_interval_secs: i64,
    pub created_at: DateTime<Utc>,
}

fn location_from_row(row: (i64, String, i64, String, i64, i64, DateTime<Utc>)) -> Result<SectionLocationRecord> {
    Ok(SectionLocationRecord {
        id: row.0,
        uuid: str_to_uuid(&row.1)?,
        library_section_id: row.2,
        root_path: row.3,
        watch_depth: row.4,
        poll_interval_secs: row.5,
        created_at: row.6,
    })
}

const LOCATION_COLUMNS: &str =
    "id, uuid, library_section_id, root_path, watch_depth, poll_interval_secs, created_at";

pub struct CreateSectionLocation {
    pub library_section_id: i64,
    pub root_path: String,
    pub watch_depth: i64,
    pub poll_interval_secs: i64,
}

pub struct SectionLocationRepository {
    pool: SqlitePool,
}

impl SectionLocationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_for_section(&self, library_section_id: i64) -> Result<Vec<SectionLocationRecord>> {
        let rows = sqlx::query_as::<_, (i64, String, i64, String, i64, i64, DateTime<Utc>)>(
            &format!("SELECT {LOCATION_COLUMNS} FROM section_locations WHERE library_section_id = ? ORDER BY root_path"),
        )
        .bind(library_section_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(location_from_row).collect()
    }

    pub async fn list_all(&self) -> Result<Vec<SectionLocationRecord>> {
        let rows = sqlx::query_as::<_, (i64, String, i64, String, i64, i64, DateTime<Utc>)>(
            &format!("SELECT {LOCATION_COLUMNS} FROM section_locations ORDER BY library_section_id"),
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(location_from_row).collect()
    }

    pub async fn create(&self, input: CreateSectionLocation) -> Result<SectionLocationRecord> {
        let uuid = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO section_locations (uuid, library_section_id, root_path, watch_depth, poll_interval_secs) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_str(uuid))
        .bind(input.library_section_id)
        .bind(&input.root_path)
        .bind(input.watch_depth)
        .bind(input.poll_interval_secs)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, (i64, String, i64, String, i64, i64, DateTime<Utc>)>(
            &format!("SELECT {LOCATION_COLUMNS} FROM section_locations WHERE uuid = ?"),
        )
        .bind(uuid_to_str(uuid))
        .fetch_one(&self.pool)
        .await?;

        location_from_row(row)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM section_locations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
