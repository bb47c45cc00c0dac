//! Metadata item and relation persistence (§3 MetadataItem/MetadataRelation).
//!
//! `metadata_items` is the tree every library entity (movie, show, season, episode, album,
//! track, person, collection, ...) lives in; `parent_id` links a child to its container.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::util::{str_to_uuid, uuid_to_str};

#[derive(Debug, Clone)]
pub struct MetadataItemRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub library_section_id: i64,
    pub parent_id: Option<i64>,
    pub metadata_type: String,
    pub title: String,
    pub original_title: Option<String>,
    pub sort_title: Option<String>,
    pub year: Option<i64>,
    pub release_date: Option<String>,
    pub summary: Option<String>,
    pub tagline: Option<String>,
    pub studio: Option<String>,
    pub content_rating: Option<String>,
    pub duration_ms: Option<i64>,
    pub view_count: i64,
    pub view_offset: i64,
    pub thumb_uri: Option<String>,
    pub thumb_hash: Option<String>,
    pub art_uri: Option<String>,
    pub art_hash: Option<String>,
    pub is_promoted: bool,
    pub external_ids: JsonValue,
    pub locked_fields: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[allow(clippy::type_complexity)]
type MetadataRow = (
    i64,
    String,
    i64,
    Option<i64>,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    i64,
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    i64,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn metadata_from_row(row: MetadataRow) -> Result<MetadataItemRecord> {
    Ok(MetadataItemRecord {
        id: row.0,
        uuid: str_to_uuid(&row.1)?,
        library_section_id: row.2,
        parent_id: row.3,
        metadata_type: row.4,
        title: row.5,
        original_title: row.6,
        sort_title: row.7,
        year: row.8,
        release_date: row.9,
        summary: row.10,
        tagline: row.11,
        studio: row.12,
        content_rating: row.13,
        duration_ms: row.14,
        view_count: row.15,
        view_offset: row.16,
        thumb_uri: row.17,
        thumb_hash: row.18,
        art_uri: row.19,
        art_hash: row.20,
        is_promoted: row.21 != 0,
        external_ids: serde_json::from_str(&row.22)?,
        locked_fields: serde_json::from_str(&row.23)?,
        created_at: row.24,
        updated_at: row.25,
    })
}

const METADATA_COLUMNS: &str = "id, uuid, library_section_id, parent_id, metadata_type, title, \
     original_title, sort_title, year, release_date, summary, tagline, studio, content_rating, \
     duration_ms, view_count, view_offset, thumb_uri, thumb_hash, art_uri, art_hash, is_promoted, \
     external_ids_json, locked_fields_json, created_at, updated_at";

#[derive(Debug, Default)]
pub struct CreateMetadataItem {
    pub library_section_id: i64,
    pub parent_id: Option<i64>,
    pub metadata_type: String,
    pub title: String,
    pub original_title: Option<String>,
    pub sort_title: Option<String>,
    pub year: Option<i64>,
    pub release_date: Option<String>,
    pub summary: Option<String>,
    pub tagline: Option<String>,
    pub studio: Option<String>,
    pub content_rating: Option<String>,
    pub duration_ms: Option<i64>,
    pub external_ids: JsonValue,
}

pub struct MetadataItemRepository {
    pool: SqlitePool,
}

impl MetadataItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<MetadataItemRecord>> {
        let row = sqlx::query_as::<_, MetadataRow>(
            &format!("SELECT {METADATA_COLUMNS} FROM metadata_items WHERE id = ?"),
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(metadata_from_row).transpose()
    }

    pub async fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<MetadataItemRecord>> {
        let row = sqlx::query_as::<_, MetadataRow>(
            &format!("SELECT {METADATA_COLUMNS} FROM metadata_items WHERE uuid = ?"),
        )
        .bind(uuid_to_str(uuid))
        .fetch_optional(&self.pool)
        .await?;

        row.map(metadata_from_row).transpose()
    }

    pub async fn list_children(&self, parent_id: i64) -> Result<Vec<MetadataItemRecord>> {
        let rows = sqlx::query_as::<_, MetadataRow>(
            &format!("SELECT {METADATA_COLUMNS} FROM metadata_items WHERE parent_id = ? ORDER BY sort_title, title"),
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(metadata_from_row).collect()
    }

    /// Top-level items in a section (no parent): movies, shows, artists, collections.
    pub async fn list_roots(&self, library_section_id: i64, metadata_type: &str) -> Result<Vec<MetadataItemRecord>> {
        let rows = sqlx::query_as::<_, MetadataRow>(
            &format!("SELECT {METADATA_COLUMNS} FROM metadata_items WHERE library_section_id = ? AND metadata_type = ? AND parent_id IS NULL ORDER BY sort_title, title"),
        )
        .bind(library_section_id)
        .bind(metadata_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(metadata_from_row).collect()
    }

    /// Most recently created items of `metadata_type` in a section, for the RecentlyAdded hub.
    pub async fn list_recently_added(
        &self,
        library_section_id: i64,
        metadata_type: &str,
        limit: i64,
    ) -> Result<Vec<MetadataItemRecord>> {
        let rows = sqlx::query_as::<_, MetadataRow>(&format!(
            "SELECT {METADATA_COLUMNS} FROM metadata_items WHERE library_section_id = ? AND \
             metadata_type = ? ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(library_section_id)
        .bind(metadata_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(metadata_from_row).collect()
    }

    /// Items with a nonzero resume position, most recently touched first — ContinueWatching hub.
    pub async fn list_continue_watching(
        &self,
        library_section_id: i64,
        metadata_type: &str,
        limit: i64,
    ) -> Result<Vec<MetadataItemRecord>> {
        let rows = sqlx::query_as::<_, MetadataRow>(&format!(
            "SELECT {METADATA_COLUMNS} FROM metadata_items WHERE library_section_id = ? AND \
             metadata_type = ? AND view_offset > 0 ORDER BY updated_at DESC LIMIT ?"
        ))
        .bind(library_section_id)
        .bind(metadata_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(metadata_from_row).collect()
    }

    /// Admin-promoted items of `metadata_type` in a section — Promoted hub.
    pub async fn list_promoted(
        &self,
        library_section_id: i64,
        metadata_type: &str,
        limit: i64,
    ) -> Result<Vec<MetadataItemRecord>> {
        let rows = sqlx::query_as::<_, MetadataRow>(&format!(
            "SELECT {METADATA_COLUMNS} FROM metadata_items WHERE library_section_id = ? AND \
             metadata_type = ? AND is_promoted = 1 ORDER BY sort_title, title LIMIT ?"
        ))
        .bind(library_section_id)
        .bind(metadata_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(metadata_from_row).collect()
    }

    /// Find an existing item under `parent_id` by external id match (resolver dedup path), or by
    /// exact title+year if no external id is known yet.
    pub async fn find_by_external_id(&self, library_section_id: i64, provider: &str, external_id: &str) -> Result<Option<MetadataItemRecord>> {
        let pattern = format!("%\"{provider}\":\"{external_id}\"%");
        let row = sqlx::query_as::<_, MetadataRow>(
            &format!("SELECT {METADATA_COLUMNS} FROM metadata_items WHERE library_section_id = ? AND external_ids_json LIKE ? LIMIT 1"),
        )
        .bind(library_section_id)
        .bind(pattern)
        .fetch_optional(&self.pool)
        .await?;

        row.map(metadata_from_row).transpose()
    }

    pub async fn create(&self, input: CreateMetadataItem) -> Result<MetadataItemRecord> {
        let uuid = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO metadata_items (
                uuid, library_section_id, parent_id, metadata_type, title, original_title,
                sort_title, year, release_date, summary, tagline, studio, content_rating,
                duration_ms, external_ids_json
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid_to_str(uuid))
        .bind(input.library_section_id)
        .bind(input.parent_id)
        .bind(&input.metadata_type)
        .bind(&input.title)
        .bind(&input.original_title)
        .bind(&input.sort_title)
        .bind(input.year)
        .bind(&input.release_date)
        .bind(&input.summary)
        .bind(&input.tagline)
        .bind(&input.studio)
        .bind(&input.content_rating)
        .bind(input.duration_ms)
        .bind(input.external_ids.to_string())
        .execute(&self.pool)
        .await?;

        self.get_by_uuid(uuid)
            .await?
            .ok_or_else(|| anyhow::anyhow!("metadata item vanished after insert"))
    }

    /// Merge a refreshed agent payload into an existing item, respecting `locked_fields` (§4.6
    /// refresh orchestrator must never overwrite a field the user has locked).
    pub async fn apply_refresh(
        &self,
        id: i64,
        summary: Option<&str>,
        tagline: Option<&str>,
        content_rating: Option<&str>,
        external_ids: &JsonValue,
    ) -> Result<()> {
        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("metadata item {id} not found"))?;

        let locked: std::collections::HashSet<&str> =
            existing.locked_fields.iter().map(String::as_str).collect();

        let summary = if locked.contains("summary") { None } else { summary };
        let tagline = if locked.contains("tagline") { None } else { tagline };
        let content_rating = if locked.contains("content_rating") { None } else { content_rating };

        sqlx::query(
            r#"
            UPDATE metadata_items SET
                summary = COALESCE(?, summary),
                tagline = COALESCE(?, tagline),
                content_rating = COALESCE(?, content_rating),
                external_ids_json = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(summary)
        .bind(tagline)
        .bind(content_rating)
        .bind(external_ids.to_string())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persists the image orchestrator's winning poster candidate.
    pub async fn set_thumb(&self, id: i64, thumb_uri: &str, thumb_hash: &str) -> Result<()> {
        sqlx::query("UPDATE metadata_items SET thumb_uri = ?, thumb_hash = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(thumb_uri)
            .bind(thumb_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Persists the image orchestrator's winning backdrop candidate.
    pub async fn set_art(&self, id: i64, art_uri: &str, art_hash: &str) -> Result<()> {
        sqlx::query("UPDATE metadata_items SET art_uri = ?, art_hash = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(art_uri)
            .bind(art_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_view_offset(&self, id: i64, view_offset: i64) -> Result<()> {
        sqlx::query("UPDATE metadata_items SET view_offset = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(view_offset)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn increment_view_count(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE metadata_items SET view_count = view_count + 1, view_offset = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_promoted(&self, id: i64, promoted: bool) -> Result<()> {
        sqlx::query("UPDATE metadata_items SET is_promoted = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(promoted)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn lock_field(&self, id: i64, field: &str) -> Result<()> {
        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("metadata item {id} not found"))?;

        let mut locked = existing.locked_fields;
        if !locked.iter().any(|f| f == field) {
            locked.push(field.to_string());
        }

        sqlx::query("UPDATE metadata_items SET locked_fields_json = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(serde_json::to_string(&locked)?)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM metadata_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Metadata relations (cast/crew/collection membership)
// ============================================================================

#[derive(Debug, Clone)]
pub struct MetadataRelationRecord {
    pub id: i64,
    pub from_item_id: i64,
    pub to_item_id: i64,
    pub relation_type: String,
    pub ordering: i64,
    pub role: Option<String>,
}

fn relation_from_row(row: (i64, i64, i64, String, i64, Option<String>)) -> MetadataRelationRecord {
    MetadataRelationRecord {
        id: row.0,
        from_item_id: row.1,
        to_item_id: row.2,
        relation_type: row.3,
        ordering: row.4,
        role: row.5,
    }
}

pub struct MetadataRelationRepository {
    pool: SqlitePool,
}

impl MetadataRelationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add(
        &self,
        from_item_id: i64,
        to_item_id: i64,
        relation_type: &str,
        ordering: i64,
        role: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metadata_relations (from_item_id, to_item_id, relation_type, ordering, role)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (from_item_id, to_item_id, relation_type) DO UPDATE SET
                ordering = excluded.ordering,
                role = excluded.role
            "#,
        )
        .bind(from_item_id)
        .bind(to_item_id)
        .bind(relation_type)
        .bind(ordering)
        .bind(role)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_from(&self, from_item_id: i64, relation_type: &str) -> Result<Vec<MetadataRelationRecord>> {
        let rows = sqlx::query_as::<_, (i64, i64, i64, String, i64, Option<String>)>(
            "SELECT id, from_item_id, to_item_id, relation_type, ordering, role FROM metadata_relations \
             WHERE from_item_id = ? AND relation_type = ? ORDER BY ordering",
        )
        .bind(from_item_id)
        .bind(relation_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(relation_from_row).collect())
    }

    /// Items pointing *at* `to_item_id` under `relation_type` — e.g. all movies tagged with a
    /// given Genre item, the reverse of [`Self::list_from`]'s "this movie's genres".
    pub async fn list_to(&self, to_item_id: i64, relation_type: &str) -> Result<Vec<MetadataRelationRecord>> {
        let rows = sqlx::query_as::<_, (i64, i64, i64, String, i64, Option<String>)>(
            "SELECT id, from_item_id, to_item_id, relation_type, ordering, role FROM metadata_relations \
             WHERE to_item_id = ? AND relation_type = ? ORDER BY ordering",
        )
        .bind(to_item_id)
        .bind(relation_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(relation_from_row).collect())
    }

    pub async fn remove(&self, from_item_id: i64, to_item_id: i64, relation_type: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM metadata_relations WHERE from_item_id = ? AND to_item_id = ? AND relation_type = ?",
        )
        .bind(from_item_id)
        .bind(to_item_id)
        .bind(relation_type)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
