//! Directory, media item/part, and stream persistence (§3, §4.4 file analyzer output).

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::util::{str_to_uuid, uuid_to_str};

// ============================================================================
// Directories
// ============================================================================

#[derive(Debug, Clone)]
pub struct DirectoryRecord {
    pub id: i64,
    pub section_location_id: i64,
    pub parent_id: Option<i64>,
    pub path: String,
    pub mtime_seen: DateTime<Utc>,
}

fn directory_from_row(row: (i64, i64, Option<i64>, String, DateTime<Utc>)) -> DirectoryRecord {
    DirectoryRecord {
        id: row.0,
        section_location_id: row.1,
        parent_id: row.2,
        path: row.3,
        mtime_seen: row.4,
    }
}

pub struct DirectoryRepository {
    pool: SqlitePool,
}

impl DirectoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_path(&self, section_location_id: i64, path: &str) -> Result<Option<DirectoryRecord>> {
        let row = sqlx::query_as::<_, (i64, i64, Option<i64>, String, DateTime<Utc>)>(
            "SELECT id, section_location_id, parent_id, path, mtime_seen FROM directories WHERE section_location_id = ? AND path = ?",
        )
        .bind(section_location_id)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(directory_from_row))
    }

    /// Insert or refresh `mtime_seen` for a discovered directory (§4.4 discovery stage).
    pub async fn upsert(
        &self,
        section_location_id: i64,
        parent_id: Option<i64>,
        path: &str,
        mtime_seen: DateTime<Utc>,
    ) -> Result<DirectoryRecord> {
        sqlx::query(
            r#"
            INSERT INTO directories (section_location_id, parent_id, path, mtime_seen)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (section_location_id, path) DO UPDATE SET
                mtime_seen = excluded.mtime_seen,
                parent_id = excluded.parent_id
            "#,
        )
        .bind(section_location_id)
        .bind(parent_id)
        .bind(path)
        .bind(mtime_seen)
        .execute(&self.pool)
        .await?;

        self.get_by_path(section_location_id, path)
            .await?
            .ok_or_else(|| anyhow::anyhow!("directory vanished after upsert"))
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM directories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Media items
// ============================================================================

#[derive(Debug, Clone)]
pub struct MediaItemRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub metadata_item_id: i64,
    pub container: Option<String>,
    pub bitrate: Option<i64>,
    pub duration_ms: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub is_hdr: bool,
    pub rotation: i64,
}

fn media_item_from_row(
    row: (i64, String, i64, Option<String>, Option<i64>, Option<i64>, Option<i64>, Option<i64>, i64, i64),
) -> Result<MediaItemRecord> {
    Ok(MediaItemRecord {
        id: row.0,
        uuid: str_to_uuid(&row.1)?,
        metadata_item_id: row.2,
        container: row.3,
        bitrate: row.4,
        duration_ms: row.5,
        width: row.6,
        height: row.7,
        is_hdr: row.8 != 0,
        rotation: row.9,
    })
}

const MEDIA_ITEM_COLUMNS: &str =
    "id, uuid, metadata_item_id, container, bitrate, duration_ms, width, height, is_hdr, rotation";

#[derive(Debug, Default)]
pub struct CreateMediaItem {
    pub metadata_item_id: i64,
    pub container: Option<String>,
    pub bitrate: Option<i64>,
    pub duration_ms: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub is_hdr: bool,
    pub rotation: i64,
}

pub struct MediaItemRepository {
    pool: SqlitePool,
}

impl MediaItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<MediaItemRecord>> {
        #[allow(clippy::type_complexity)]
        let row = sqlx::query_as::<_, (i64, String, i64, Option<String>, Option<i64>, Option<i64>, Option<i64>, Option<i64>, i64, i64)>(
            &format!("SELECT {MEDIA_ITEM_COLUMNS} FROM media_items WHERE id = ?"),
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(media_item_from_row).transpose()
    }

    pub async fn list_for_metadata_item(&self, metadata_item_id: i64) -> Result<Vec<MediaItemRecord>> {
        #[allow(clippy::type_complexity)]
        let rows = sqlx::query_as::<_, (i64, String, i64, Option<String>, Option<i64>, Option<i64>, Option<i64>, Option<i64>, i64, i64)>(
            &format!("SELECT {MEDIA_ITEM_COLUMNS} FROM media_items WHERE metadata_item_id = ?"),
        )
        .bind(metadata_item_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(media_item_from_row).collect()
    }

    pub async fn create(&self, input: CreateMediaItem) -> Result<MediaItemRecord> {
        let uuid = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO media_items (uuid, metadata_item_id, container, bitrate, duration_ms, width, height, is_hdr, rotation)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid_to_str(uuid))
        .bind(input.metadata_item_id)
        .bind(&input.container)
        .bind(input.bitrate)
        .bind(input.duration_ms)
        .bind(input.width)
        .bind(input.height)
        .bind(input.is_hdr)
        .bind(input.rotation)
        .execute(&self.pool)
        .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM media_items WHERE uuid = ?")
            .bind(uuid_to_str(uuid))
            .fetch_one(&self.pool)
            .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("media item vanished after insert"))
    }

    /// Folds file-analyzer output (container, bitrate, duration, dimensions, HDR, rotation) up
    /// from the primary part, overwriting what's there — these are technical facts about the
    /// file, not user-editable metadata, so there is no lock to respect here.
    pub async fn update_technical(
        &self,
        id: i64,
        container: Option<&str>,
        bitrate: Option<i64>,
        duration_ms: Option<i64>,
        width: Option<i64>,
        height: Option<i64>,
        is_hdr: bool,
        rotation: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE media_items SET container = ?, bitrate = ?, duration_ms = ?, width = ?, height = ?, is_hdr = ?, rotation = ? WHERE id = ?",
        )
        .bind(container)
        .bind(bitrate)
        .bind(duration_ms)
        .bind(width)
        .bind(height)
        .bind(is_hdr)
        .bind(rotation)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Media parts
// ============================================================================

#[derive(Debug, Clone)]
pub struct MediaPartRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub media_item_id: i64,
    pub directory_id: Option<i64>,
    pub library_section_id: i64,
    pub part_index: i64,
    pub absolute_path: String,
    pub size_bytes: i64,
    pub mtime_seen: DateTime<Utc>,
    pub missing_since: Option<DateTime<Utc>>,
}

#[allow(clippy::type_complexity)]
fn media_part_from_row(
    row: (
        i64,
        String,
        i64,
        Option<i64>,
        i64,
        i64,
        String,
        i64,
        DateTime<Utc>,
        Option<DateTime<Utc>>,
    ),
) -> Result<MediaPartRecord> {
    Ok(MediaPartRecord {
        id: row.0,
        uuid: str_to_uuid(&row.1)?,
        media_item_id: row.2,
        directory_id: row.3,
        library_section_id: row.4,
        part_index: row.5,
        absolute_path: row.6,
        size_bytes: row.7,
        mtime_seen: row.8,
        missing_since: row.9,
    })
}

const MEDIA_PART_COLUMNS: &str = "id, uuid, media_item_id, directory_id, library_section_id, \
     part_index, absolute_path, size_bytes, mtime_seen, missing_since";

#[derive(Debug)]
pub struct CreateMediaPart {
    pub media_item_id: i64,
    pub directory_id: Option<i64>,
    pub library_section_id: i64,
    pub part_index: i64,
    pub absolute_path: String,
    pub size_bytes: i64,
    pub mtime_seen: DateTime<Utc>,
}

pub struct MediaPartRepository {
    pool: SqlitePool,
}

impl MediaPartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<MediaPartRecord>> {
        #[allow(clippy::type_complexity)]
        let row = sqlx::query_as::<_, (i64, String, i64, Option<i64>, i64, i64, String, i64, DateTime<Utc>, Option<DateTime<Utc>>)>(
            &format!("SELECT {MEDIA_PART_COLUMNS} FROM media_parts WHERE id = ?"),
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(media_part_from_row).transpose()
    }

    pub async fn get_by_path(&self, library_section_id: i64, absolute_path: &str) -> Result<Option<MediaPartRecord>> {
        #[allow(clippy::type_complexity)]
        let row = sqlx::query_as::<_, (i64, String, i64, Option<i64>, i64, i64, String, i64, DateTime<Utc>, Option<DateTime<Utc>>)>(
            &format!("SELECT {MEDIA_PART_COLUMNS} FROM media_parts WHERE library_section_id = ? AND absolute_path = ?"),
        )
        .bind(library_section_id)
        .bind(absolute_path)
        .fetch_optional(&self.pool)
        .await?;

        row.map(media_part_from_row).transpose()
    }

    pub async fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<MediaPartRecord>> {
        #[allow(clippy::type_complexity)]
        let row = sqlx::query_as::<_, (i64, String, i64, Option<i64>, i64, i64, String, i64, DateTime<Utc>, Option<DateTime<Utc>>)>(
            &format!("SELECT {MEDIA_PART_COLUMNS} FROM media_parts WHERE uuid = ?"),
        )
        .bind(uuid_to_str(uuid))
        .fetch_optional(&self.pool)
        .await?;

        row.map(media_part_from_row).transpose()
    }

    pub async fn create(&self, input: CreateMediaPart) -> Result<MediaPartRecord> {
        let uuid = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO media_parts (
                uuid, media_item_id, directory_id, library_section_id, part_index,
                absolute_path, size_bytes, mtime_seen
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid_to_str(uuid))
        .bind(input.media_item_id)
        .bind(input.directory_id)
        .bind(input.library_section_id)
        .bind(input.part_index)
        .bind(&input.absolute_path)
        .bind(input.size_bytes)
        .bind(input.mtime_seen)
        .execute(&self.pool)
        .await?;

        self.get_by_path(input.library_section_id, &input.absolute_path)
            .await?
            .ok_or_else(|| anyhow::anyhow!("media part vanished after insert"))
    }

    /// All parts belonging to one media item, in part order (multi-part files).
    pub async fn list_for_media_item(&self, media_item_id: i64) -> Result<Vec<MediaPartRecord>> {
        #[allow(clippy::type_complexity)]
        let rows = sqlx::query_as::<_, (i64, String, i64, Option<i64>, i64, i64, String, i64, DateTime<Utc>, Option<DateTime<Utc>>)>(
            &format!("SELECT {MEDIA_PART_COLUMNS} FROM media_parts WHERE media_item_id = ? ORDER BY part_index"),
        )
        .bind(media_item_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(media_part_from_row).collect()
    }

    /// Mark a part missing (watcher saw its file disappear) or clear that mark if it reappeared.
    pub async fn set_missing_since(&self, id: i64, missing_since: Option<DateTime<Utc>>) -> Result<()> {
        sqlx::query("UPDATE media_parts SET missing_since = ? WHERE id = ?")
            .bind(missing_since)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn touch_mtime(&self, id: i64, mtime_seen: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE media_parts SET mtime_seen = ? WHERE id = ?")
            .bind(mtime_seen)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All parts whose path falls under `root_prefix`, used by discovery to diff the walked tree
    /// against what's tracked and emit `Missing` events for anything not re-observed.
    pub async fn list_under_root(&self, library_section_id: i64, root_prefix: &str) -> Result<Vec<MediaPartRecord>> {
        let pattern = format!("{root_prefix}%");
        #[allow(clippy::type_complexity)]
        let rows = sqlx::query_as::<_, (i64, String, i64, Option<i64>, i64, i64, String, i64, DateTime<Utc>, Option<DateTime<Utc>>)>(
            &format!("SELECT {MEDIA_PART_COLUMNS} FROM media_parts WHERE library_section_id = ? AND absolute_path LIKE ?"),
        )
        .bind(library_section_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(media_part_from_row).collect()
    }

    /// Parts missing since before `cutoff`, candidates for the sweep that removes them outright
    /// (§4.5 watcher: a grace period before a vanished file is treated as deleted).
    pub async fn list_missing_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<MediaPartRecord>> {
        #[allow(clippy::type_complexity)]
        let rows = sqlx::query_as::<_, (i64, String, i64, Option<i64>, i64, i64, String, i64, DateTime<Utc>, Option<DateTime<Utc>>)>(
            &format!("SELECT {MEDIA_PART_COLUMNS} FROM media_parts WHERE missing_since IS NOT NULL AND missing_since < ?"),
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(media_part_from_row).collect()
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media_parts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Streams
// ============================================================================

#[derive(Debug, Clone)]
pub struct VideoStreamRecord {
    pub id: i64,
    pub media_part_id: i64,
    pub stream_index: i64,
    pub codec: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub bitrate: Option<i64>,
    pub is_hdr: bool,
}

#[derive(Debug, Clone)]
pub struct AudioStreamRecord {
    pub id: i64,
    pub media_part_id: i64,
    pub stream_index: i64,
    pub codec: String,
    pub channels: i64,
    pub language: Option<String>,
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub struct SubtitleStreamRecord {
    pub id: i64,
    pub media_part_id: i64,
    pub stream_index: Option<i64>,
    pub codec: String,
    pub language: Option<String>,
    pub is_sidecar: bool,
    pub sidecar_path: Option<String>,
    pub forced: bool,
}

#[derive(Debug)]
pub struct CreateVideoStream {
    pub media_part_id: i64,
    pub stream_index: i64,
    pub codec: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub bitrate: Option<i64>,
    pub is_hdr: bool,
}

#[derive(Debug)]
pub struct CreateAudioStream {
    pub media_part_id: i64,
    pub stream_index: i64,
    pub codec: String,
    pub channels: i64,
    pub language: Option<String>,
    pub is_default: bool,
}

#[derive(Debug)]
pub struct CreateSubtitleStream {
    pub media_part_id: i64,
    pub stream_index: Option<i64>,
    pub codec: String,
    pub language: Option<String>,
    pub is_sidecar: bool,
    pub sidecar_path: Option<String>,
    pub forced: bool,
}

pub struct StreamRepository {
    pool: SqlitePool,
}

impl StreamRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add_video(&self, input: CreateVideoStream) -> Result<()> {
        sqlx::query(
            "INSERT INTO video_streams (media_part_id, stream_index, codec, width, height, bitrate, is_hdr) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(input.media_part_id)
        .bind(input.stream_index)
        .bind(&input.codec)
        .bind(input.width)
        .bind(input.height)
        .bind(input.bitrate)
        .bind(input.is_hdr)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_audio(&self, input: CreateAudioStream) -> Result<()> {
        sqlx::query(
            "INSERT INTO audio_streams (media_part_id, stream_index, codec, channels, language, is_default) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(input.media_part_id)
        .bind(input.stream_index)
        .bind(&input.codec)
        .bind(input.channels)
        .bind(&input.language)
        .bind(input.is_default)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_subtitle(&self, input: CreateSubtitleStream) -> Result<()> {
        sqlx::query(
            "INSERT INTO subtitle_streams (media_part_id, stream_index, codec, language, is_sidecar, sidecar_path, forced) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(input.media_part_id)
        .bind(input.stream_index)
        .bind(&input.codec)
        .bind(&input.language)
        .bind(input.is_sidecar)
        .bind(&input.sidecar_path)
        .bind(input.forced)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_video(&self, media_part_id: i64) -> Result<Vec<VideoStreamRecord>> {
        let rows = sqlx::query_as::<_, (i64, i64, i64, String, Option<i64>, Option<i64>, Option<i64>, i64)>(
            "SELECT id, media_part_id, stream_index, codec, width, height, bitrate, is_hdr FROM video_streams WHERE media_part_id = ? ORDER BY stream_index",
        )
        .bind(media_part_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| VideoStreamRecord {
                id: r.0,
                media_part_id: r.1,
                stream_index: r.2,
                codec: r.3,
                width: r.4,
                height: r.5,
                bitrate: r.6,
                is_hdr: r.7 != 0,
            })
            .collect())
    }

    pub async fn list_audio(&self, media_part_id: i64) -> Result<Vec<AudioStreamRecord>> {
        let rows = sqlx::query_as::<_, (i64, i64, i64, String, i64, Option<String>, i64)>(
            "SELECT id, media_part_id, stream_index, codec, channels, language, is_default FROM audio_streams WHERE media_part_id = ? ORDER BY stream_index",
        )
        .bind(media_part_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| AudioStreamRecord {
                id: r.0,
                media_part_id: r.1,
                stream_index: r.2,
                codec: r.3,
                channels: r.4,
                language: r.5,
                is_default: r.6 != 0,
            })
            .collect())
    }

    pub async fn list_subtitles(&self, media_part_id: i64) -> Result<Vec<SubtitleStreamRecord>> {
        let rows = sqlx::query_as::<_, (i64, i64, Option<i64>, String, Option<String>, i64, Option<String>, i64)>(
            "SELECT id, media_part_id, stream_index, codec, language, is_sidecar, sidecar_path, forced FROM subtitle_streams WHERE media_part_id = ?",
        )
        .bind(media_part_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| SubtitleStreamRecord {
                id: r.0,
                media_part_id: r.1,
                stream_index: r.2,
                codec: r.3,
                language: r.4,
                is_sidecar: r.5 != 0,
                sidecar_path: r.6,
                forced: r.7 != 0,
            })
            .collect())
    }

    pub async fn clear_for_part(&self, media_part_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM video_streams WHERE media_part_id = ?")
            .bind(media_part_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM audio_streams WHERE media_part_id = ?")
            .bind(media_part_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM subtitle_streams WHERE media_part_id = ?")
            .bind(media_part_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
