//! Playlist generator persistence (§4.11 Playlist Service).
//!
//! `items_json` is a sparse materialization: only the window around the cursor is realized, the
//! rest of the ordering is rebuilt from `seed_json` on demand (see the playlist service).

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::util::{str_to_uuid, uuid_to_str};

#[derive(Debug, Clone)]
pub struct PlaylistGeneratorRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub playback_session_id: i64,
    pub seed: JsonValue,
    pub cursor_index: i64,
    pub total_count: i64,
    pub shuffle: bool,
    pub repeat: bool,
    pub items: JsonValue,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[allow(clippy::type_complexity)]
fn from_row(
    row: (i64, String, i64, String, i64, i64, i64, i64, String, i64, DateTime<Utc>),
) -> Result<PlaylistGeneratorRecord> {
    Ok(PlaylistGeneratorRecord {
        id: row.0,
        uuid: str_to_uuid(&row.1)?,
        playback_session_id: row.2,
        seed: serde_json::from_str(&row.3)?,
        cursor_index: row.4,
        total_count: row.5,
        shuffle: row.6 != 0,
        repeat: row.7 != 0,
        items: serde_json::from_str(&row.8)?,
        active: row.9 != 0,
        created_at: row.10,
    })
}

const COLUMNS: &str = "id, uuid, playback_session_id, seed_json, cursor_index, total_count, \
     shuffle, repeat, items_json, active, created_at";

pub struct CreatePlaylistGenerator {
    pub playback_session_id: i64,
    pub seed: JsonValue,
    pub total_count: i64,
    pub shuffle: bool,
    pub repeat: bool,
    pub items: JsonValue,
}

pub struct PlaylistGeneratorRepository {
    pool: SqlitePool,
}

impl PlaylistGeneratorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreatePlaylistGenerator) -> Result<PlaylistGeneratorRecord> {
        let uuid = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO playlist_generators (uuid, playback_session_id, seed_json, total_count, shuffle, repeat, items_json)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid_to_str(uuid))
        .bind(input.playback_session_id)
        .bind(input.seed.to_string())
        .bind(input.total_count)
        .bind(input.shuffle)
        .bind(input.repeat)
        .bind(input.items.to_string())
        .execute(&self.pool)
        .await?;

        self.get_by_uuid(uuid)
            .await?
            .ok_or_else(|| anyhow::anyhow!("playlist generator vanished after insert"))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<PlaylistGeneratorRecord>> {
        #[allow(clippy::type_complexity)]
        let row = sqlx::query_as::<_, (i64, String, i64, String, i64, i64, i64, i64, String, i64, DateTime<Utc>)>(
            &format!("SELECT {COLUMNS} FROM playlist_generators WHERE id = ?"),
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).transpose()
    }

    pub async fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<PlaylistGeneratorRecord>> {
        #[allow(clippy::type_complexity)]
        let row = sqlx::query_as::<_, (i64, String, i64, String, i64, i64, i64, i64, String, i64, DateTime<Utc>)>(
            &format!("SELECT {COLUMNS} FROM playlist_generators WHERE uuid = ?"),
        )
        .bind(uuid_to_str(uuid))
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).transpose()
    }

    pub async fn advance_cursor(&self, uuid: Uuid, cursor_index: i64) -> Result<()> {
        sqlx::query("UPDATE playlist_generators SET cursor_index = ? WHERE uuid = ?")
            .bind(cursor_index)
            .bind(uuid_to_str(uuid))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn replace_window(&self, uuid: Uuid, items: &JsonValue) -> Result<()> {
        sqlx::query("UPDATE playlist_generators SET items_json = ? WHERE uuid = ?")
            .bind(items.to_string())
            .bind(uuid_to_str(uuid))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn deactivate(&self, uuid: Uuid) -> Result<()> {
        sqlx::query("UPDATE playlist_generators SET active = 0 WHERE uuid = ?")
            .bind(uuid_to_str(uuid))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
