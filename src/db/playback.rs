//! Playback session, capability profile, and transcode job persistence (§4.10, §4.9).

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::util::{str_to_uuid, uuid_to_str};

// ============================================================================
// Playback sessions
// ============================================================================

#[derive(Debug, Clone)]
pub struct PlaybackSessionRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub user_id: i64,
    pub item_id: i64,
    pub capability_profile_version: i64,
    pub stream_plan: JsonValue,
    pub playlist_generator_id: Option<i64>,
    pub playhead_ms: i64,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
}

#[allow(clippy::type_complexity)]
fn session_from_row(
    row: (
        i64,
        String,
        i64,
        i64,
        i64,
        String,
        Option<i64>,
        i64,
        String,
        DateTime<Utc>,
        DateTime<Utc>,
    ),
) -> Result<PlaybackSessionRecord> {
    Ok(PlaybackSessionRecord {
        id: row.0,
        uuid: str_to_uuid(&row.1)?,
        user_id: row.2,
        item_id: row.3,
        capability_profile_version: row.4,
        stream_plan: serde_json::from_str(&row.5)?,
        playlist_generator_id: row.6,
        playhead_ms: row.7,
        state: row.8,
        created_at: row.9,
        last_heartbeat_at: row.10,
    })
}

const SESSION_COLUMNS: &str = "id, uuid, user_id, item_id, capability_profile_version, \
     stream_plan_json, playlist_generator_id, playhead_ms, state, created_at, last_heartbeat_at";

pub struct CreatePlaybackSession {
    pub user_id: i64,
    pub item_id: i64,
    pub capability_profile_version: i64,
    pub stream_plan: JsonValue,
}

pub struct PlaybackSessionRepository {
    pool: SqlitePool,
}

impl PlaybackSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreatePlaybackSession) -> Result<PlaybackSessionRecord> {
        let uuid = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO playback_sessions (uuid, user_id, item_id, capability_profile_version, stream_plan_json)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid_to_str(uuid))
        .bind(input.user_id)
        .bind(input.item_id)
        .bind(input.capability_profile_version)
        .bind(input.stream_plan.to_string())
        .execute(&self.pool)
        .await?;

        self.get_by_uuid(uuid)
            .await?
            .ok_or_else(|| anyhow::anyhow!("playback session vanished after insert"))
    }

    pub async fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<PlaybackSessionRecord>> {
        #[allow(clippy::type_complexity)]
        let row = sqlx::query_as::<_, (i64, String, i64, i64, i64, String, Option<i64>, i64, String, DateTime<Utc>, DateTime<Utc>)>(
            &format!("SELECT {SESSION_COLUMNS} FROM playback_sessions WHERE uuid = ?"),
        )
        .bind(uuid_to_str(uuid))
        .fetch_optional(&self.pool)
        .await?;

        row.map(session_from_row).transpose()
    }

    pub async fn heartbeat(&self, uuid: Uuid, playhead_ms: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE playback_sessions SET playhead_ms = ?, last_heartbeat_at = CURRENT_TIMESTAMP WHERE uuid = ?",
        )
        .bind(playhead_ms)
        .bind(uuid_to_str(uuid))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_state(&self, uuid: Uuid, state: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE playback_sessions SET state = ? WHERE uuid = ?")
            .bind(state)
            .bind(uuid_to_str(uuid))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn attach_playlist(&self, uuid: Uuid, playlist_generator_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE playback_sessions SET playlist_generator_id = ? WHERE uuid = ?",
        )
        .bind(playlist_generator_id)
        .bind(uuid_to_str(uuid))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Sessions whose heartbeat is older than `stale_before` (§4.10 idle-session reaping).
    pub async fn list_stale(&self, stale_before: DateTime<Utc>) -> Result<Vec<PlaybackSessionRecord>> {
        #[allow(clippy::type_complexity)]
        let rows = sqlx::query_as::<_, (i64, String, i64, i64, i64, String, Option<i64>, i64, String, DateTime<Utc>, DateTime<Utc>)>(
            &format!("SELECT {SESSION_COLUMNS} FROM playback_sessions WHERE state NOT IN ('Completed', 'Stopped') AND last_heartbeat_at < ?"),
        )
        .bind(stale_before)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(session_from_row).collect()
    }

    pub async fn delete(&self, uuid: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM playback_sessions WHERE uuid = ?")
            .bind(uuid_to_str(uuid))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Capability profiles
// ============================================================================

#[derive(Debug, Clone)]
pub struct CapabilityProfileRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub user_id: i64,
    pub version: i64,
    pub profile: JsonValue,
    pub created_at: DateTime<Utc>,
}

fn capability_from_row(row: (i64, String, i64, i64, String, DateTime<Utc>)) -> Result<CapabilityProfileRecord> {
    Ok(CapabilityProfileRecord {
        id: row.0,
        uuid: str_to_uuid(&row.1)?,
        user_id: row.2,
        version: row.3,
        profile: serde_json::from_str(&row.4)?,
        created_at: row.5,
    })
}

pub struct CapabilityProfileRepository {
    pool: SqlitePool,
}

impl CapabilityProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the next version for this user (versions are append-only so an in-flight
    /// playback session's plan keeps referencing the profile it was built against).
    pub async fn create(&self, user_id: i64, profile: JsonValue) -> Result<CapabilityProfileRecord> {
        let uuid = Uuid::new_v4();
        let version: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM capability_profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query(
            "INSERT INTO capability_profiles (uuid, user_id, version, profile_json) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid_to_str(uuid))
        .bind(user_id)
        .bind(version)
        .bind(profile.to_string())
        .execute(&self.pool)
        .await?;

        self.get_version(user_id, version)
            .await?
            .ok_or_else(|| anyhow::anyhow!("capability profile vanished after insert"))
    }

    pub async fn get_version(&self, user_id: i64, version: i64) -> Result<Option<CapabilityProfileRecord>> {
        let row = sqlx::query_as::<_, (i64, String, i64, i64, String, DateTime<Utc>)>(
            "SELECT id, uuid, user_id, version, profile_json, created_at FROM capability_profiles WHERE user_id = ? AND version = ?",
        )
        .bind(user_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        row.map(capability_from_row).transpose()
    }

    pub async fn get_latest(&self, user_id: i64) -> Result<Option<CapabilityProfileRecord>> {
        let row = sqlx::query_as::<_, (i64, String, i64, i64, String, DateTime<Utc>)>(
            "SELECT id, uuid, user_id, version, profile_json, created_at FROM capability_profiles \
             WHERE user_id = ? ORDER BY version DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(capability_from_row).transpose()
    }
}

// ============================================================================
// Transcode jobs
// ============================================================================

#[derive(Debug, Clone)]
pub struct TranscodeJobRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub playback_session_id: i64,
    pub media_part_id: i64,
    pub protocol: String,
    pub output_path: String,
    pub pid: Option<i64>,
    pub state: String,
    pub progress_pct: f64,
    pub segment_length_s: i64,
    pub start_time_ms: i64,
    pub segment_prefix: String,
    pub segment_extension: String,
    pub last_ping_at: DateTime<Utc>,
    pub last_segment_index: i64,
    pub created_at: DateTime<Utc>,
}

#[allow(clippy::type_complexity)]
fn transcode_from_row(
    row: (
        i64,
        String,
        i64,
        i64,
        String,
        String,
        Option<i64>,
        String,
        f64,
        i64,
        i64,
        String,
        String,
        DateTime<Utc>,
        i64,
        DateTime<Utc>,
    ),
) -> Result<TranscodeJobRecord> {
    Ok(TranscodeJobRecord {
        id: row.0,
        uuid: str_to_uuid(&row.1)?,
        playback_session_id: row.2,
        media_part_id: row.3,
        protocol: row.4,
        output_path: row.5,
        pid: row.6,
        state: row.7,
        progress_pct: row.8,
        segment_length_s: row.9,
        start_time_ms: row.10,
        segment_prefix: row.11,
        segment_extension: row.12,
        last_ping_at: row.13,
        last_segment_index: row.14,
        created_at: row.15,
    })
}

const TRANSCODE_COLUMNS: &str = "id, uuid, playback_session_id, media_part_id, protocol, output_path, \
     pid, state, progress_pct, segment_length_s, start_time_ms, segment_prefix, segment_extension, \
     last_ping_at, last_segment_index, created_at";

pub struct CreateTranscodeJob {
    pub playback_session_id: i64,
    pub media_part_id: i64,
    pub protocol: String,
    pub output_path: String,
    pub segment_length_s: i64,
    pub start_time_ms: i64,
}

pub struct TranscodeJobRepository {
    pool: SqlitePool,
}

impl TranscodeJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreateTranscodeJob) -> Result<TranscodeJobRecord> {
        let uuid = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO transcode_jobs (
                uuid, playback_session_id, media_part_id, protocol, output_path,
                segment_length_s, start_time_ms
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid_to_str(uuid))
        .bind(input.playback_session_id)
        .bind(input.media_part_id)
        .bind(&input.protocol)
        .bind(&input.output_path)
        .bind(input.segment_length_s)
        .bind(input.start_time_ms)
        .execute(&self.pool)
        .await?;

        self.get_by_uuid(uuid)
            .await?
            .ok_or_else(|| anyhow::anyhow!("transcode job vanished after insert"))
    }

    pub async fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<TranscodeJobRecord>> {
        #[allow(clippy::type_complexity)]
        let row = sqlx::query_as::<_, (i64, String, i64, i64, String, String, Option<i64>, String, f64, i64, i64, String, String, DateTime<Utc>, i64, DateTime<Utc>)>(
            &format!("SELECT {TRANSCODE_COLUMNS} FROM transcode_jobs WHERE uuid = ?"),
        )
        .bind(uuid_to_str(uuid))
        .fetch_optional(&self.pool)
        .await?;

        row.map(transcode_from_row).transpose()
    }

    pub async fn list_for_session(&self, playback_session_id: i64) -> Result<Vec<TranscodeJobRecord>> {
        #[allow(clippy::type_complexity)]
        let rows = sqlx::query_as::<_, (i64, String, i64, i64, String, String, Option<i64>, String, f64, i64, i64, String, String, DateTime<Utc>, i64, DateTime<Utc>)>(
            &format!("SELECT {TRANSCODE_COLUMNS} FROM transcode_jobs WHERE playback_session_id = ? ORDER BY created_at"),
        )
        .bind(playback_session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transcode_from_row).collect()
    }

    /// Count of jobs not yet terminal, for the transcode manager's `CanStartNewJob` throttle.
    pub async fn count_active(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transcode_jobs WHERE state IN ('Queued', 'Starting', 'Running')",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// All non-terminal jobs with a recorded pid, for `CleanupStaleJobs` at startup.
    pub async fn list_active(&self) -> Result<Vec<TranscodeJobRecord>> {
        #[allow(clippy::type_complexity)]
        let rows = sqlx::query_as::<_, (i64, String, i64, i64, String, String, Option<i64>, String, f64, i64, i64, String, String, DateTime<Utc>, i64, DateTime<Utc>)>(
            &format!("SELECT {TRANSCODE_COLUMNS} FROM transcode_jobs WHERE state IN ('Queued', 'Starting', 'Running')"),
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transcode_from_row).collect()
    }

    pub async fn set_pid(&self, uuid: Uuid, pid: i64) -> Result<()> {
        sqlx::query("UPDATE transcode_jobs SET pid = ?, state = 'Starting' WHERE uuid = ?")
            .bind(pid)
            .bind(uuid_to_str(uuid))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn advance(
        &self,
        uuid: Uuid,
        state: &str,
        progress_pct: f64,
        last_segment_index: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE transcode_jobs
            SET state = ?, progress_pct = ?, last_segment_index = ?, last_ping_at = CURRENT_TIMESTAMP
            WHERE uuid = ?
            "#,
        )
        .bind(state)
        .bind(progress_pct)
        .bind(last_segment_index)
        .bind(uuid_to_str(uuid))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Jobs with no ping since `stale_before`, for the transcode garbage collector.
    pub async fn list_stale(&self, stale_before: DateTime<Utc>) -> Result<Vec<TranscodeJobRecord>> {
        #[allow(clippy::type_complexity)]
        let rows = sqlx::query_as::<_, (i64, String, i64, i64, String, String, Option<i64>, String, f64, i64, i64, String, String, DateTime<Utc>, i64, DateTime<Utc>)>(
            &format!("SELECT {TRANSCODE_COLUMNS} FROM transcode_jobs WHERE state IN ('Running', 'Starting') AND last_ping_at < ?"),
        )
        .bind(stale_before)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transcode_from_row).collect()
    }

    pub async fn delete(&self, uuid: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transcode_jobs WHERE uuid = ?")
            .bind(uuid_to_str(uuid))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
