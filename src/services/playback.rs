//! Playback orchestrator (§4.8): owns the `StartPlayback` → `Heartbeat`/`Decide`/`Seek` → `Stop`
//! lifecycle of a `PlaybackSession`. Ties together capability matching (against persisted
//! `VideoStreamRecord`/`AudioStreamRecord` technical facts, not a fresh ffprobe pass), the ABR
//! ladder generator (§4.10), the playlist service (§4.11), the transcode job manager (§4.9), and
//! the GoP index's already-keyframe-aware seek (`services/gop_bif.rs`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::media::{AudioStreamRecord, MediaItemRecord, VideoStreamRecord};
use crate::db::playback::CreatePlaybackSession;
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::paths::Paths;
use crate::services::abr::{build_ladder, Rung};
use crate::services::gop_bif::{GopIndex, SeekResult};
use crate::services::playlist::{Direction, PlaylistChunk, PlaylistSeed, PlaylistService};
use crate::services::transcode::TranscodeManager;

/// Capabilities a client declares up front; persisted verbatim as a `CapabilityProfileRecord`'s
/// `profile` JSON and re-parsed each time a decision is made against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCapabilities {
    pub supported_containers: Vec<String>,
    pub supported_video_codecs: Vec<String>,
    pub supported_audio_codecs: Vec<String>,
    pub max_resolution_height: u32,
    pub max_bitrate_bps: u64,
    pub supports_hdr: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamMethod {
    DirectPlay,
    DirectStream,
    Transcode,
}

/// Stored on the `PlaybackSessionRecord` as `stream_plan_json`; carries enough to resolve a
/// later `Seek`/`Stop` without re-querying the media graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamPlan {
    pub method: StreamMethod,
    pub container: Option<String>,
    pub media_part_uuid: Uuid,
    pub part_index: i64,
    pub duration_ms: i64,
    pub ladder: Vec<Rung>,
}

pub struct StartPlaybackRequest {
    pub user_id: i64,
    pub item_id: i64,
    pub seed: Option<PlaylistSeed>,
    pub capability_profile_version: Option<i64>,
}

pub struct StartPlaybackResult {
    pub playback_session_uuid: Uuid,
    pub playlist_generator_uuid: Option<Uuid>,
    pub duration_ms: i64,
    pub stream_plan: StreamPlan,
    pub capability_profile_version: i64,
    pub initial_chunk: Option<PlaylistChunk>,
}

pub struct PlaybackOrchestrator {
    db: Database,
    paths: Paths,
    transcodes: TranscodeManager,
    playlists: PlaylistService,
}

impl PlaybackOrchestrator {
    pub fn new(db: Database, paths: Paths, transcodes: TranscodeManager, playlists: PlaylistService) -> Self {
        Self { db, paths, transcodes, playlists }
    }

    pub async fn start(&self, request: StartPlaybackRequest) -> AppResult<StartPlaybackResult> {
        let metadata = self
            .db
            .metadata_items()
            .get_by_id(request.item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("metadata item {} not found", request.item_id)))?;

        let media_items = self.db.media_items().list_for_metadata_item(metadata.id).await?;
        let media_item = media_items
            .into_iter()
            .max_by_key(|m| (m.height.unwrap_or(0), m.bitrate.unwrap_or(0)))
            .ok_or_else(|| AppError::NotFound(format!("no playable media for item {}", metadata.id)))?;

        let parts = self.db.media_parts().list_for_media_item(media_item.id).await?;
        let part = parts
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("no media parts for media item {}", media_item.id)))?;

        let capability = match request.capability_profile_version {
            Some(version) => self.db.capability_profiles().get_version(request.user_id, version).await?,
            None => self.db.capability_profiles().get_latest(request.user_id).await?,
        }
        .ok_or_else(|| AppError::InvalidInput("no capability profile registered for user".to_string()))?;

        let caps: ClientCapabilities = serde_json::from_value(capability.profile.clone())
            .map_err(|err| AppError::InvalidInput(format!("malformed capability profile: {err}")))?;

        let video = self.db.streams().list_video(part.id).await?;
        let audio = self.db.streams().list_audio(part.id).await?;
        let stream_plan = decide_stream_plan(&media_item, &video, &audio, &caps, part.uuid, part.part_index)?;

        let session = self
            .db
            .playback_sessions()
            .create(CreatePlaybackSession {
                user_id: request.user_id,
                item_id: metadata.id,
                capability_profile_version: capability.version,
                stream_plan: serde_json::to_value(&stream_plan).map_err(|e| AppError::Internal(e.into()))?,
            })
            .await?;

        let (playlist_generator_uuid, initial_chunk) = match request.seed {
            Some(seed) => {
                let (uuid, chunk) = self.playlists.create_playlist(session.id, seed).await.map_err(AppError::Internal)?;
                let generator = self
                    .db
                    .playlist_generators()
                    .get_by_uuid(uuid)
                    .await?
                    .ok_or_else(|| AppError::Internal(anyhow::anyhow!("playlist generator vanished")))?;
                self.db.playback_sessions().attach_playlist(session.uuid, generator.id).await?;
                (Some(uuid), Some(chunk))
            }
            None => (None, None),
        };

        Ok(StartPlaybackResult {
            playback_session_uuid: session.uuid,
            playlist_generator_uuid,
            duration_ms: stream_plan.duration_ms,
            stream_plan,
            capability_profile_version: capability.version,
            initial_chunk,
        })
    }

    /// Returns `true` when the client's currently-declared capability version no longer matches
    /// the one the session's stream plan was built against (§4.8 Heartbeat).
    pub async fn heartbeat(&self, session_uuid: Uuid, playhead_ms: i64, client_capability_version: i64) -> AppResult<bool> {
        let session = self.get_session(session_uuid).await?;
        self.db.playback_sessions().heartbeat(session_uuid, playhead_ms).await?;
        Ok(client_capability_version != session.capability_profile_version)
    }

    pub async fn decide(&self, session_uuid: Uuid, direction: Direction, jump_index: Option<i64>) -> AppResult<Option<PlaylistChunk>> {
        let session = self.get_session(session_uuid).await?;
        let generator_id = session
            .playlist_generator_id
            .ok_or_else(|| AppError::InvalidInput("playback session has no playlist".to_string()))?;
        let generator = self
            .db
            .playlist_generators()
            .get_by_id(generator_id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("playlist generator {generator_id} vanished")))?;

        if direction == Direction::Stop {
            self.stop(session_uuid).await?;
            return Ok(None);
        }

        self.playlists.advance(generator.uuid, direction, jump_index).await.map_err(AppError::Internal)
    }

    /// GoP-aware seek: looks up the GoP index for the session's active media part and returns
    /// the nearest keyframe PTS at or below `target_ms`, updating the session's playhead to
    /// match since the server is authoritative over position.
    pub async fn seek(&self, session_uuid: Uuid, target_ms: i64) -> AppResult<SeekResult> {
        let session = self.get_session(session_uuid).await?;
        let plan: StreamPlan = serde_json::from_value(session.stream_plan)
            .map_err(|err| AppError::Internal(anyhow::anyhow!("corrupt stream plan: {err}")))?;

        let index = GopIndex::read(&self.paths, plan.media_part_uuid, plan.part_index as i32)
            .await
            .map_err(AppError::Internal)?;

        let result = match index {
            Some(index) => index.seek(target_ms),
            None => SeekResult { keyframe_ms: target_ms, gop_duration_ms: 0, has_gop_index: false, original_target_ms: target_ms },
        };
        self.db.playback_sessions().heartbeat(session_uuid, result.keyframe_ms).await?;
        Ok(result)
    }

    /// Terminates the session: cancels every transcode job it spawned (deleting segments),
    /// deactivates its playlist generator, and marks the session itself stopped.
    pub async fn stop(&self, session_uuid: Uuid) -> AppResult<()> {
        let session = self.get_session(session_uuid).await?;

        for job in self.db.transcode_jobs().list_for_session(session.id).await? {
            if matches!(job.state.as_str(), "Queued" | "Starting" | "Running") {
                self.transcodes.cancel(job.uuid, true).await.map_err(AppError::Internal)?;
            }
        }

        if let Some(generator_id) = session.playlist_generator_id {
            if let Some(generator) = self.db.playlist_generators().get_by_id(generator_id).await? {
                self.playlists.stop(generator.uuid).await.map_err(AppError::Internal)?;
            }
        }

        self.db.playback_sessions().set_state(session_uuid, "Stopped").await?;
        Ok(())
    }

    async fn get_session(&self, session_uuid: Uuid) -> AppResult<crate::db::playback::PlaybackSessionRecord> {
        self.db
            .playback_sessions()
            .get_by_uuid(session_uuid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("playback session {session_uuid} not found")))
    }
}

/// DirectPlay if container, video codec, audio codec, HDR, and bitrate all fit the client's
/// declared capabilities; DirectStream if only the container differs; Transcode otherwise,
/// building an ABR ladder capped at the client's max bitrate. A client that can't even decode
/// the transcoder's own output (h264/aac) is a known-incapable device — surfaced as
/// `PlaybackUnsupported` with a diagnostic rather than a ladder that can never be played.
fn decide_stream_plan(
    media_item: &MediaItemRecord,
    video: &[VideoStreamRecord],
    audio: &[AudioStreamRecord],
    caps: &ClientCapabilities,
    part_uuid: Uuid,
    part_index: i64,
) -> AppResult<StreamPlan> {
    let duration_ms = media_item.duration_ms.unwrap_or(0);

    let container_ok = media_item
        .container
        .as_deref()
        .map(|c| caps.supported_containers.iter().any(|s| s.eq_ignore_ascii_case(c)))
        .unwrap_or(false);
    let video_codec_ok = video
        .first()
        .map(|v| caps.supported_video_codecs.iter().any(|s| s.eq_ignore_ascii_case(&v.codec)))
        .unwrap_or(false);
    let audio_codec_ok = audio
        .first()
        .map(|a| caps.supported_audio_codecs.iter().any(|s| s.eq_ignore_ascii_case(&a.codec)))
        .unwrap_or(false);
    let hdr_ok = !media_item.is_hdr || caps.supports_hdr;
    let height_ok = media_item.height.map(|h| h as u32 <= caps.max_resolution_height).unwrap_or(true);
    let bitrate_ok = media_item.bitrate.map(|b| b as u64 <= caps.max_bitrate_bps).unwrap_or(true);

    let plays_natively = video_codec_ok && audio_codec_ok && hdr_ok && height_ok && bitrate_ok;

    if plays_natively {
        let method = if container_ok { StreamMethod::DirectPlay } else { StreamMethod::DirectStream };
        return Ok(StreamPlan {
            method,
            container: media_item.container.clone(),
            media_part_uuid: part_uuid,
            part_index,
            duration_ms,
            ladder: Vec::new(),
        });
    }

    if !caps.supported_video_codecs.iter().any(|c| c.eq_ignore_ascii_case("h264"))
        || !caps.supported_audio_codecs.iter().any(|c| c.eq_ignore_ascii_case("aac"))
    {
        return Err(AppError::PlaybackUnsupported(
            "device declares no support for h264/aac, the transcoder's only output codecs".to_string(),
        ));
    }

    let src_height = media_item.height.unwrap_or(1080) as u32;
    let src_bitrate = media_item.bitrate.map(|b| b as u64);
    let ladder = build_ladder(src_height, src_bitrate, caps.max_bitrate_bps, false);

    Ok(StreamPlan {
        method: StreamMethod::Transcode,
        container: Some("hls".to_string()),
        media_part_uuid: part_uuid,
        part_index,
        duration_ms,
        ladder,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::library::CreateLibrarySection;
    use crate::db::media::{CreateMediaItem, CreateMediaPart};
    use crate::db::metadata::CreateMetadataItem;
    use serde_json::json;
    use std::time::Duration;

    async fn memory_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn test_paths(base: &std::path::Path) -> Paths {
        let paths = Paths {
            data: base.join("data"),
            db: base.join("data/db"),
            index: base.join("data/index"),
            cache: base.join("cache"),
            media_cache: base.join("cache/media"),
            transcodes: base.join("cache/transcodes"),
            log: base.join("logs"),
            temp: base.join("tmp"),
            backup: base.join("data/backup"),
        };
        std::fs::create_dir_all(&paths.temp).unwrap();
        paths
    }

    async fn seed_movie(db: &Database) -> (i64, i64) {
        let section = db
            .library_sections()
            .create(CreateLibrarySection { name: "Movies".into(), section_type: "movie".into(), settings: json!({}) })
            .await
            .unwrap();
        let item = db
            .metadata_items()
            .create(CreateMetadataItem {
                library_section_id: section.id,
                metadata_type: "Movie".into(),
                title: "Test Movie".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let media_item = db
            .media_items()
            .create(CreateMediaItem {
                metadata_item_id: item.id,
                container: Some("mkv".into()),
                bitrate: Some(8_000_000),
                duration_ms: Some(3_600_000),
                width: Some(1920),
                height: Some(1080),
                is_hdr: false,
                rotation: 0,
            })
            .await
            .unwrap();
        let part = db
            .media_parts()
            .create(CreateMediaPart {
                media_item_id: media_item.id,
                directory_id: None,
                library_section_id: section.id,
                part_index: 0,
                absolute_path: "/movies/test.mkv".into(),
                size_bytes: 1_000_000_000,
                mtime_seen: chrono::Utc::now(),
            })
            .await
            .unwrap();
        db.streams()
            .add_video(crate::db::media::CreateVideoStream {
                media_part_id: part.id,
                stream_index: 0,
                codec: "hevc".into(),
                width: Some(1920),
                height: Some(1080),
                bitrate: Some(8_000_000),
                is_hdr: false,
            })
            .await
            .unwrap();
        db.streams()
            .add_audio(crate::db::media::CreateAudioStream {
                media_part_id: part.id,
                stream_index: 1,
                codec: "aac".into(),
                channels: 2,
                language: Some("eng".into()),
                is_default: true,
            })
            .await
            .unwrap();
        (item.id, 1)
    }

    #[tokio::test]
    async fn direct_play_when_everything_matches() {
        let db = memory_db().await;
        let (item_id, user_id) = seed_movie(&db).await;
        db.capability_profiles()
            .create(
                user_id,
                serde_json::to_value(ClientCapabilities {
                    supported_containers: vec!["mkv".into()],
                    supported_video_codecs: vec!["hevc".into()],
                    supported_audio_codecs: vec!["aac".into()],
                    max_resolution_height: 2160,
                    max_bitrate_bps: 20_000_000,
                    supports_hdr: true,
                })
                .unwrap(),
            )
            .await
            .unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = PlaybackOrchestrator::new(
            db.clone(),
            test_paths(tmp.path()),
            TranscodeManager::new(db.clone(), 4, Duration::from_secs(60)),
            PlaylistService::new(db.clone()),
        );

        let result = orchestrator
            .start(StartPlaybackRequest { user_id, item_id, seed: None, capability_profile_version: None })
            .await
            .unwrap();
        assert_eq!(result.stream_plan.method, StreamMethod::DirectPlay);
    }

    #[tokio::test]
    async fn transcodes_when_codec_unsupported_and_builds_a_ladder() {
        let db = memory_db().await;
        let (item_id, user_id) = seed_movie(&db).await;
        db.capability_profiles()
            .create(
                user_id,
                serde_json::to_value(ClientCapabilities {
                    supported_containers: vec!["mp4".into()],
                    supported_video_codecs: vec!["h264".into()],
                    supported_audio_codecs: vec!["aac".into()],
                    max_resolution_height: 1080,
                    max_bitrate_bps: 6_000_000,
                    supports_hdr: false,
                })
                .unwrap(),
            )
            .await
            .unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = PlaybackOrchestrator::new(
            db.clone(),
            test_paths(tmp.path()),
            TranscodeManager::new(db.clone(), 4, Duration::from_secs(60)),
            PlaylistService::new(db.clone()),
        );

        let result = orchestrator
            .start(StartPlaybackRequest { user_id, item_id, seed: None, capability_profile_version: None })
            .await
            .unwrap();
        assert_eq!(result.stream_plan.method, StreamMethod::Transcode);
        assert!(!result.stream_plan.ladder.is_empty());
    }

    #[tokio::test]
    async fn known_incapable_device_is_rejected_as_unsupported() {
        let db = memory_db().await;
        let (item_id, user_id) = seed_movie(&db).await;
        db.capability_profiles()
            .create(
                user_id,
                serde_json::to_value(ClientCapabilities {
                    supported_containers: vec!["mp4".into()],
                    supported_video_codecs: vec!["vp9".into()],
                    supported_audio_codecs: vec!["opus".into()],
                    max_resolution_height: 1080,
                    max_bitrate_bps: 6_000_000,
                    supports_hdr: false,
                })
                .unwrap(),
            )
            .await
            .unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = PlaybackOrchestrator::new(
            db.clone(),
            test_paths(tmp.path()),
            TranscodeManager::new(db.clone(), 4, Duration::from_secs(60)),
            PlaylistService::new(db.clone()),
        );

        let err = orchestrator
            .start(StartPlaybackRequest { user_id, item_id, seed: None, capability_profile_version: None })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PlaybackUnsupported(_)));
    }
}
