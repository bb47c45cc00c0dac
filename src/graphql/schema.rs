//! GraphQL root objects (§6 External Interfaces).
//!
//! `QueryRoot`/`MutationRoot`/`SubscriptionRoot` are unit structs with one big `#[Object]`/
//! `#[Subscription]` impl block each; every backing service and repository handle is registered
//! as schema-wide data via `.data(...)` in [`build_schema`] and pulled per-resolver with
//! `ctx.data_unchecked::<T>()`, rather than carried as a field on the root structs.

use std::collections::HashSet;
use std::sync::Arc;

use async_graphql::{Context, Object, Schema};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use crate::db::library::{CreateLibrarySection, CreateSectionLocation};
use crate::db::Database;
use crate::errors::AppError;
use crate::paths::Paths;
use crate::services::detail_fields::DetailFieldService;
use crate::services::ffmpeg::FfmpegService;
use crate::services::hub::{HubService, HubType};
use crate::services::notifications::JobNotificationFabric;
use crate::services::playback::{
    ClientCapabilities, PlaybackOrchestrator, StartPlaybackRequest, StreamPlan,
};
use crate::services::playlist::PlaylistService;
use crate::services::scan::agents::{AgentClientFactory, MetadataAgent};
use crate::services::scan::dedup::DedupService;
use crate::services::scan::file_analyzer::analyze_part;
use crate::services::scan::refresh::{refresh_item, RefreshOptions};
use crate::services::scan::run_scan;
use crate::services::transcode::TranscodeManager;
use crate::settings::Settings;

use super::auth::AuthExt;
use super::subscriptions::SubscriptionRoot;
use super::types::*;

pub type NexaSchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

/// Active scans' cancellation tokens, keyed by the scan's uuid; populated in `start_scan_impl`
/// and consulted by `cancelScan`.
pub type ScanCancellations = Arc<DashMap<Uuid, CancellationToken>>;

#[allow(clippy::too_many_arguments)]
pub fn build_schema(
    db: Database,
    config: Arc<Config>,
    paths: Arc<Paths>,
    fabric: JobNotificationFabric,
    ffmpeg: Arc<FfmpegService>,
    transcodes: Arc<TranscodeManager>,
    playback: Arc<PlaybackOrchestrator>,
    playlists: Arc<PlaylistService>,
    hubs: Arc<HubService>,
    detail_fields: Arc<DetailFieldService>,
    settings: Arc<Settings>,
    http_client: reqwest::Client,
    log_broadcast: Option<broadcast::Sender<crate::services::logging::LogEvent>>,
    metadata_updates: broadcast::Sender<Uuid>,
) -> NexaSchema {
    let scan_cancellations: ScanCancellations = Arc::new(DashMap::new());

    let mut schema = Schema::build(QueryRoot, MutationRoot, SubscriptionRoot)
        .data(db)
        .data(config)
        .data(paths)
        .data(fabric)
        .data(ffmpeg)
        .data(transcodes)
        .data(playback)
        .data(playlists)
        .data(hubs)
        .data(detail_fields)
        .data(settings)
        .data(http_client)
        .data(scan_cancellations)
        .data(metadata_updates);

    if let Some(sender) = log_broadcast {
        schema = schema.data(sender);
    }

    schema.finish()
}

fn agents() -> Vec<Arc<dyn MetadataAgent>> {
    // No concrete metadata-agent implementations ship in this crate; refresh/scan calls fan out
    // over an empty list and leave every field untouched. See DESIGN.md.
    Vec::new()
}

async fn start_scan_impl(
    db: &Database,
    config: &Arc<Config>,
    fabric: &JobNotificationFabric,
    http_client: &reqwest::Client,
    paths: &Arc<Paths>,
    cancellations: &ScanCancellations,
    library_section_id: i64,
) -> async_graphql::Result<LibraryScan> {
    let section = db
        .library_sections()
        .get_by_id(library_section_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| async_graphql::Error::new("library section not found"))?;

    let locations = db
        .section_locations()
        .list_for_section(library_section_id)
        .await
        .map_err(AppError::Internal)?;
    let location = locations
        .into_iter()
        .next()
        .ok_or_else(|| async_graphql::Error::new("library section has no locations"))?;

    let cancel = CancellationToken::new();
    let scan_record = db.library_scans().get_resumable(library_section_id).await.map_err(AppError::Internal)?;
    let scan_uuid = match scan_record {
        Some(existing) => existing.uuid,
        None => db.library_scans().begin(library_section_id).await.map_err(AppError::Internal)?.uuid,
    };
    cancellations.insert(scan_uuid, cancel.clone());

    let spawned_db = db.clone();
    let spawned_config = config.clone();
    let spawned_fabric = fabric.clone();
    let spawned_http_client = http_client.clone();
    let spawned_paths = paths.clone();
    let section_type = section.section_type.clone();
    tokio::spawn(async move {
        if let Err(e) = run_scan(
            spawned_db,
            spawned_config,
            spawned_fabric,
            spawned_http_client,
            spawned_paths,
            location,
            section_type,
            agents(),
            cancel,
        )
        .await
        {
            tracing::warn!(error = %e, library_section_id, "scan failed");
        }
    });

    let record = db
        .library_scans()
        .get_by_uuid(scan_uuid)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| async_graphql::Error::new("scan vanished immediately after creation"))?;
    Ok(record.into())
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    // --------------------------------------------------------------------------------------
    // Libraries
    // --------------------------------------------------------------------------------------

    async fn libraries(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<LibrarySection>> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let records = db.library_sections().list_all().await.map_err(AppError::Internal)?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn library(&self, ctx: &Context<'_>, uuid: Uuid) -> async_graphql::Result<Option<LibrarySection>> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        Ok(db.library_sections().get_by_uuid(uuid).await.map_err(AppError::Internal)?.map(Into::into))
    }

    async fn section_locations(&self, ctx: &Context<'_>, library_section_id: i64) -> async_graphql::Result<Vec<SectionLocation>> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let records = db.section_locations().list_for_section(library_section_id).await.map_err(AppError::Internal)?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    // --------------------------------------------------------------------------------------
    // Metadata items
    // --------------------------------------------------------------------------------------

    async fn metadata_item(&self, ctx: &Context<'_>, uuid: Uuid) -> async_graphql::Result<Option<MetadataItem>> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        Ok(db.metadata_items().get_by_uuid(uuid).await.map_err(AppError::Internal)?.map(Into::into))
    }

    async fn metadata_children(&self, ctx: &Context<'_>, parent_id: i64) -> async_graphql::Result<Vec<MetadataItem>> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let records = db.metadata_items().list_children(parent_id).await.map_err(AppError::Internal)?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn library_roots(&self, ctx: &Context<'_>, library_section_id: i64, metadata_type: String) -> async_graphql::Result<Vec<MetadataItem>> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let records = db.metadata_items().list_roots(library_section_id, &metadata_type).await.map_err(AppError::Internal)?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn recently_added(
        &self,
        ctx: &Context<'_>,
        library_section_id: i64,
        metadata_type: String,
        limit: i64,
    ) -> async_graphql::Result<Vec<MetadataItem>> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let records = db.metadata_items().list_recently_added(library_section_id, &metadata_type, limit).await.map_err(AppError::Internal)?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn continue_watching(
        &self,
        ctx: &Context<'_>,
        library_section_id: i64,
        metadata_type: String,
        limit: i64,
    ) -> async_graphql::Result<Vec<MetadataItem>> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let records = db.metadata_items().list_continue_watching(library_section_id, &metadata_type, limit).await.map_err(AppError::Internal)?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    // --------------------------------------------------------------------------------------
    // Scans
    // --------------------------------------------------------------------------------------

    async fn scan(&self, ctx: &Context<'_>, uuid: Uuid) -> async_graphql::Result<Option<LibraryScan>> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        Ok(db.library_scans().get_by_uuid(uuid).await.map_err(AppError::Internal)?.map(Into::into))
    }

    async fn recent_scans(&self, ctx: &Context<'_>, library_section_id: i64, limit: i64) -> async_graphql::Result<Vec<LibraryScan>> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let records = db.library_scans().list_recent(library_section_id, limit).await.map_err(AppError::Internal)?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    // --------------------------------------------------------------------------------------
    // Hubs & detail fields
    // --------------------------------------------------------------------------------------

    async fn hubs(
        &self,
        ctx: &Context<'_>,
        context: String,
        library_section_id: Option<i64>,
        metadata_type: String,
        item_id: Option<i64>,
    ) -> async_graphql::Result<Vec<ResolvedHubGql>> {
        ctx.auth_user()?;
        let hubs = ctx.data_unchecked::<Arc<HubService>>();
        let resolved = hubs
            .resolve(&context, library_section_id, &metadata_type, item_id, &HashSet::<HubType>::new())
            .await
            .map_err(AppError::Internal)?;
        Ok(resolved.into_iter().map(Into::into).collect())
    }

    async fn hub_configuration(&self, ctx: &Context<'_>, context: String, library_section_id: Option<i64>, metadata_type: Option<String>) -> async_graphql::Result<Option<HubConfiguration>> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let config = db.hub_configurations().get(&context, library_section_id, metadata_type.as_deref()).await.map_err(AppError::Internal)?;
        Ok(config.map(Into::into))
    }

    async fn detail_field_config(
        &self,
        ctx: &Context<'_>,
        metadata_type: String,
        library_section_id: Option<i64>,
    ) -> async_graphql::Result<Vec<ResolvedFieldGroupGql>> {
        ctx.auth_user()?;
        let detail_fields = ctx.data_unchecked::<Arc<DetailFieldService>>();
        let groups = detail_fields.resolve(&metadata_type, library_section_id).await.map_err(AppError::Internal)?;
        Ok(groups.into_iter().map(Into::into).collect())
    }

    async fn custom_field_definitions(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<CustomFieldDefinition>> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let records = db.custom_field_definitions().list_enabled().await.map_err(AppError::Internal)?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    // --------------------------------------------------------------------------------------
    // Jobs & transcodes
    // --------------------------------------------------------------------------------------

    async fn active_job_notifications(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<JobNotification>> {
        ctx.auth_user()?;
        let fabric = ctx.data_unchecked::<JobNotificationFabric>();
        Ok(fabric.list_active().into_iter().map(Into::into).collect())
    }

    async fn transcode_job_status(&self, ctx: &Context<'_>, uuid: Uuid) -> async_graphql::Result<Option<TranscodeJobStatus>> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        Ok(db.transcode_jobs().get_by_uuid(uuid).await.map_err(AppError::Internal)?.map(Into::into))
    }

    // --------------------------------------------------------------------------------------
    // Playlists
    // --------------------------------------------------------------------------------------

    async fn playlist_chunk(&self, ctx: &Context<'_>, generator_uuid: Uuid, start_index: i64, limit: i64) -> async_graphql::Result<PlaylistChunkGql> {
        ctx.auth_user()?;
        let playlists = ctx.data_unchecked::<Arc<PlaylistService>>();
        let chunk = playlists.get_chunk(generator_uuid, start_index, limit).await.map_err(AppError::Internal)?;
        Ok(chunk.into())
    }

    // --------------------------------------------------------------------------------------
    // Filesystem browsing
    // --------------------------------------------------------------------------------------

    async fn browse_directory(&self, ctx: &Context<'_>, path: String) -> async_graphql::Result<Vec<FilesystemEntry>> {
        ctx.auth_user()?;
        let mut read_dir = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| async_graphql::Error::new(format!("failed to read directory: {e}")))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| async_graphql::Error::new(e.to_string()))? {
            let file_type = entry.file_type().await.map_err(|e| async_graphql::Error::new(e.to_string()))?;
            entries.push(FilesystemEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry.path().to_string_lossy().to_string(),
                is_directory: file_type.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    // --------------------------------------------------------------------------------------
    // Libraries
    // --------------------------------------------------------------------------------------

    async fn add_library(&self, ctx: &Context<'_>, input: AddLibraryInput) -> async_graphql::Result<AddLibraryResult> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();

        let section = db
            .library_sections()
            .create(CreateLibrarySection {
                name: input.name,
                section_type: input.section_type,
                settings: serde_json::json!({}),
            })
            .await
            .map_err(AppError::Internal)?;

        for root_path in &input.root_paths {
            db.section_locations()
                .create(CreateSectionLocation {
                    library_section_id: section.id,
                    root_path: root_path.clone(),
                    watch_depth: input.watch_depth.unwrap_or(8),
                    poll_interval_secs: input.poll_interval_secs.unwrap_or(300),
                })
                .await
                .map_err(AppError::Internal)?;
        }

        let config = ctx.data_unchecked::<Arc<Config>>();
        let fabric = ctx.data_unchecked::<JobNotificationFabric>();
        let http_client = ctx.data_unchecked::<reqwest::Client>();
        let paths = ctx.data_unchecked::<Arc<Paths>>();
        let cancellations = ctx.data_unchecked::<ScanCancellations>();

        let scan = start_scan_impl(db, config, fabric, http_client, paths, cancellations, section.id).await?;

        Ok(AddLibraryResult { library: section.into(), scan_id: scan.uuid })
    }

    async fn remove_library(&self, ctx: &Context<'_>, uuid: Uuid) -> async_graphql::Result<SuccessResult> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let section = db
            .library_sections()
            .get_by_uuid(uuid)
            .await
            .map_err(AppError::Internal)?
            .ok_or_else(|| async_graphql::Error::new("library not found"))?;
        let success = db.library_sections().delete(section.id).await.map_err(AppError::Internal)?;
        Ok(SuccessResult { success })
    }

    // --------------------------------------------------------------------------------------
    // Scans
    // --------------------------------------------------------------------------------------

    async fn start_scan(&self, ctx: &Context<'_>, library_section_id: i64) -> async_graphql::Result<LibraryScan> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let config = ctx.data_unchecked::<Arc<Config>>();
        let fabric = ctx.data_unchecked::<JobNotificationFabric>();
        let http_client = ctx.data_unchecked::<reqwest::Client>();
        let paths = ctx.data_unchecked::<Arc<Paths>>();
        let cancellations = ctx.data_unchecked::<ScanCancellations>();
        start_scan_impl(db, config, fabric, http_client, paths, cancellations, library_section_id).await
    }

    /// Identical to `startScan`: `run_scan` resumes from the section's checkpointed scan (if
    /// one exists) rather than walking from scratch, so there's no separate resume code path.
    async fn resume_scan(&self, ctx: &Context<'_>, library_section_id: i64) -> async_graphql::Result<LibraryScan> {
        self.start_scan(ctx, library_section_id).await
    }

    async fn cancel_scan(&self, ctx: &Context<'_>, scan_uuid: Uuid) -> async_graphql::Result<SuccessResult> {
        ctx.auth_user()?;
        let cancellations = ctx.data_unchecked::<ScanCancellations>();
        let cancelled = match cancellations.get(&scan_uuid) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        };
        Ok(SuccessResult { success: cancelled })
    }

    // --------------------------------------------------------------------------------------
    // Metadata items
    // --------------------------------------------------------------------------------------

    /// Refreshes `item_uuid` against every registered metadata agent. No concrete agent
    /// implementations ship in this crate, so this currently fans out over an empty list and
    /// leaves every field untouched — see DESIGN.md.
    async fn refresh_metadata(&self, ctx: &Context<'_>, item_uuid: Uuid, input: RefreshMetadataInput) -> async_graphql::Result<SuccessResult> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let paths = ctx.data_unchecked::<Arc<Paths>>();
        let http_client = ctx.data_unchecked::<reqwest::Client>();

        let item = db
            .metadata_items()
            .get_by_uuid(item_uuid)
            .await
            .map_err(AppError::Internal)?
            .ok_or_else(|| async_graphql::Error::new("metadata item not found"))?;

        let dedup = DedupService::new(db.clone());
        let client_factory = AgentClientFactory::new();
        let remote_semaphore = tokio::sync::Semaphore::new(4);
        let options = RefreshOptions { override_fields: input.override_fields.into_iter().collect(), skip_analysis: input.skip_analysis };

        refresh_item(
            db,
            &dedup,
            &client_factory,
            &remote_semaphore,
            http_client,
            paths,
            item_uuid,
            item.id,
            item.library_section_id,
            &agents(),
            &options,
        )
        .await
        .map_err(AppError::Internal)?;

        let updates = ctx.data_unchecked::<broadcast::Sender<Uuid>>();
        let _ = updates.send(item_uuid);

        Ok(SuccessResult { success: true })
    }

    /// Re-runs ffprobe analysis over every media part belonging to `item_uuid`.
    async fn analyze_item(&self, ctx: &Context<'_>, item_uuid: Uuid) -> async_graphql::Result<SuccessResult> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let ffmpeg = ctx.data_unchecked::<Arc<FfmpegService>>();

        let item = db
            .metadata_items()
            .get_by_uuid(item_uuid)
            .await
            .map_err(AppError::Internal)?
            .ok_or_else(|| async_graphql::Error::new("metadata item not found"))?;
        let media_items = db.media_items().list_for_metadata_item(item.id).await.map_err(AppError::Internal)?;
        for media_item in media_items {
            let parts = db.media_parts().list_for_media_item(media_item.id).await.map_err(AppError::Internal)?;
            for part in parts {
                analyze_part(db, ffmpeg, media_item.id, part.id, &part.absolute_path).await.map_err(AppError::Internal)?;
            }
        }

        Ok(SuccessResult { success: true })
    }

    async fn promote_item(&self, ctx: &Context<'_>, item_uuid: Uuid) -> async_graphql::Result<SuccessResult> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let item = db
            .metadata_items()
            .get_by_uuid(item_uuid)
            .await
            .map_err(AppError::Internal)?
            .ok_or_else(|| async_graphql::Error::new("metadata item not found"))?;
        db.metadata_items().set_promoted(item.id, true).await.map_err(AppError::Internal)?;
        Ok(SuccessResult { success: true })
    }

    async fn unpromote_item(&self, ctx: &Context<'_>, item_uuid: Uuid) -> async_graphql::Result<SuccessResult> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let item = db
            .metadata_items()
            .get_by_uuid(item_uuid)
            .await
            .map_err(AppError::Internal)?
            .ok_or_else(|| async_graphql::Error::new("metadata item not found"))?;
        db.metadata_items().set_promoted(item.id, false).await.map_err(AppError::Internal)?;
        Ok(SuccessResult { success: true })
    }

    // --------------------------------------------------------------------------------------
    // Playback
    // --------------------------------------------------------------------------------------

    async fn upsert_capability_profile(&self, ctx: &Context<'_>, capabilities: ClientCapabilitiesInput) -> async_graphql::Result<i64> {
        let user = ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let caps: ClientCapabilities = capabilities.into();
        let profile = serde_json::to_value(&caps).map_err(|e| async_graphql::Error::new(e.to_string()))?;
        let record = db.capability_profiles().create(user.id, profile).await.map_err(AppError::Internal)?;
        Ok(record.version)
    }

    async fn start_playback(&self, ctx: &Context<'_>, input: StartPlaybackInput) -> async_graphql::Result<PlaybackStartResponse> {
        let user = ctx.auth_user()?;
        let playback = ctx.data_unchecked::<Arc<PlaybackOrchestrator>>();

        let seed = input.seed.map(|s| s.into_seed()).transpose()?;
        let result = playback
            .start(StartPlaybackRequest {
                user_id: user.id,
                item_id: input.item_id,
                seed,
                capability_profile_version: input.capability_profile_version,
            })
            .await?;

        Ok(PlaybackStartResponse {
            playback_session_uuid: result.playback_session_uuid,
            playlist_generator_uuid: result.playlist_generator_uuid,
            duration_ms: result.duration_ms,
            stream_plan: (&result.stream_plan).into(),
            capability_profile_version: result.capability_profile_version,
            initial_chunk: result.initial_chunk.map(Into::into),
        })
    }

    async fn heartbeat_playback(
        &self,
        ctx: &Context<'_>,
        session_uuid: Uuid,
        playhead_ms: i64,
        capability_profile_version: i64,
    ) -> async_graphql::Result<PlaybackHeartbeatResponse> {
        ctx.auth_user()?;
        let playback = ctx.data_unchecked::<Arc<PlaybackOrchestrator>>();
        let mismatch = playback.heartbeat(session_uuid, playhead_ms, capability_profile_version).await?;
        Ok(PlaybackHeartbeatResponse { capability_version_mismatch: mismatch })
    }

    async fn decide_playback(
        &self,
        ctx: &Context<'_>,
        session_uuid: Uuid,
        direction: PlaylistDirectionGql,
        jump_index: Option<i64>,
    ) -> async_graphql::Result<PlaybackDecideResponse> {
        ctx.auth_user()?;
        let playback = ctx.data_unchecked::<Arc<PlaybackOrchestrator>>();
        let chunk = playback.decide(session_uuid, direction.into(), jump_index).await?;
        Ok(PlaybackDecideResponse { action: "advance".to_string(), next_chunk: chunk.map(Into::into) })
    }

    async fn seek_playback(&self, ctx: &Context<'_>, session_uuid: Uuid, target_ms: i64) -> async_graphql::Result<PlaybackSeekResponse> {
        ctx.auth_user()?;
        let playback = ctx.data_unchecked::<Arc<PlaybackOrchestrator>>();
        let result = playback.seek(session_uuid, target_ms).await?;
        Ok(PlaybackSeekResponse {
            keyframe_ms: result.keyframe_ms,
            gop_duration_ms: result.gop_duration_ms,
            has_gop_index: result.has_gop_index,
            original_target_ms: result.original_target_ms,
        })
    }

    /// `PlaybackOrchestrator` has no dedicated resume entry point; this rebuilds the response
    /// straight from the persisted session row instead of calling a service method.
    async fn resume_playback(&self, ctx: &Context<'_>, session_uuid: Uuid) -> async_graphql::Result<PlaybackResumeResponse> {
        ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();
        let session = db
            .playback_sessions()
            .get_by_uuid(session_uuid)
            .await
            .map_err(AppError::Internal)?
            .ok_or_else(|| async_graphql::Error::new("playback session not found"))?;

        let plan: StreamPlan = serde_json::from_value(session.stream_plan)
            .map_err(|e| async_graphql::Error::new(format!("corrupt stream plan: {e}")))?;

        Ok(PlaybackResumeResponse {
            playback_session_uuid: session.uuid,
            stream_plan: (&plan).into(),
            playhead_ms: session.playhead_ms,
            duration_ms: plan.duration_ms,
        })
    }

    async fn stop_playback(&self, ctx: &Context<'_>, session_uuid: Uuid) -> async_graphql::Result<SuccessResult> {
        ctx.auth_user()?;
        let playback = ctx.data_unchecked::<Arc<PlaybackOrchestrator>>();
        playback.stop(session_uuid).await?;
        Ok(SuccessResult { success: true })
    }

    // --------------------------------------------------------------------------------------
    // Playlists
    // --------------------------------------------------------------------------------------

    async fn advance_playlist(
        &self,
        ctx: &Context<'_>,
        generator_uuid: Uuid,
        direction: PlaylistDirectionGql,
        jump_index: Option<i64>,
    ) -> async_graphql::Result<Option<PlaylistChunkGql>> {
        ctx.auth_user()?;
        let playlists = ctx.data_unchecked::<Arc<PlaylistService>>();
        let chunk = playlists.advance(generator_uuid, direction.into(), jump_index).await.map_err(AppError::Internal)?;
        Ok(chunk.map(Into::into))
    }

    async fn set_playlist_shuffle(&self, ctx: &Context<'_>, generator_uuid: Uuid, shuffle: bool) -> async_graphql::Result<SuccessResult> {
        ctx.auth_user()?;
        let playlists = ctx.data_unchecked::<Arc<PlaylistService>>();
        playlists.set_shuffle(generator_uuid, shuffle).await.map_err(AppError::Internal)?;
        Ok(SuccessResult { success: true })
    }

    async fn set_playlist_repeat(&self, ctx: &Context<'_>, generator_uuid: Uuid, repeat: bool) -> async_graphql::Result<SuccessResult> {
        ctx.auth_user()?;
        let playlists = ctx.data_unchecked::<Arc<PlaylistService>>();
        playlists.set_repeat(generator_uuid, repeat).await.map_err(AppError::Internal)?;
        Ok(SuccessResult { success: true })
    }

    // --------------------------------------------------------------------------------------
    // Settings
    // --------------------------------------------------------------------------------------

    async fn update_settings(&self, ctx: &Context<'_>, input: SettingsUpdateInput) -> async_graphql::Result<SettingsUpdateResult> {
        ctx.auth_user()?;
        let settings = ctx.data_unchecked::<Arc<Settings>>();

        let mut restart_required = false;
        if let Some(v) = input.max_concurrent_transcodes {
            restart_required |= settings.set("transcode.max_concurrent", v).await.map_err(AppError::Internal)?;
        }
        if let Some(v) = input.playback_session_ttl_secs {
            restart_required |= settings.set("playback.session_ttl_secs", v).await.map_err(AppError::Internal)?;
        }
        if let Some(v) = input.scan_concurrency_override {
            restart_required |= settings.set("scan.concurrency_override", v).await.map_err(AppError::Internal)?;
        }

        Ok(SettingsUpdateResult { restart_required })
    }
}
