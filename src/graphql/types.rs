//! GraphQL object/input types (§6 External Interfaces), mapped onto the repository records in
//! `crate::db` and the service-layer result types in `crate::services`.

use async_graphql::{Enum, InputObject, Json, SimpleObject};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::hub::{CustomFieldDefinitionRecord, DetailFieldConfigurationRecord, FieldGroupRecord, HubConfigurationRecord};
use crate::db::library::{LibrarySectionRecord, SectionLocationRecord};
use crate::db::metadata::MetadataItemRecord;
use crate::db::notifications::JobNotificationRecord;
use crate::db::playback::TranscodeJobRecord;
use crate::db::scan::LibraryScanRecord;
use crate::services::detail_fields::{FieldLayout, ResolvedField, ResolvedFieldGroup};
use crate::services::hub::{HubType, ResolvedHub};
use crate::services::logging::LogEvent;
use crate::services::notifications::{JobNotificationSnapshot, JobStatus, JobType};
use crate::services::playback::{ClientCapabilities, StreamMethod, StreamPlan};
use crate::services::playlist::{Direction, PlaylistChunk, PlaylistSeed};

// ---------------------------------------------------------------------------------------------
// Libraries
// ---------------------------------------------------------------------------------------------

#[derive(SimpleObject)]
pub struct LibrarySection {
    pub uuid: Uuid,
    pub name: String,
    pub section_type: String,
    pub settings: Json<serde_json::Value>,
    pub requires_full_rescan: bool,
    pub created_at: DateTime<Utc>,
}

impl From<LibrarySectionRecord> for LibrarySection {
    fn from(r: LibrarySectionRecord) -> Self {
        Self {
            uuid: r.uuid,
            name: r.name,
            section_type: r.section_type,
            settings: Json(r.settings),
            requires_full_rescan: r.requires_full_rescan,
            created_at: r.created_at,
        }
    }
}

#[derive(SimpleObject)]
pub struct SectionLocation {
    pub uuid: Uuid,
    pub root_path: String,
    pub watch_depth: i64,
    pub poll_interval_secs: i64,
}

impl From<SectionLocationRecord> for SectionLocation {
    fn from(r: SectionLocationRecord) -> Self {
        Self { uuid: r.uuid, root_path: r.root_path, watch_depth: r.watch_depth, poll_interval_secs: r.poll_interval_secs }
    }
}

#[derive(InputObject)]
pub struct AddLibraryInput {
    pub name: String,
    pub section_type: String,
    pub root_paths: Vec<String>,
    pub watch_depth: Option<i64>,
    pub poll_interval_secs: Option<i64>,
}

#[derive(SimpleObject)]
pub struct AddLibraryResult {
    pub library: LibrarySection,
    pub scan_id: Uuid,
}

// ---------------------------------------------------------------------------------------------
// Metadata items
// ---------------------------------------------------------------------------------------------

#[derive(SimpleObject)]
pub struct MetadataItem {
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
    pub art_uri: Option<String>,
    pub is_promoted: bool,
    pub locked_fields: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<MetadataItemRecord> for MetadataItem {
    fn from(r: MetadataItemRecord) -> Self {
        Self {
            uuid: r.uuid,
            library_section_id: r.library_section_id,
            parent_id: r.parent_id,
            metadata_type: r.metadata_type,
            title: r.title,
            original_title: r.original_title,
            sort_title: r.sort_title,
            year: r.year,
            release_date: r.release_date,
            summary: r.summary,
            tagline: r.tagline,
            studio: r.studio,
            content_rating: r.content_rating,
            duration_ms: r.duration_ms,
            view_count: r.view_count,
            view_offset: r.view_offset,
            thumb_uri: r.thumb_uri,
            art_uri: r.art_uri,
            is_promoted: r.is_promoted,
            locked_fields: r.locked_fields,
            updated_at: r.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------------------------
// Scans
// ---------------------------------------------------------------------------------------------

#[derive(SimpleObject)]
pub struct LibraryScan {
    pub uuid: Uuid,
    pub library_section_id: i64,
    pub state: String,
    pub total_files: i64,
    pub processed_files: i64,
    pub added: i64,
    pub modified: i64,
    pub removed: i64,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<LibraryScanRecord> for LibraryScan {
    fn from(r: LibraryScanRecord) -> Self {
        Self {
            uuid: r.uuid,
            library_section_id: r.library_section_id,
            state: r.state,
            total_files: r.total_files,
            processed_files: r.processed_files,
            added: r.added,
            modified: r.modified,
            removed: r.removed,
            errors: r.errors,
            started_at: r.started_at,
            finished_at: r.finished_at,
        }
    }
}

// ---------------------------------------------------------------------------------------------
// Hubs & detail fields
// ---------------------------------------------------------------------------------------------

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum HubTypeGql {
    RecentlyAdded,
    ContinueWatching,
    Promoted,
    ByGenre,
    Cast,
    Crew,
    Similar,
    Related,
}

impl From<HubType> for HubTypeGql {
    fn from(h: HubType) -> Self {
        match h {
            HubType::RecentlyAdded => HubTypeGql::RecentlyAdded,
            HubType::ContinueWatching => HubTypeGql::ContinueWatching,
            HubType::Promoted => HubTypeGql::Promoted,
            HubType::ByGenre => HubTypeGql::ByGenre,
            HubType::Cast => HubTypeGql::Cast,
            HubType::Crew => HubTypeGql::Crew,
            HubType::Similar => HubTypeGql::Similar,
            HubType::Related => HubTypeGql::Related,
        }
    }
}

#[derive(SimpleObject)]
pub struct HubItemGql {
    pub metadata_item_id: i64,
    pub uuid: Uuid,
    pub title: String,
    pub thumb_uri: Option<String>,
}

#[derive(SimpleObject)]
pub struct ResolvedHubGql {
    pub hub_type: HubTypeGql,
    pub title: String,
    pub items: Vec<HubItemGql>,
}

impl From<ResolvedHub> for ResolvedHubGql {
    fn from(r: ResolvedHub) -> Self {
        Self {
            hub_type: r.hub_type.into(),
            title: r.title,
            items: r
                .items
                .into_iter()
                .map(|i| HubItemGql { metadata_item_id: i.metadata_item_id, uuid: i.uuid, title: i.title, thumb_uri: i.thumb_uri })
                .collect(),
        }
    }
}

#[derive(SimpleObject)]
pub struct HubConfiguration {
    pub context: String,
    pub library_section_id: Option<i64>,
    pub metadata_type: Option<String>,
    pub enabled_hub_types: Vec<String>,
    pub disabled_hub_types: Vec<String>,
}

impl From<HubConfigurationRecord> for HubConfiguration {
    fn from(r: HubConfigurationRecord) -> Self {
        Self {
            context: r.context,
            library_section_id: r.library_section_id,
            metadata_type: r.metadata_type,
            enabled_hub_types: r.enabled_hub_types,
            disabled_hub_types: r.disabled_hub_types,
        }
    }
}

#[derive(SimpleObject)]
pub struct CustomFieldDefinition {
    pub key: String,
    pub label: String,
    pub widget: String,
    pub applicable_metadata_types: Vec<String>,
    pub sort_order: i64,
    pub enabled: bool,
}

impl From<CustomFieldDefinitionRecord> for CustomFieldDefinition {
    fn from(r: CustomFieldDefinitionRecord) -> Self {
        Self {
            key: r.key,
            label: r.label,
            widget: r.widget,
            applicable_metadata_types: r.applicable_metadata_types,
            sort_order: r.sort_order,
            enabled: r.enabled,
        }
    }
}

#[derive(SimpleObject)]
pub struct DetailFieldConfiguration {
    pub metadata_type: String,
    pub library_section_id: Option<i64>,
    pub disabled_builtin_types: Vec<String>,
    pub disabled_custom_field_keys: Vec<String>,
}

impl From<DetailFieldConfigurationRecord> for DetailFieldConfiguration {
    fn from(r: DetailFieldConfigurationRecord) -> Self {
        Self {
            metadata_type: r.metadata_type,
            library_section_id: r.library_section_id,
            disabled_builtin_types: r.disabled_builtin_types,
            disabled_custom_field_keys: r.disabled_custom_field_keys,
        }
    }
}

#[derive(SimpleObject)]
pub struct FieldGroup {
    pub label: String,
    pub layout: String,
    pub collapsible: bool,
}

impl From<FieldGroupRecord> for FieldGroup {
    fn from(r: FieldGroupRecord) -> Self {
        Self { label: r.label, layout: r.layout_type, collapsible: r.collapsible }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum FieldLayoutGql {
    Vertical,
    Horizontal,
    Grid,
}

impl From<FieldLayout> for FieldLayoutGql {
    fn from(l: FieldLayout) -> Self {
        match l {
            FieldLayout::Vertical => FieldLayoutGql::Vertical,
            FieldLayout::Horizontal => FieldLayoutGql::Horizontal,
            FieldLayout::Grid => FieldLayoutGql::Grid,
        }
    }
}

#[derive(SimpleObject)]
pub struct ResolvedFieldGql {
    pub key: String,
    pub label: String,
    pub is_custom: bool,
    pub widget: Option<String>,
}

impl From<ResolvedField> for ResolvedFieldGql {
    fn from(f: ResolvedField) -> Self {
        Self { key: f.key, label: f.label, is_custom: f.is_custom, widget: f.widget }
    }
}

#[derive(SimpleObject)]
pub struct ResolvedFieldGroupGql {
    pub label: String,
    pub layout: FieldLayoutGql,
    pub collapsible: bool,
    pub fields: Vec<ResolvedFieldGql>,
}

impl From<ResolvedFieldGroup> for ResolvedFieldGroupGql {
    fn from(g: ResolvedFieldGroup) -> Self {
        Self {
            label: g.label,
            layout: g.layout.into(),
            collapsible: g.collapsible,
            fields: g.fields.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------------------------
// Job notifications & transcode status
// ---------------------------------------------------------------------------------------------

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum JobTypeGql {
    Scan,
    MetadataRefresh,
    ImageGeneration,
    Trickplay,
    Transcode,
}

impl From<JobType> for JobTypeGql {
    fn from(t: JobType) -> Self {
        match t {
            JobType::Scan => JobTypeGql::Scan,
            JobType::MetadataRefresh => JobTypeGql::MetadataRefresh,
            JobType::ImageGeneration => JobTypeGql::ImageGeneration,
            JobType::Trickplay => JobTypeGql::Trickplay,
            JobType::Transcode => JobTypeGql::Transcode,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum JobStatusGql {
    Pending,
    Running,
    Completed,
    Failed,
}

impl From<JobStatus> for JobStatusGql {
    fn from(s: JobStatus) -> Self {
        match s {
            JobStatus::Pending => JobStatusGql::Pending,
            JobStatus::Running => JobStatusGql::Running,
            JobStatus::Completed => JobStatusGql::Completed,
            JobStatus::Failed => JobStatusGql::Failed,
        }
    }
}

#[derive(SimpleObject, Clone)]
pub struct JobNotification {
    pub library_section_id: i64,
    pub job_type: JobTypeGql,
    pub epoch: u64,
    pub total: i64,
    pub completed: i64,
    pub status: JobStatusGql,
    pub last_update: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl From<JobNotificationSnapshot> for JobNotification {
    fn from(s: JobNotificationSnapshot) -> Self {
        Self {
            library_section_id: s.library_section_id,
            job_type: s.job_type.into(),
            epoch: s.epoch,
            total: s.total,
            completed: s.completed,
            status: s.status.into(),
            last_update: s.last_update,
            error_message: s.error_message,
        }
    }
}

impl From<JobNotificationRecord> for JobNotification {
    fn from(r: JobNotificationRecord) -> Self {
        let job_type = match r.job_type.as_str() {
            "MetadataRefresh" => JobTypeGql::MetadataRefresh,
            "ImageGeneration" => JobTypeGql::ImageGeneration,
            "Trickplay" => JobTypeGql::Trickplay,
            "Transcode" => JobTypeGql::Transcode,
            _ => JobTypeGql::Scan,
        };
        let status = match r.status.as_str() {
            "Running" => JobStatusGql::Running,
            "Completed" => JobStatusGql::Completed,
            "Failed" => JobStatusGql::Failed,
            _ => JobStatusGql::Pending,
        };
        Self {
            library_section_id: r.library_section_id,
            job_type,
            epoch: r.epoch as u64,
            total: r.total,
            completed: r.completed,
            status,
            last_update: r.last_update,
            error_message: r.error_message,
        }
    }
}

#[derive(SimpleObject)]
pub struct TranscodeJobStatus {
    pub uuid: Uuid,
    pub playback_session_id: i64,
    pub protocol: String,
    pub state: String,
    pub progress_pct: f64,
    pub last_segment_index: i64,
}

impl From<TranscodeJobRecord> for TranscodeJobStatus {
    fn from(r: TranscodeJobRecord) -> Self {
        Self {
            uuid: r.uuid,
            playback_session_id: r.playback_session_id,
            protocol: r.protocol,
            state: r.state,
            progress_pct: r.progress_pct,
            last_segment_index: r.last_segment_index,
        }
    }
}

// ---------------------------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------------------------

#[derive(InputObject)]
pub struct ClientCapabilitiesInput {
    pub supported_containers: Vec<String>,
    pub supported_video_codecs: Vec<String>,
    pub supported_audio_codecs: Vec<String>,
    pub max_resolution_height: u32,
    pub max_bitrate_bps: u64,
    pub supports_hdr: bool,
}

impl From<ClientCapabilitiesInput> for ClientCapabilities {
    fn from(i: ClientCapabilitiesInput) -> Self {
        Self {
            supported_containers: i.supported_containers,
            supported_video_codecs: i.supported_video_codecs,
            supported_audio_codecs: i.supported_audio_codecs,
            max_resolution_height: i.max_resolution_height,
            max_bitrate_bps: i.max_bitrate_bps,
            supports_hdr: i.supports_hdr,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum PlaylistSeedKind {
    Single,
    Album,
    Season,
    Show,
    Library,
    Explicit,
}

#[derive(InputObject)]
pub struct PlaylistSeedInput {
    pub kind: PlaylistSeedKind,
    pub item_id: Option<i64>,
    pub album_id: Option<i64>,
    pub season_id: Option<i64>,
    pub show_id: Option<i64>,
    pub library_section_id: Option<i64>,
    pub metadata_type: Option<String>,
    pub item_ids: Option<Vec<i64>>,
}

impl PlaylistSeedInput {
    pub fn into_seed(self) -> async_graphql::Result<PlaylistSeed> {
        Ok(match self.kind {
            PlaylistSeedKind::Single => PlaylistSeed::Single {
                item_id: self.item_id.ok_or_else(|| async_graphql::Error::new("itemId required for Single seed"))?,
            },
            PlaylistSeedKind::Album => PlaylistSeed::Album {
                album_id: self.album_id.ok_or_else(|| async_graphql::Error::new("albumId required for Album seed"))?,
            },
            PlaylistSeedKind::Season => PlaylistSeed::Season {
                season_id: self.season_id.ok_or_else(|| async_graphql::Error::new("seasonId required for Season seed"))?,
            },
            PlaylistSeedKind::Show => PlaylistSeed::Show {
                show_id: self.show_id.ok_or_else(|| async_graphql::Error::new("showId required for Show seed"))?,
            },
            PlaylistSeedKind::Library => PlaylistSeed::Library {
                library_section_id: self
                    .library_section_id
                    .ok_or_else(|| async_graphql::Error::new("librarySectionId required for Library seed"))?,
                metadata_type: self.metadata_type.ok_or_else(|| async_graphql::Error::new("metadataType required for Library seed"))?,
            },
            PlaylistSeedKind::Explicit => PlaylistSeed::Explicit {
                item_ids: self.item_ids.ok_or_else(|| async_graphql::Error::new("itemIds required for Explicit seed"))?,
            },
        })
    }
}

#[derive(InputObject)]
pub struct StartPlaybackInput {
    pub item_id: i64,
    pub seed: Option<PlaylistSeedInput>,
    pub capability_profile_version: Option<i64>,
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum StreamMethodGql {
    DirectPlay,
    DirectStream,
    Transcode,
}

impl From<StreamMethod> for StreamMethodGql {
    fn from(m: StreamMethod) -> Self {
        match m {
            StreamMethod::DirectPlay => StreamMethodGql::DirectPlay,
            StreamMethod::DirectStream => StreamMethodGql::DirectStream,
            StreamMethod::Transcode => StreamMethodGql::Transcode,
        }
    }
}

#[derive(SimpleObject)]
pub struct StreamPlanGql {
    pub method: StreamMethodGql,
    pub container: Option<String>,
    pub duration_ms: i64,
}

impl From<&StreamPlan> for StreamPlanGql {
    fn from(p: &StreamPlan) -> Self {
        Self { method: p.method.into(), container: p.container.clone(), duration_ms: p.duration_ms }
    }
}

#[derive(SimpleObject)]
pub struct PlaylistChunkGql {
    pub items: Vec<Option<i64>>,
    pub start_index: i64,
    pub current_index: i64,
    pub total_count: i64,
    pub has_more: bool,
    pub shuffle: bool,
    pub repeat: bool,
}

impl From<PlaylistChunk> for PlaylistChunkGql {
    fn from(c: PlaylistChunk) -> Self {
        Self {
            items: c.items,
            start_index: c.start_index,
            current_index: c.current_index,
            total_count: c.total_count,
            has_more: c.has_more,
            shuffle: c.shuffle,
            repeat: c.repeat,
        }
    }
}

#[derive(SimpleObject)]
pub struct PlaybackStartResponse {
    pub playback_session_uuid: Uuid,
    pub playlist_generator_uuid: Option<Uuid>,
    pub duration_ms: i64,
    pub stream_plan: StreamPlanGql,
    pub capability_profile_version: i64,
    pub initial_chunk: Option<PlaylistChunkGql>,
}

#[derive(SimpleObject)]
pub struct PlaybackHeartbeatResponse {
    pub capability_version_mismatch: bool,
}

#[derive(SimpleObject)]
pub struct PlaybackDecideResponse {
    pub action: String,
    pub next_chunk: Option<PlaylistChunkGql>,
}

#[derive(SimpleObject)]
pub struct PlaybackSeekResponse {
    pub keyframe_ms: i64,
    pub gop_duration_ms: i64,
    pub has_gop_index: bool,
    pub original_target_ms: i64,
}

#[derive(SimpleObject)]
pub struct PlaybackResumeResponse {
    pub playback_session_uuid: Uuid,
    pub stream_plan: StreamPlanGql,
    pub playhead_ms: i64,
    pub duration_ms: i64,
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum PlaylistDirectionGql {
    Next,
    Previous,
    JumpTo,
}

impl From<PlaylistDirectionGql> for Direction {
    fn from(d: PlaylistDirectionGql) -> Self {
        match d {
            PlaylistDirectionGql::Next => Direction::Next,
            PlaylistDirectionGql::Previous => Direction::Previous,
            PlaylistDirectionGql::JumpTo => Direction::Jump,
        }
    }
}

#[derive(SimpleObject)]
pub struct SuccessResult {
    pub success: bool,
}

#[derive(InputObject)]
pub struct RefreshMetadataInput {
    pub include_children: bool,
    pub override_fields: Vec<String>,
    pub skip_analysis: bool,
}

#[derive(InputObject)]
pub struct SettingsUpdateInput {
    pub max_concurrent_transcodes: Option<i64>,
    pub playback_session_ttl_secs: Option<i64>,
    pub scan_concurrency_override: Option<i64>,
}

#[derive(SimpleObject)]
pub struct SettingsUpdateResult {
    pub restart_required: bool,
}

// ---------------------------------------------------------------------------------------------
// Filesystem browsing
// ---------------------------------------------------------------------------------------------

#[derive(SimpleObject)]
pub struct FilesystemEntry {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
}

// ---------------------------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------------------------

#[derive(SimpleObject, Clone)]
pub struct LogEntry {
    pub id: Option<String>,
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
    pub fields: Option<Json<serde_json::Value>>,
    pub span_name: Option<String>,
}

impl From<LogEvent> for LogEntry {
    fn from(e: LogEvent) -> Self {
        Self {
            id: e.id,
            timestamp: e.timestamp,
            level: e.level,
            target: e.target,
            message: e.message,
            fields: e.fields.map(Json),
            span_name: e.span_name,
        }
    }
}
