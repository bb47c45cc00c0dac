//! Database connection and repository access.

pub mod hub;
pub mod library;
pub mod logs;
pub mod media;
pub mod metadata;
pub mod notifications;
pub mod playback;
pub mod playlist;
pub mod scan;
pub mod users;
mod util;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub use hub::{CustomFieldDefinitionRepository, DetailFieldConfigurationRepository, FieldGroupRepository, HubConfigurationRepository};
pub use library::{LibrarySectionRepository, SectionLocationRepository};
pub use logs::AppLogRepository;
pub use media::{DirectoryRepository, MediaItemRepository, MediaPartRepository, StreamRepository};
pub use metadata::{MetadataItemRepository, MetadataRelationRepository};
pub use notifications::JobNotificationRepository;
pub use playback::{CapabilityProfileRepository, PlaybackSessionRepository, TranscodeJobRepository};
pub use playlist::PlaylistGeneratorRepository;
pub use scan::LibraryScanRepository;
pub use users::UsersRepository;

/// Database wrapper providing connection pool access and one accessor per repository.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn users(&self) -> UsersRepository {
        UsersRepository::new(self.pool.clone())
    }

    pub fn logs(&self) -> AppLogRepository {
        AppLogRepository::new(self.pool.clone())
    }

    pub fn job_notifications(&self) -> JobNotificationRepository {
        JobNotificationRepository::new(self.pool.clone())
    }

    pub fn library_sections(&self) -> LibrarySectionRepository {
        LibrarySectionRepository::new(self.pool.clone())
    }

    pub fn section_locations(&self) -> SectionLocationRepository {
        SectionLocationRepository::new(self.pool.clone())
    }

    pub fn metadata_items(&self) -> MetadataItemRepository {
        MetadataItemRepository::new(self.pool.clone())
    }

    pub fn metadata_relations(&self) -> MetadataRelationRepository {
        MetadataRelationRepository::new(self.pool.clone())
    }

    pub fn directories(&self) -> DirectoryRepository {
        DirectoryRepository::new(self.pool.clone())
    }

    pub fn media_items(&self) -> MediaItemRepository {
        MediaItemRepository::new(self.pool.clone())
    }

    pub fn media_parts(&self) -> MediaPartRepository {
        MediaPartRepository::new(self.pool.clone())
    }

    pub fn streams(&self) -> StreamRepository {
        StreamRepository::new(self.pool.clone())
    }

    pub fn library_scans(&self) -> LibraryScanRepository {
        LibraryScanRepository::new(self.pool.clone())
    }

    pub fn playback_sessions(&self) -> PlaybackSessionRepository {
        PlaybackSessionRepository::new(self.pool.clone())
    }

    pub fn capability_profiles(&self) -> CapabilityProfileRepository {
        CapabilityProfileRepository::new(self.pool.clone())
    }

    pub fn transcode_jobs(&self) -> TranscodeJobRepository {
        TranscodeJobRepository::new(self.pool.clone())
    }

    pub fn playlist_generators(&self) -> PlaylistGeneratorRepository {
        PlaylistGeneratorRepository::new(self.pool.clone())
    }

    pub fn hub_configurations(&self) -> HubConfigurationRepository {
        HubConfigurationRepository::new(self.pool.clone())
    }

    pub fn custom_field_definitions(&self) -> CustomFieldDefinitionRepository {
        CustomFieldDefinitionRepository::new(self.pool.clone())
    }

    pub fn detail_field_configurations(&self) -> DetailFieldConfigurationRepository {
        DetailFieldConfigurationRepository::new(self.pool.clone())
    }

    pub fn field_groups(&self) -> FieldGroupRepository {
        FieldGroupRepository::new(self.pool.clone())
    }
}
