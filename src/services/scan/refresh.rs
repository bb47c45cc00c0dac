//! Refresh orchestrator (§4.4 Scan Pipeline, single-item refresh).
//!
//! Fans an item's configured agents out in precedence order, merges the results under
//! `locked_fields` (a locked field is skipped unless the caller's `override_fields` names it
//! explicitly), upserts credits, and selects poster/backdrop artwork from the same payloads —
//! image selection needs the full, precedence-ordered candidate list, so it runs after fan-out
//! rather than in parallel with it.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::db::Database;
use crate::paths::Paths;

use super::agents::{fan_out, AgentClientFactory, MetadataAgent};
use super::credits::apply_credits;
use super::dedup::DedupService;
use super::images::{select_and_cache, ImageKind};

#[derive(Debug, Clone, Default)]
pub struct RefreshOptions {
    pub override_fields: HashSet<String>,
    pub skip_analysis: bool,
}

/// Follow-up job kinds the caller should schedule after a successful refresh.
pub const FOLLOWUP_FILE_ANALYSIS: &str = "FileAnalysis";
pub const FOLLOWUP_TRICKPLAY: &str = "Trickplay";

/// Runs the full per-item refresh and returns the follow-up jobs the caller should schedule
/// (empty when `options.skip_analysis` is set).
#[allow(clippy::too_many_arguments)]
pub async fn refresh_item(
    db: &Database,
    dedup: &DedupService,
    client_factory: &AgentClientFactory,
    remote_semaphore: &Semaphore,
    http_client: &reqwest::Client,
    paths: &Paths,
    item_uuid: Uuid,
    metadata_item_id: i64,
    library_section_id: i64,
    agents: &[Arc<dyn MetadataAgent>],
    options: &RefreshOptions,
) -> Result<Vec<&'static str>> {
    let existing = db
        .metadata_items()
        .get_by_id(metadata_item_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("metadata item {metadata_item_id} not found"))?;

    let payloads = fan_out(agents, client_factory, remote_semaphore, &existing.title, existing.year).await;

    let locked: HashSet<&str> = existing.locked_fields.iter().map(String::as_str).collect();
    let can_write = |field: &str| !locked.contains(field) || options.override_fields.contains(field);

    let mut summary = None;
    let mut tagline = None;
    let mut content_rating = None;
    let mut external_ids = existing.external_ids.as_object().cloned().unwrap_or_default();

    for (_agent_name, payload) in &payloads {
        if summary.is_none() && can_write("summary") {
            summary = payload.summary.clone();
        }
        if tagline.is_none() && can_write("tagline") {
            tagline = payload.tagline.clone();
        }
        if content_rating.is_none() && can_write("content_rating") {
            content_rating = payload.content_rating.clone();
        }
        for (provider, id) in &payload.external_ids {
            external_ids.entry(provider.clone()).or_insert_with(|| serde_json::json!(id));
        }
    }

    db.metadata_items()
        .apply_refresh(
            metadata_item_id,
            summary.as_deref(),
            tagline.as_deref(),
            content_rating.as_deref(),
            &serde_json::Value::Object(external_ids),
        )
        .await?;

    for (_agent_name, payload) in &payloads {
        if !payload.people.is_empty() || !payload.groups.is_empty() {
            apply_credits(db, dedup, library_section_id, metadata_item_id, &payload.people, &payload.groups).await?;
        }
    }

    select_and_cache(db, http_client, paths, item_uuid, metadata_item_id, ImageKind::Poster, &payloads).await?;
    select_and_cache(db, http_client, paths, item_uuid, metadata_item_id, ImageKind::Backdrop, &payloads).await?;

    if options.skip_analysis {
        Ok(Vec::new())
    } else {
        Ok(vec![FOLLOWUP_FILE_ANALYSIS, FOLLOWUP_TRICKPLAY])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::scan::agents::{AgentCategory, AgentPayload};
    use async_trait::async_trait;
    use serde_json::json;

    struct StubAgent {
        payload: AgentPayload,
    }

    #[async_trait]
    impl MetadataAgent for StubAgent {
        fn name(&self) -> &str {
            "stub"
        }

        fn category(&self) -> AgentCategory {
            AgentCategory::Remote
        }

        async fn fetch(
            &self,
            _client: &crate::services::rate_limiter::RateLimitedClient,
            _title: &str,
            _year: Option<i64>,
        ) -> Result<Option<AgentPayload>> {
            Ok(Some(self.payload.clone()))
        }
    }

    fn test_paths(tmp: &tempfile::TempDir) -> Paths {
        Paths {
            data: tmp.path().join("data"),
            db: tmp.path().join("data/db"),
            index: tmp.path().join("data/index"),
            cache: tmp.path().join("cache"),
            media_cache: tmp.path().join("cache/media"),
            transcodes: tmp.path().join("cache/transcodes"),
            log: tmp.path().join("logs"),
            temp: tmp.path().join("tmp"),
            backup: tmp.path().join("data/backup"),
        }
    }

    #[tokio::test]
    async fn refresh_item_applies_summary_and_schedules_followups() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let section = db
            .library_sections()
            .create(crate::db::library::CreateLibrarySection {
                name: "Movies".into(),
                section_type: "movie".into(),
                settings: json!({}),
            })
            .await
            .unwrap();
        let item = db
            .metadata_items()
            .create(crate::db::metadata::CreateMetadataItem {
                library_section_id: section.id,
                metadata_type: "Movie".into(),
                title: "Inception".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let dedup = DedupService::new(db.clone());
        let client_factory = AgentClientFactory::new();
        let semaphore = Semaphore::new(3);
        let http_client = reqwest::Client::new();
        let tmp = tempfile::tempdir().unwrap();
        let paths = test_paths(&tmp);

        let agent: Arc<dyn MetadataAgent> = Arc::new(StubAgent {
            payload: AgentPayload {
                summary: Some("A dream within a dream.".into()),
                ..Default::default()
            },
        });

        let followups = refresh_item(
            &db,
            &dedup,
            &client_factory,
            &semaphore,
            &http_client,
            &paths,
            item.uuid,
            item.id,
            section.id,
            &[agent],
            &RefreshOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(followups, vec![FOLLOWUP_FILE_ANALYSIS, FOLLOWUP_TRICKPLAY]);

        let refreshed = db.metadata_items().get_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(refreshed.summary.as_deref(), Some("A dream within a dream."));
    }

    #[tokio::test]
    async fn refresh_item_skips_locked_field() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let section = db
            .library_sections()
            .create(crate::db::library::CreateLibrarySection {
                name: "Movies".into(),
                section_type: "movie".into(),
                settings: json!({}),
            })
            .await
            .unwrap();
        let item = db
            .metadata_items()
            .create(crate::db::metadata::CreateMetadataItem {
                library_section_id: section.id,
                metadata_type: "Movie".into(),
                title: "Inception".into(),
                summary: Some("User-written summary.".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        db.metadata_items().lock_field(item.id, "summary").await.unwrap();

        let dedup = DedupService::new(db.clone());
        let client_factory = AgentClientFactory::new();
        let semaphore = Semaphore::new(3);
        let http_client = reqwest::Client::new();
        let tmp = tempfile::tempdir().unwrap();
        let paths = test_paths(&tmp);

        let agent: Arc<dyn MetadataAgent> = Arc::new(StubAgent {
            payload: AgentPayload {
                summary: Some("Agent summary that should be ignored.".into()),
                ..Default::default()
            },
        });

        refresh_item(
            &db,
            &dedup,
            &client_factory,
            &semaphore,
            &http_client,
            &paths,
            item.uuid,
            item.id,
            section.id,
            &[agent],
            &RefreshOptions::default(),
        )
        .await
        .unwrap();

        let refreshed = db.metadata_items().get_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(refreshed.summary.as_deref(), Some("User-written summary."));
    }
}
