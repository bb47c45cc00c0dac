//! Image orchestrator (§4.4 Scan Pipeline, image-selector stage).
//!
//! Agent payloads already carry whatever poster/backdrop URL that agent found, in the same
//! precedence order `fan_out` ran them in (local sidecar > embedded > enabled remote agents).
//! Selection is just "first candidate in that order", cached locally with
//! [`crate::services::artwork::cache_artwork_optional`] and persisted onto the `MetadataItem`.

use anyhow::Result;
use uuid::Uuid;

use crate::db::Database;
use crate::paths::Paths;
use crate::services::artwork::{cache_artwork_optional, ArtworkRole};

use super::agents::AgentPayload;

#[derive(Debug, Clone, Copy)]
pub enum ImageKind {
    Poster,
    Backdrop,
}

impl ImageKind {
    fn role(self) -> ArtworkRole {
        match self {
            ImageKind::Poster => ArtworkRole::Poster,
            ImageKind::Backdrop => ArtworkRole::Backdrop,
        }
    }
}

/// Picks the first non-empty candidate in `ranked_payloads`' order and caches it, persisting the
/// cached path and hash onto the item. Returns `false` if no agent supplied a candidate, or the
/// winning candidate failed to download.
pub async fn select_and_cache(
    db: &Database,
    http_client: &reqwest::Client,
    paths: &Paths,
    item_uuid: Uuid,
    metadata_item_id: i64,
    kind: ImageKind,
    ranked_payloads: &[(String, AgentPayload)],
) -> Result<bool> {
    let url = ranked_payloads.iter().find_map(|(_, payload)| match kind {
        ImageKind::Poster => payload.poster_url.as_deref(),
        ImageKind::Backdrop => payload.backdrop_url.as_deref(),
    });

    let Some(cached) = cache_artwork_optional(http_client, paths, item_uuid, kind.role(), url).await else {
        return Ok(false);
    };

    let path = cached.path.to_string_lossy().to_string();
    match kind {
        ImageKind::Poster => db.metadata_items().set_thumb(metadata_item_id, &path, &cached.thumb_hash).await?,
        ImageKind::Backdrop => db.metadata_items().set_art(metadata_item_id, &path, &cached.thumb_hash).await?,
    }

    Ok(true)
}
