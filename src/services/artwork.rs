//! Artwork selection & local caching (part of §4.4 Image providers / image orchestrator).
//!
//! Candidate images are downloaded, hashed for a stable cache key, and written atomically under
//! `Paths::artwork_dir(uuid)/<role>.<ext>`, replacing the reference stack's remote-bucket upload
//! with the filesystem layout this crate's §6 fixes for selected artwork.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::paths::{atomic_write, Paths};

/// Artwork role within a metadata item's artwork directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkRole {
    Poster,
    Backdrop,
    Thumbnail,
    Banner,
    Logo,
}

impl ArtworkRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtworkRole::Poster => "poster",
            ArtworkRole::Backdrop => "backdrop",
            ArtworkRole::Thumbnail => "thumbnail",
            ArtworkRole::Banner => "banner",
            ArtworkRole::Logo => "logo",
        }
    }
}

/// A cached artwork result: the on-disk path and a thumb-hash-style content hash usable as a
/// blurhash-placeholder key.
#[derive(Debug, Clone)]
pub struct CachedArtwork {
    pub path: std::path::PathBuf,
    pub thumb_hash: String,
}

/// Downloads, hashes and atomically writes one candidate image for `item_uuid`/`role`.
///
/// Returns the cached artwork on success; image providers further up the selection precedence
/// chain (local sidecar > embedded > remote agents) call this only for the winning candidate.
pub async fn cache_artwork(
    http_client: &reqwest::Client,
    paths: &Paths,
    item_uuid: Uuid,
    role: ArtworkRole,
    source_url: &str,
) -> Result<CachedArtwork> {
    debug!(url = %source_url, role = %role.as_str(), item = %item_uuid, "Downloading artwork candidate");

    let response = http_client
        .get(source_url)
        .send()
        .await
        .context("failed to download artwork")?;

    if !response.status().is_success() {
        anyhow::bail!("artwork download failed with status {}", response.status());
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();

    let bytes = response.bytes().await.context("failed to read artwork bytes")?;
    let extension = infer::get(&bytes)
        .map(|kind| kind.extension().to_string())
        .unwrap_or_else(|| extension_from_content_type(&content_type));

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let thumb_hash = format!("{:x}", hasher.finalize());

    let dest = paths.artwork_dir(&item_uuid).join(format!("{}.{extension}", role.as_str()));
    atomic_write(paths, &dest, &bytes).await?;

    info!(path = %dest.display(), role = %role.as_str(), "Artwork cached");

    Ok(CachedArtwork {
        path: dest,
        thumb_hash,
    })
}

/// Caches artwork, swallowing failures: image selection must not fail a whole refresh because
/// one candidate's download failed — the caller just moves on to the next candidate.
pub async fn cache_artwork_optional(
    http_client: &reqwest::Client,
    paths: &Paths,
    item_uuid: Uuid,
    role: ArtworkRole,
    source_url: Option<&str>,
) -> Option<CachedArtwork> {
    let url = source_url?;
    match cache_artwork(http_client, paths, item_uuid, role, url).await {
        Ok(cached) => Some(cached),
        Err(e) => {
            warn!(error = %e, url = %url, "failed to cache artwork candidate, skipping");
            None
        }
    }
}

/// Removes every cached role for an item, used when an item is deleted or artwork is
/// re-selected from scratch.
pub async fn delete_item_artwork(paths: &Paths, item_uuid: Uuid) -> Result<()> {
    let dir = paths.artwork_dir(&item_uuid);
    if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(&dir)
            .await
            .with_context(|| format!("failed to remove artwork directory {}", dir.display()))?;
    }
    Ok(())
}

fn extension_from_content_type(content_type: &str) -> String {
    match content_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_strings_are_stable() {
        assert_eq!(ArtworkRole::Poster.as_str(), "poster");
        assert_eq!(ArtworkRole::Backdrop.as_str(), "backdrop");
    }

    #[test]
    fn extension_falls_back_by_content_type() {
        assert_eq!(extension_from_content_type("image/png"), "png");
        assert_eq!(extension_from_content_type("image/webp"), "webp");
        assert_eq!(extension_from_content_type("image/jpeg"), "jpg");
    }

    #[tokio::test]
    async fn delete_item_artwork_is_noop_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths {
            data: tmp.path().join("data"),
            db: tmp.path().join("data/db"),
            index: tmp.path().join("data/index"),
            cache: tmp.path().join("cache"),
            media_cache: tmp.path().join("cache/media"),
            transcodes: tmp.path().join("cache/transcodes"),
            log: tmp.path().join("logs"),
            temp: tmp.path().join("tmp"),
            backup: tmp.path().join("data/backup"),
        };
        delete_item_artwork(&paths, Uuid::new_v4()).await.unwrap();
    }
}
