//! Resolver (§4.4 Scan Pipeline, resolver stage).
//!
//! Groups discovered files into their owning `MetadataItem`/`MediaItem`/`MediaPart`. Movies are
//! one file per item; multi-part files (`pt1`/`pt2`, `cd1`/`cd2`) share a `MediaItem` across
//! several `MediaPart`s. Episodic naming is parsed with the `S01E02`/`1x02`/date-based regex set
//! from [`crate::services::filename_parser`]. External ids pre-extracted from `{tmdb-603}`-style
//! filename tags are handed to the dedup service; files carrying none fall back to a hash of the
//! normalized group key and library section so repeat scans still land on the same item.

use anyhow::Result;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::db::media::{CreateMediaItem, CreateMediaPart, MediaPartRecord};
use crate::db::metadata::CreateMetadataItem;
use crate::db::Database;
use crate::services::filename_parser;

use super::dedup::DedupService;
use super::discovery::{DiscoveryEvent, DiscoveryKind};

static EXTERNAL_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)-(\w+)\}").unwrap());
const PART_PREFIXES: &[&str] = &["pt", "cd", "part", "disc"];

pub enum LibraryKind {
    Movie,
    Episodic,
    Music,
    Other,
}

pub fn library_kind(section_type: &str) -> LibraryKind {
    match section_type {
        "movie" => LibraryKind::Movie,
        "tv" | "show" | "episodic" => LibraryKind::Episodic,
        "music" => LibraryKind::Music,
        _ => LibraryKind::Other,
    }
}

fn part_index_from_stem(stem: &str) -> i64 {
    let lower = stem.to_lowercase();
    for prefix in PART_PREFIXES {
        if let Some(pos) = lower.rfind(prefix) {
            let rest = &lower[pos + prefix.len()..];
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            if let Ok(n) = digits.parse::<i64>() {
                if n > 0 {
                    return n;
                }
            }
        }
    }
    1
}

fn normalized_group_key(stem: &str, part_index: i64) -> String {
    if part_index <= 1 {
        return stem.to_string();
    }
    let lower = stem.to_lowercase();
    for prefix in PART_PREFIXES {
        if let Some(pos) = lower.rfind(prefix) {
            return stem[..pos].trim_end_matches(['.', '_', ' ', '-']).to_string();
        }
    }
    stem.to_string()
}

fn extract_external_ids(filename: &str) -> Vec<(String, String)> {
    EXTERNAL_ID_RE
        .captures_iter(filename)
        .map(|c| (c[1].to_lowercase(), c[2].to_string()))
        .collect()
}

fn fallback_external_id(group_key: &str, library_section_id: i64) -> (String, String) {
    let mut hasher = Sha256::new();
    hasher.update(group_key.as_bytes());
    hasher.update(library_section_id.to_le_bytes());
    ("path".to_string(), format!("{:x}", hasher.finalize()))
}

/// Resolves one `Added`/`Modified` discovery event into its durable rows. `Seen` events are a
/// no-op; `Missing` events mark the tracked part's `missing_since` rather than deleting outright,
/// leaving the grace-period sweep (§4.5) to decide when a vanished file is really gone.
pub async fn resolve(
    db: &Database,
    dedup: &DedupService,
    section_type: &str,
    event: DiscoveryEvent,
) -> Result<Option<MediaPartRecord>> {
    let parts_repo = db.media_parts();

    match event.kind {
        DiscoveryKind::Missing => {
            if let Some(part) = parts_repo
                .get_by_path(event.library_section_id, &event.absolute_path)
                .await?
            {
                parts_repo.set_missing_since(part.id, Some(Utc::now())).await?;
            }
            return Ok(None);
        }
        DiscoveryKind::Seen => return Ok(None),
        DiscoveryKind::Added | DiscoveryKind::Modified => {}
    }

    let path = std::path::Path::new(&event.absolute_path);
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or(&event.absolute_path);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
    let part_index = part_index_from_stem(stem);
    let group_key = normalized_group_key(stem, part_index);

    let mut external_ids = extract_external_ids(filename);
    if external_ids.is_empty() {
        external_ids.push(fallback_external_id(&group_key, event.library_section_id));
    }

    let (metadata_type, title, year) = match library_kind(section_type) {
        LibraryKind::Episodic => {
            let parsed = filename_parser::parse_episode(filename);
            ("Episode".to_string(), parsed.show_name.unwrap_or_else(|| group_key.clone()), parsed.year)
        }
        LibraryKind::Music => ("Track".to_string(), group_key.clone(), None),
        _ => {
            let parsed = filename_parser::parse_movie(filename);
            ("Movie".to_string(), parsed.show_name.unwrap_or_else(|| group_key.clone()), parsed.year)
        }
    };

    let external_ids_for_create = external_ids.clone();
    let library_section_id = event.library_section_id;
    let metadata_item = dedup
        .resolve_or_create(library_section_id, &external_ids, move || {
            let external_ids_json: std::collections::HashMap<String, String> =
                external_ids_for_create.into_iter().collect();
            async move {
                Ok(CreateMetadataItem {
                    library_section_id,
                    metadata_type,
                    title,
                    year: year.map(i64::from),
                    external_ids: json!(external_ids_json),
                    ..Default::default()
                })
            }
        })
        .await?;

    let media_item = match db.media_items().list_for_metadata_item(metadata_item.id).await?.into_iter().next() {
        Some(existing) => existing,
        None => {
            db.media_items()
                .create(CreateMediaItem {
                    metadata_item_id: metadata_item.id,
                    container: path.extension().and_then(|e| e.to_str()).map(str::to_lowercase),
                    ..Default::default()
                })
                .await?
        }
    };

    let existing_part = parts_repo.get_by_path(event.library_section_id, &event.absolute_path).await?;
    let part = match existing_part {
        Some(part) => {
            parts_repo.touch_mtime(part.id, event.mtime).await?;
            parts_repo.set_missing_since(part.id, None).await?;
            if matches!(event.kind, DiscoveryKind::Modified) {
                db.streams().clear_for_part(part.id).await?;
            }
            part
        }
        None => {
            parts_repo
                .create(CreateMediaPart {
                    media_item_id: media_item.id,
                    directory_id: event.directory_id,
                    library_section_id: event.library_section_id,
                    part_index,
                    absolute_path: event.absolute_path.clone(),
                    size_bytes: event.size_bytes as i64,
                    mtime_seen: event.mtime,
                })
                .await?
        }
    };

    Ok(Some(part))
}
