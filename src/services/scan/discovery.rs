//! Filesystem discovery (§4.4 Scan Pipeline, discovery stage).
//!
//! Walks a `SectionLocation`'s tree breadth-first — a hand-rolled queue over `tokio::fs::read_dir`
//! rather than `walkdir`'s (depth-first) iterator, since true breadth-first visitation is what lets
//! a resumed scan's checkpoint cursor mean "every directory before this one is fully accounted
//! for". Emits one `DiscoveryEvent` per tracked-or-discovered file; directories are upserted
//! eagerly so later stages can resolve `directory_id`.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::db::library::SectionLocationRecord;
use crate::db::Database;

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "mov", "wmv", "flv", "webm", "mpeg", "mpg", "ts", "m2ts",
];
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "ogg", "opus", "wav", "aac", "wma"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryKind {
    Seen,
    Added,
    Modified,
    Missing,
}

#[derive(Debug, Clone)]
pub struct DiscoveryEvent {
    pub library_section_id: i64,
    pub section_location_id: i64,
    pub directory_id: Option<i64>,
    pub absolute_path: String,
    pub size_bytes: u64,
    pub mtime: DateTime<Utc>,
    pub kind: DiscoveryKind,
}

/// Resumable cursor persisted alongside entity updates (§4.4 checkpointing/resume).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanCheckpoint {
    pub cursor_directory_id: Option<i64>,
    pub processed_files: i64,
    pub added: i64,
    pub modified: i64,
    pub removed: i64,
    pub errors: Vec<String>,
}

/// Walks `location`'s tree, sending `DiscoveryEvent`s to `tx`, writing a checkpoint to `scan_uuid`
/// every `checkpoint_every` directories. Hidden directories and any directory containing a
/// `.nomedia` marker are skipped entirely.
pub async fn discover(
    db: &Database,
    location: &SectionLocationRecord,
    scan_uuid: Uuid,
    checkpoint_every: usize,
    cancel: CancellationToken,
    tx: mpsc::Sender<DiscoveryEvent>,
) -> Result<ScanCheckpoint> {
    let section = db
        .library_sections()
        .get_by_id(location.library_section_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("library section {} not found", location.library_section_id))?;

    let directories_repo = db.directories();
    let parts_repo = db.media_parts();

    let mut checkpoint = ScanCheckpoint::default();
    let mut seen_paths: HashSet<String> = HashSet::new();
    let mut dirs_since_checkpoint = 0usize;

    let root = PathBuf::from(&location.root_path);
    let mut queue: VecDeque<(PathBuf, Option<i64>)> = VecDeque::new();
    queue.push_back((root.clone(), None));

    while let Some((dir_path, parent_id)) = queue.pop_front() {
        if cancel.is_cancelled() {
            break;
        }
        if dir_path.join(".nomedia").exists() {
            continue;
        }

        let dir_path_str = dir_path.to_string_lossy().to_string();
        let directory = directories_repo
            .upsert(location.id, parent_id, &dir_path_str, Utc::now())
            .await?;

        let mut entries = match tokio::fs::read_dir(&dir_path).await {
            Ok(e) => e,
            Err(e) => {
                checkpoint.errors.push(format!("{dir_path_str}: {e}"));
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(e)) => e,
                Ok(None) => break,
                Err(e) => {
                    checkpoint.errors.push(e.to_string());
                    break;
                }
            };

            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(_) => continue,
            };

            let name_is_hidden = entry.file_name().to_string_lossy().starts_with('.');
            if file_type.is_dir() {
                if !name_is_hidden {
                    queue.push_back((path, Some(directory.id)));
                }
                continue;
            }
            if name_is_hidden {
                continue;
            }

            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            let ext = ext.to_lowercase();
            if !VIDEO_EXTENSIONS.contains(&ext.as_str()) && !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }

            let absolute_path = path.to_string_lossy().to_string();
            seen_paths.insert(absolute_path.clone());

            let meta = match tokio::fs::metadata(&path).await {
                Ok(m) => m,
                Err(e) => {
                    checkpoint.errors.push(format!("{absolute_path}: {e}"));
                    continue;
                }
            };
            let size_bytes = meta.len();
            let mtime: DateTime<Utc> = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            let existing = parts_repo.get_by_path(section.id, &absolute_path).await?;
            let kind = match &existing {
                None => {
                    checkpoint.added += 1;
                    DiscoveryKind::Added
                }
                Some(part)
                    if part.size_bytes as u64 != size_bytes || part.mtime_seen < mtime =>
                {
                    checkpoint.modified += 1;
                    DiscoveryKind::Modified
                }
                Some(_) => DiscoveryKind::Seen,
            };
            checkpoint.processed_files += 1;

            let event = DiscoveryEvent {
                library_section_id: section.id,
                section_location_id: location.id,
                directory_id: Some(directory.id),
                absolute_path,
                size_bytes,
                mtime,
                kind,
            };
            if tx.send(event).await.is_err() {
                return Ok(checkpoint);
            }
        }

        dirs_since_checkpoint += 1;
        if dirs_since_checkpoint >= checkpoint_every {
            checkpoint.cursor_directory_id = Some(directory.id);
            db.library_scans()
                .checkpoint(scan_uuid, &serde_json::to_value(&checkpoint)?, checkpoint.processed_files)
                .await?;
            dirs_since_checkpoint = 0;
        }
    }

    for part in parts_repo.list_under_root(section.id, &root.to_string_lossy()).await? {
        if seen_paths.contains(&part.absolute_path) {
            continue;
        }
        checkpoint.removed += 1;
        let _ = tx
            .send(DiscoveryEvent {
                library_section_id: section.id,
                section_location_id: location.id,
                directory_id: part.directory_id,
                absolute_path: part.absolute_path,
                size_bytes: part.size_bytes as u64,
                mtime: part.mtime_seen,
                kind: DiscoveryKind::Missing,
            })
            .await;
    }

    debug!(
        root = %root.display(), added = checkpoint.added, modified = checkpoint.modified,
        removed = checkpoint.removed, "discovery pass complete",
    );
    Ok(checkpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::library::{CreateLibrarySection, CreateSectionLocation};

    async fn memory_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn discover_emits_added_for_new_video_file() {
        let db = memory_db().await;
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join("Movie.mkv"), b"data").await.unwrap();

        let section = db
            .library_sections()
            .create(CreateLibrarySection {
                name: "Movies".into(),
                section_type: "movie".into(),
                settings: serde_json::json!({}),
            })
            .await
            .unwrap();
        let location = db
            .section_locations()
            .create(CreateSectionLocation {
                library_section_id: section.id,
                root_path: tmp.path().to_string_lossy().to_string(),
                watch_depth: 3,
                poll_interval_secs: 60,
            })
            .await
            .unwrap();
        let scan = db.library_scans().begin(section.id).await.unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let checkpoint = discover(&db, &location, scan.uuid, 100, CancellationToken::new(), tx)
            .await
            .unwrap();

        assert_eq!(checkpoint.added, 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, DiscoveryKind::Added);
        assert!(event.absolute_path.ends_with("Movie.mkv"));
    }

    #[tokio::test]
    async fn discover_skips_nomedia_directories() {
        let db = memory_db().await;
        let tmp = tempfile::tempdir().unwrap();
        let skipped = tmp.path().join("skipped");
        tokio::fs::create_dir(&skipped).await.unwrap();
        tokio::fs::write(skipped.join(".nomedia"), b"").await.unwrap();
        tokio::fs::write(skipped.join("Hidden.mkv"), b"data").await.unwrap();

        let section = db
            .library_sections()
            .create(CreateLibrarySection {
                name: "Movies".into(),
                section_type: "movie".into(),
                settings: serde_json::json!({}),
            })
            .await
            .unwrap();
        let location = db
            .section_locations()
            .create(CreateSectionLocation {
                library_section_id: section.id,
                root_path: tmp.path().to_string_lossy().to_string(),
                watch_depth: 3,
                poll_interval_secs: 60,
            })
            .await
            .unwrap();
        let scan = db.library_scans().begin(section.id).await.unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let checkpoint = discover(&db, &location, scan.uuid, 100, CancellationToken::new(), tx)
            .await
            .unwrap();

        assert_eq!(checkpoint.added, 0);
        assert!(rx.try_recv().is_err());
    }
}
