//! Filesystem watcher & coalescer (§4.5 Watcher & Micro-scan).
//!
//! Generalizes the reference stack's `DirectoryChangeEvent` broadcast (`services/filesystem.rs`)
//! from one raw event to a coalesced batch, per `SectionLocation`: subdirectories up to
//! `watch_depth` receive a native `notify` watch; deeper subtrees are polled every
//! `poll_interval`. Raw events are grouped by their nearest tracked directory, transient
//! Create+Delete pairs within [`TRANSIENT_WINDOW`] are dropped as rename/temp-file noise, and
//! each group is flushed as one [`CoalescedChangeEvent`] [`DEBOUNCE`] after its last event. A
//! flushed event feeds [`micro_scan`], a restricted discovery+resolver+refresh pass over just the
//! affected paths rather than a full tree walk. A watcher error marks the section
//! `requires_full_rescan` until a subsequent full scan clears it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify::event::RenameMode;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db::library::{SectionLocationRecord, UpdateLibrarySection};
use crate::db::Database;
use crate::paths::Paths;

use super::agents::{AgentClientFactory, MetadataAgent};
use super::dedup::DedupService;
use super::discovery::{DiscoveryEvent, DiscoveryKind};
use super::refresh::{refresh_item, RefreshOptions};
use super::resolver::resolve;

/// Debounce window: a group flushes this long after its most recent raw event.
pub const DEBOUNCE: Duration = Duration::from_secs(2);
/// A Create immediately followed by a Delete for the same path inside this window is dropped —
/// most editors and downloaders write through a temp file and rename/replace it.
pub const TRANSIENT_WINDOW: Duration = Duration::from_millis(500);
const COALESCE_TICK: Duration = Duration::from_millis(250);
const RAW_CHANNEL_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
    Renamed,
}

#[derive(Debug, Clone)]
pub struct CoalescedChangeEvent {
    pub library_section_id: i64,
    pub paths: HashSet<PathBuf>,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone)]
struct RawChange {
    path: PathBuf,
    kind: ChangeKind,
}

enum WatchMessage {
    Change(RawChange),
    Error(String),
}

/// Maps a raw `notify::Event` to zero or more [`RawChange`]s, dropping anything deeper than
/// `watch_depth` under `root` — those paths are left for the poller instead.
fn raw_changes_from_event(event: &Event, root: &Path, watch_depth: i64) -> Vec<RawChange> {
    let kind = match &event.kind {
        EventKind::Create(_) => ChangeKind::Added,
        EventKind::Modify(notify::event::ModifyKind::Name(RenameMode::From)) => ChangeKind::Removed,
        EventKind::Modify(notify::event::ModifyKind::Name(RenameMode::To)) => ChangeKind::Added,
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => ChangeKind::Renamed,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter(|p| depth_under(root, p).is_some_and(|d| d <= watch_depth))
        .map(|p| RawChange { path: p.clone(), kind })
        .collect()
}

fn depth_under(root: &Path, path: &Path) -> Option<i64> {
    path.strip_prefix(root).ok().map(|rel| rel.components().count() as i64)
}

fn spawn_native_watch(
    root: PathBuf,
    watch_depth: i64,
    tx: mpsc::Sender<WatchMessage>,
) -> Result<RecommendedWatcher> {
    let (std_tx, std_rx) = std::sync::mpsc::channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = std_tx.send(res);
    })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;

    tokio::task::spawn_blocking(move || {
        while let Ok(res) = std_rx.recv() {
            match res {
                Ok(event) => {
                    for change in raw_changes_from_event(&event, &root, watch_depth) {
                        if tx.blocking_send(WatchMessage::Change(change)).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    if tx.blocking_send(WatchMessage::Error(e.to_string())).is_err() {
                        return;
                    }
                }
            }
        }
    });

    Ok(watcher)
}

/// Polls subtrees deeper than `watch_depth` every `poll_interval`, comparing size/mtime against
/// tracked `media_parts` rows and emitting synthetic Added/Modified changes for anything that
/// moved. Shallower paths are covered by the native watch and skipped here.
async fn poll_once(db: &Database, location: &SectionLocationRecord, tx: &mpsc::Sender<WatchMessage>) {
    let root = PathBuf::from(&location.root_path);
    let mut stack = vec![(root.clone(), 0i64)];
    while let Some((dir, depth)) = stack.pop() {
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else { continue };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let Ok(file_type) = entry.file_type().await else { continue };
            if file_type.is_dir() {
                if depth + 1 > location.watch_depth {
                    stack.push((path, depth + 1));
                }
                continue;
            }
            if depth + 1 <= location.watch_depth {
                continue;
            }

            let Ok(meta) = entry.metadata().await else { continue };
            let existing = db
                .media_parts()
                .get_by_path(location.library_section_id, &path.to_string_lossy())
                .await
                .ok()
                .flatten();
            let kind = match &existing {
                None => ChangeKind::Added,
                Some(part) if part.size_bytes as u64 != meta.len() => ChangeKind::Modified,
                _ => continue,
            };
            let _ = tx.send(WatchMessage::Change(RawChange { path, kind })).await;
        }
    }
}

fn spawn_poller(db: Database, location: SectionLocationRecord, tx: mpsc::Sender<WatchMessage>, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(location.poll_interval_secs.max(1) as u64));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => poll_once(&db, &location, &tx).await,
            }
        }
    });
}

/// Per-group accumulator the coalescer tracks between flushes.
struct PendingGroup {
    paths: HashSet<PathBuf>,
    kind: ChangeKind,
    last_event: Instant,
}

/// Walks `path`'s ancestors looking for the closest one tracked as a `Directory` row, falling
/// back to the immediate parent when nothing is tracked yet (e.g. before the first full scan).
async fn nearest_tracked_directory(db: &Database, section_location_id: i64, path: &Path) -> PathBuf {
    let directories = db.directories();
    let mut cursor = path.parent();
    while let Some(dir) = cursor {
        if directories
            .get_by_path(section_location_id, &dir.to_string_lossy())
            .await
            .ok()
            .flatten()
            .is_some()
        {
            return dir.to_path_buf();
        }
        cursor = dir.parent();
    }
    path.parent().map(Path::to_path_buf).unwrap_or_else(|| path.to_path_buf())
}

/// Runs the coalescer loop for one location until `cancel` fires, emitting flushed groups on
/// `out`. Owns the transient-pair suppression and debounce bookkeeping described at module level.
async fn run_coalescer(
    db: Database,
    location: SectionLocationRecord,
    mut raw_rx: mpsc::Receiver<WatchMessage>,
    out: mpsc::Sender<CoalescedChangeEvent>,
    cancel: CancellationToken,
) {
    let mut groups: HashMap<PathBuf, PendingGroup> = HashMap::new();
    let mut recent_creates: HashMap<PathBuf, Instant> = HashMap::new();
    let mut tick = tokio::time::interval(COALESCE_TICK);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = raw_rx.recv() => {
                let Some(msg) = msg else { break };
                match msg {
                    WatchMessage::Error(e) => {
                        warn!(error = %e, section = location.library_section_id, "watcher error, requiring full rescan");
                        let _ = db
                            .library_sections()
                            .update(location.library_section_id, UpdateLibrarySection {
                                requires_full_rescan: Some(true),
                                ..Default::default()
                            })
                            .await;
                    }
                    WatchMessage::Change(change) => {
                        let now = Instant::now();
                        if change.kind == ChangeKind::Removed {
                            if let Some(created_at) = recent_creates.remove(&change.path) {
                                if now.duration_since(created_at) < TRANSIENT_WINDOW {
                                    for group in groups.values_mut() {
                                        group.paths.remove(&change.path);
                                    }
                                    continue;
                                }
                            }
                        }
                        if change.kind == ChangeKind::Added {
                            recent_creates.insert(change.path.clone(), now);
                        }

                        let group_key = nearest_tracked_directory(&db, location.id, &change.path).await;
                        let group = groups.entry(group_key).or_insert_with(|| PendingGroup {
                            paths: HashSet::new(),
                            kind: change.kind,
                            last_event: now,
                        });
                        group.paths.insert(change.path);
                        group.kind = change.kind;
                        group.last_event = now;
                    }
                }
            }
            _ = tick.tick() => {
                let now = Instant::now();
                let ready: Vec<PathBuf> = groups
                    .iter()
                    .filter(|(_, g)| now.duration_since(g.last_event) >= DEBOUNCE)
                    .map(|(k, _)| k.clone())
                    .collect();
                for key in ready {
                    if let Some(group) = groups.remove(&key) {
                        if group.paths.is_empty() {
                            continue;
                        }
                        debug!(section = location.library_section_id, paths = group.paths.len(), "flushing coalesced change");
                        let event = CoalescedChangeEvent {
                            library_section_id: location.library_section_id,
                            paths: group.paths,
                            kind: group.kind,
                        };
                        if out.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Runs the hybrid watcher for one `SectionLocation` until `cancel` fires: a native watch up to
/// `watch_depth`, a poller for anything deeper, and the coalescer joining both into
/// `CoalescedChangeEvent`s on `out`.
pub async fn run_watcher(
    db: Database,
    location: SectionLocationRecord,
    out: mpsc::Sender<CoalescedChangeEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let (raw_tx, raw_rx) = mpsc::channel(RAW_CHANNEL_SIZE);

    let root = PathBuf::from(&location.root_path);
    let _watcher = spawn_native_watch(root, location.watch_depth, raw_tx.clone())?;
    spawn_poller(db.clone(), location.clone(), raw_tx, cancel.clone());

    info!(
        section = location.library_section_id,
        root = %location.root_path,
        watch_depth = location.watch_depth,
        poll_interval = location.poll_interval_secs,
        "watcher started"
    );

    run_coalescer(db, location, raw_rx, out, cancel).await;
    Ok(())
}

/// Restricted pipeline pass (§4.5): runs discovery-equivalent stat + resolve + refresh over only
/// the paths named in `event`, instead of walking the whole tree the way a full scan does.
#[allow(clippy::too_many_arguments)]
pub async fn micro_scan(
    db: &Database,
    dedup: &DedupService,
    client_factory: &AgentClientFactory,
    remote_semaphore: &Semaphore,
    http_client: &reqwest::Client,
    paths: &Paths,
    section_type: &str,
    agents: &[Arc<dyn MetadataAgent>],
    event: &CoalescedChangeEvent,
) -> Result<()> {
    for path in &event.paths {
        let absolute_path = path.to_string_lossy().to_string();

        let discovery_kind = match event.kind {
            ChangeKind::Removed => DiscoveryKind::Missing,
            _ => match tokio::fs::metadata(path).await {
                Ok(_) => {
                    if db
                        .media_parts()
                        .get_by_path(event.library_section_id, &absolute_path)
                        .await?
                        .is_some()
                    {
                        DiscoveryKind::Modified
                    } else {
                        DiscoveryKind::Added
                    }
                }
                Err(_) => DiscoveryKind::Missing,
            },
        };

        let meta = tokio::fs::metadata(path).await.ok();
        let discovery_event = DiscoveryEvent {
            library_section_id: event.library_section_id,
            section_location_id: 0,
            directory_id: None,
            absolute_path,
            size_bytes: meta.as_ref().map(|m| m.len()).unwrap_or(0),
            mtime: meta
                .and_then(|m| m.modified().ok())
                .map(chrono::DateTime::<chrono::Utc>::from)
                .unwrap_or_else(chrono::Utc::now),
            kind: discovery_kind,
        };

        let Some(part) = resolve(db, dedup, section_type, discovery_event).await? else {
            continue;
        };

        let metadata_item_id = match db.media_items().get_by_id(part.media_item_id).await? {
            Some(item) => item.metadata_item_id,
            None => continue,
        };
        let Some(metadata_item) = db.metadata_items().get_by_id(metadata_item_id).await? else {
            continue;
        };

        refresh_item(
            db,
            dedup,
            client_factory,
            remote_semaphore,
            http_client,
            paths,
            metadata_item.uuid,
            metadata_item_id,
            metadata_item.library_section_id,
            agents,
            &RefreshOptions::default(),
        )
        .await?;
    }

    Ok(())
}
