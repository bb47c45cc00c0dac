//! Scan pipeline orchestration (§4.4): wires discovery → resolver → file-analyzer → per-item
//! refresh into a staged producer/consumer graph with bounded channels for back-pressure.
//!
//! Discovery walks a single location breadth-first on one task (splitting the BFS queue across
//! workers would break the "everything before the cursor is fully accounted for" checkpoint
//! invariant discovery relies on), but resolver and file-analyzer stages fan out across a shared
//! queue, sized off the host's available parallelism the way §4.4's concurrency table specifies.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use dashmap::DashSet;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::library::SectionLocationRecord;
use crate::db::media::MediaPartRecord;
use crate::db::Database;
use crate::paths::Paths;
use crate::services::ffmpeg::FfmpegService;
use crate::services::notifications::{JobNotificationFabric, JobType};

use super::agents::{AgentClientFactory, MetadataAgent};
use super::dedup::DedupService;
use super::discovery::{discover, DiscoveryEvent, ScanCheckpoint};
use super::file_analyzer::analyze_part;
use super::refresh::{refresh_item, RefreshOptions};
use super::resolver::resolve;

const CHECKPOINT_EVERY_DIRECTORIES: usize = 50;
const DISCOVERY_CHANNEL_SIZE: usize = 256;
const ANALYSIS_CHANNEL_SIZE: usize = 256;

/// Worker pool sizes derived from host parallelism per §4.4's concurrency table.
fn worker_counts(config: &Config) -> (usize, usize) {
    let p = config
        .scan_concurrency_override
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4));
    let resolver_workers = ((p * 3) / 4).max(2);
    let analyzer_workers = (p / 2).clamp(2, 4);
    (resolver_workers, analyzer_workers)
}

/// Runs one location's scan to completion: discovery, resolution, file analysis, and a metadata
/// refresh per newly-seen item. Resumes a prior `Running`/`Queued` scan for this section if one
/// exists, continuing from its checkpoint instead of starting a fresh walk.
#[allow(clippy::too_many_arguments)]
pub async fn run_scan(
    db: Database,
    config: Arc<Config>,
    fabric: JobNotificationFabric,
    http_client: reqwest::Client,
    paths: Arc<Paths>,
    location: SectionLocationRecord,
    section_type: String,
    agents: Vec<Arc<dyn MetadataAgent>>,
    cancel: CancellationToken,
) -> Result<ScanCheckpoint> {
    let scans = db.library_scans();
    let scan = match scans.get_resumable(location.library_section_id).await? {
        Some(existing) => {
            info!(scan = %existing.uuid, section = location.library_section_id, "resuming scan from checkpoint");
            existing
        }
        None => scans.begin(location.library_section_id).await?,
    };

    fabric.start(location.library_section_id, JobType::Scan, 0);

    let (discovery_tx, discovery_rx) = mpsc::channel::<DiscoveryEvent>(DISCOVERY_CHANNEL_SIZE);
    let (analysis_tx, analysis_rx) = mpsc::channel::<(i64, MediaPartRecord)>(ANALYSIS_CHANNEL_SIZE);

    let discovery_db = db.clone();
    let discovery_location = location.clone();
    let discovery_cancel = cancel.clone();
    let scan_uuid = scan.uuid;
    let discovery_task = tokio::spawn(async move {
        discover(
            &discovery_db,
            &discovery_location,
            scan_uuid,
            CHECKPOINT_EVERY_DIRECTORIES,
            discovery_cancel,
            discovery_tx,
        )
        .await
    });

    let (resolver_workers, analyzer_workers) = worker_counts(&config);

    let dedup = DedupService::new(db.clone());
    let discovery_rx = Arc::new(Mutex::new(discovery_rx));
    let processed = Arc::new(AtomicI64::new(0));
    let mut resolver_joins = Vec::with_capacity(resolver_workers);
    for _ in 0..resolver_workers {
        let rx = discovery_rx.clone();
        let db = db.clone();
        let dedup = dedup.clone();
        let section_type = section_type.clone();
        let analysis_tx = analysis_tx.clone();
        let cancel = cancel.clone();
        let processed = processed.clone();
        let fabric = fabric.clone();
        let section_id = location.library_section_id;
        resolver_joins.push(tokio::spawn(async move {
            loop {
                let event = {
                    let mut guard = rx.lock().await;
                    guard.recv().await
                };
                let Some(event) = event else { break };
                if cancel.is_cancelled() {
                    break;
                }
                match resolve(&db, &dedup, &section_type, event).await {
                    Ok(Some(part)) => {
                        let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
                        fabric.report_progress(section_id, JobType::Scan, count, count);
                        if analysis_tx.send((part.media_item_id, part)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "resolver stage failed for one event"),
                }
            }
        }));
    }
    drop(analysis_tx);

    let ffmpeg = Arc::new(FfmpegService::with_ffprobe_path(config.ffprobe_path.clone()));
    let analysis_rx = Arc::new(Mutex::new(analysis_rx));
    let refreshed: Arc<DashSet<i64>> = Arc::new(DashSet::new());
    let client_factory = AgentClientFactory::new();
    let remote_semaphore = Arc::new(Semaphore::new(super::agents::MAX_CONCURRENT_REMOTE_CALLS));
    let mut analyzer_joins = Vec::with_capacity(analyzer_workers);
    for _ in 0..analyzer_workers {
        let rx = analysis_rx.clone();
        let db = db.clone();
        let ffmpeg = ffmpeg.clone();
        let dedup = dedup.clone();
        let client_factory = client_factory.clone();
        let remote_semaphore = remote_semaphore.clone();
        let http_client = http_client.clone();
        let paths = paths.clone();
        let agents = agents.clone();
        let refreshed = refreshed.clone();
        let cancel = cancel.clone();
        analyzer_joins.push(tokio::spawn(async move {
            loop {
                let item = {
                    let mut guard = rx.lock().await;
                    guard.recv().await
                };
                let Some((media_item_id, part)) = item else { break };
                if cancel.is_cancelled() {
                    break;
                }

                if let Err(e) = analyze_part(&db, &ffmpeg, media_item_id, part.id, &part.absolute_path).await {
                    warn!(error = %e, part = part.id, "file analysis failed");
                }

                let metadata_item_id = match db.media_items().get_by_id(media_item_id).await {
                    Ok(Some(item)) => item.metadata_item_id,
                    _ => continue,
                };
                if !refreshed.insert(metadata_item_id) {
                    continue;
                }

                let metadata_item = match db.metadata_items().get_by_id(metadata_item_id).await {
                    Ok(Some(item)) => item,
                    _ => continue,
                };

                if let Err(e) = refresh_item(
                    &db,
                    &dedup,
                    &client_factory,
                    &remote_semaphore,
                    &http_client,
                    &paths,
                    metadata_item.uuid,
                    metadata_item_id,
                    metadata_item.library_section_id,
                    &agents,
                    &RefreshOptions::default(),
                )
                .await
                {
                    warn!(error = %e, metadata_item_id, "metadata refresh failed");
                }
            }
        }));
    }

    let discovery_result = discovery_task.await;
    for join in resolver_joins {
        let _ = join.await;
    }
    drop(discovery_rx);
    for join in analyzer_joins {
        let _ = join.await;
    }

    let checkpoint = match discovery_result {
        Ok(Ok(checkpoint)) => checkpoint,
        Ok(Err(e)) => {
            error!(error = %e, scan = %scan.uuid, "discovery failed");
            scans.finish(scan.uuid, "Failed").await?;
            fabric.fail(location.library_section_id, JobType::Scan, &e.to_string());
            return Err(e);
        }
        Err(join_err) => {
            error!(error = %join_err, scan = %scan.uuid, "discovery task panicked");
            scans.finish(scan.uuid, "Failed").await?;
            fabric.fail(location.library_section_id, JobType::Scan, &join_err.to_string());
            return Err(join_err.into());
        }
    };

    scans
        .record_delta(scan.uuid, checkpoint.added, checkpoint.modified, checkpoint.removed)
        .await?;
    for error in &checkpoint.errors {
        scans.push_error(scan.uuid, error).await?;
    }

    let final_state = if cancel.is_cancelled() { "Cancelled" } else { "Completed" };
    scans.finish(scan.uuid, final_state).await?;

    if cancel.is_cancelled() {
        fabric.fail(location.library_section_id, JobType::Scan, "cancelled");
    } else {
        fabric.complete(location.library_section_id, JobType::Scan);
    }

    Ok(checkpoint)
}
