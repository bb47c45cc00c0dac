//! Job Notification Fabric (§4.6).
//!
//! A process-wide, in-memory aggregator keyed by `(library_section_id, job_type)`. Progress
//! calls land in a `DashMap` and mark the entry dirty; a flush task drains dirty entries on a
//! fixed cadence and republishes them on a `broadcast` channel, mirroring the reference stack's
//! `ScanProgress`/torrent-progress broadcast pattern generalized to every job type this crate
//! runs. The `job_notifications` table (`db::JobNotificationRepository`) is the durable replay
//! source for subscribers that reconnect after a restart.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::db::Database;

/// Kinds of work the fabric tracks progress for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Scan,
    MetadataRefresh,
    ImageGeneration,
    Trickplay,
    Transcode,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Scan => "Scan",
            JobType::MetadataRefresh => "MetadataRefresh",
            JobType::ImageGeneration => "ImageGeneration",
            JobType::Trickplay => "Trickplay",
            JobType::Transcode => "Transcode",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Running => "Running",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// In-memory state for one `(library_section_id, job_type)` key.
#[derive(Debug, Clone)]
struct JobEntry {
    epoch: u64,
    total: i64,
    completed: i64,
    status: JobStatus,
    last_update: DateTime<Utc>,
    error_message: Option<String>,
    dirty: bool,
}

/// A snapshot handed to subscribers and callers of `list_active`/`get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobNotificationSnapshot {
    pub library_section_id: i64,
    pub job_type: JobType,
    pub epoch: u64,
    pub total: i64,
    pub completed: i64,
    pub status: JobStatus,
    pub last_update: DateTime<Utc>,
    pub error_message: Option<String>,
}

fn snapshot(library_section_id: i64, job_type: JobType, entry: &JobEntry) -> JobNotificationSnapshot {
    JobNotificationSnapshot {
        library_section_id,
        job_type,
        epoch: entry.epoch,
        total: entry.total,
        completed: entry.completed,
        status: entry.status,
        last_update: entry.last_update,
        error_message: entry.error_message.clone(),
    }
}

type Key = (i64, JobType);

/// Process-wide job-progress aggregator. Cheap to clone (wraps an `Arc`); callers that need the
/// flush loop running should spawn it once via [`JobNotificationFabric::spawn_flush_loop`].
#[derive(Clone)]
pub struct JobNotificationFabric {
    inner: Arc<FabricInner>,
}

struct FabricInner {
    db: Database,
    entries: DashMap<Key, JobEntry>,
    tx: broadcast::Sender<JobNotificationSnapshot>,
}

const BROADCAST_CAPACITY: usize = 256;
const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

impl JobNotificationFabric {
    pub fn new(db: Database) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(FabricInner {
                db,
                entries: DashMap::new(),
                tx,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobNotificationSnapshot> {
        self.inner.tx.subscribe()
    }

    /// `Start(total)`. Idempotent for the same key: every call (including a repeat) begins a
    /// fresh epoch, resetting `completed` to zero, per §4.6's contract.
    pub fn start(&self, library_section_id: i64, job_type: JobType, total: i64) {
        let now = Utc::now();
        let mut entry = self
            .inner
            .entries
            .entry((library_section_id, job_type))
            .or_insert_with(|| JobEntry {
                epoch: 0,
                total,
                completed: 0,
                status: JobStatus::Pending,
                last_update: now,
                error_message: None,
                dirty: true,
            });
        entry.epoch += 1;
        entry.total = total;
        entry.completed = 0;
        entry.status = JobStatus::Running;
        entry.error_message = None;
        entry.last_update = now;
        entry.dirty = true;

        debug!(library_section_id, job_type = job_type.as_str(), epoch = entry.epoch, total, "job started");
    }

    /// `ReportProgress(completed, total)`. Monotonic in `completed` within an epoch; a
    /// regression is clamped to the previous value rather than applied.
    pub fn report_progress(&self, library_section_id: i64, job_type: JobType, completed: i64, total: i64) {
        let Some(mut entry) = self.inner.entries.get_mut(&(library_section_id, job_type)) else {
            warn!(library_section_id, job_type = job_type.as_str(), "progress report for unknown job, ignoring");
            return;
        };
        if entry.status.is_terminal() {
            return;
        }
        entry.total = total;
        entry.completed = completed.max(entry.completed);
        entry.last_update = Utc::now();
        entry.dirty = true;
    }

    /// `Complete()`. Terminal for the current epoch; further reports are ignored until `start`.
    pub fn complete(&self, library_section_id: i64, job_type: JobType) {
        if let Some(mut entry) = self.inner.entries.get_mut(&(library_section_id, job_type)) {
            if entry.status.is_terminal() {
                return;
            }
            entry.status = JobStatus::Completed;
            entry.completed = entry.total.max(entry.completed);
            entry.last_update = Utc::now();
            entry.dirty = true;
        }
    }

    /// `Fail(msg)`. Terminal for the current epoch.
    pub fn fail(&self, library_section_id: i64, job_type: JobType, message: &str) {
        if let Some(mut entry) = self.inner.entries.get_mut(&(library_section_id, job_type)) {
            if entry.status.is_terminal() {
                return;
            }
            entry.status = JobStatus::Failed;
            entry.error_message = Some(message.to_string());
            entry.last_update = Utc::now();
            entry.dirty = true;
        }
    }

    pub fn get(&self, library_section_id: i64, job_type: JobType) -> Option<JobNotificationSnapshot> {
        self.inner
            .entries
            .get(&(library_section_id, job_type))
            .map(|e| snapshot(library_section_id, job_type, &e))
    }

    /// All entries not in a terminal state, across every library.
    pub fn list_active(&self) -> Vec<JobNotificationSnapshot> {
        self.inner
            .entries
            .iter()
            .filter(|e| !e.status.is_terminal())
            .map(|e| snapshot(e.key().0, e.key().1, &e))
            .collect()
    }

    /// Drains every dirty entry, persists it, and republishes it on the broadcast channel.
    /// Called by the flush loop on a fixed cadence; exposed directly so tests and the startup
    /// path can force a synchronous flush without waiting on the timer.
    pub async fn flush(&self) {
        let dirty_keys: Vec<Key> = self
            .inner
            .entries
            .iter()
            .filter(|e| e.dirty)
            .map(|e| *e.key())
            .collect();

        for key in dirty_keys {
            let snap = {
                let Some(mut entry) = self.inner.entries.get_mut(&key) else { continue };
                entry.dirty = false;
                snapshot(key.0, key.1, &entry)
            };

            if let Err(e) = self.persist(&snap).await {
                warn!(error = %e, library_section_id = snap.library_section_id, job_type = snap.job_type.as_str(), "failed to persist job notification");
            }

            let _ = self.inner.tx.send(snap);
        }
    }

    async fn persist(&self, snap: &JobNotificationSnapshot) -> anyhow::Result<()> {
        let repo = self.inner.db.job_notifications();
        let job_type = snap.job_type.as_str();

        match repo.get(snap.library_section_id, job_type).await? {
            Some(existing) if existing.epoch as u64 == snap.epoch => {
                repo.advance(snap.library_section_id, job_type, snap.completed).await?;
                match snap.status {
                    JobStatus::Completed => repo.complete(snap.library_section_id, job_type).await?,
                    JobStatus::Failed => {
                        repo.fail(
                            snap.library_section_id,
                            job_type,
                            snap.error_message.as_deref().unwrap_or("unknown error"),
                        )
                        .await?
                    }
                    _ => {}
                }
            }
            _ => {
                repo.begin_epoch(snap.library_section_id, job_type, snap.total).await?;
                repo.advance(snap.library_section_id, job_type, snap.completed).await?;
            }
        }
        Ok(())
    }

    /// Purges terminal in-memory entries and durable rows older than `retention_days`,
    /// backing the Ambient Scheduler's daily sweep (§4.6, §4.17).
    pub async fn retention_sweep(&self, retention_days: i64) -> anyhow::Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(retention_days);

        self.inner.entries.retain(|_, entry| !(entry.status.is_terminal() && entry.last_update < cutoff));

        let deleted = self.inner.db.job_notifications().delete_completed_before(cutoff).await?;
        if deleted > 0 {
            info!(deleted, "swept stale job notifications");
        }
        Ok(deleted)
    }

    /// Spawns the periodic flush loop as a background task. Returns the task handle so callers
    /// can abort it on shutdown.
    pub fn spawn_flush_loop(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(FLUSH_INTERVAL);
            loop {
                interval.tick().await;
                self.flush().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: JobStatus, completed: i64, total: i64) -> JobEntry {
        JobEntry {
            epoch: 1,
            total,
            completed,
            status,
            last_update: Utc::now(),
            error_message: None,
            dirty: false,
        }
    }

    #[test]
    fn job_type_strings_are_stable() {
        assert_eq!(JobType::Scan.as_str(), "Scan");
        assert_eq!(JobType::Transcode.as_str(), "Transcode");
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn snapshot_carries_fields_through() {
        let e = entry(JobStatus::Running, 5, 10);
        let s = snapshot(1, JobType::Scan, &e);
        assert_eq!(s.completed, 5);
        assert_eq!(s.total, 10);
        assert_eq!(s.status, JobStatus::Running);
    }

    async fn memory_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_clamped_on_regression() {
        let fabric = JobNotificationFabric::new(memory_db().await);
        fabric.start(1, JobType::Scan, 10);
        fabric.report_progress(1, JobType::Scan, 5, 10);
        fabric.report_progress(1, JobType::Scan, 2, 10); // regression, should clamp
        let snap = fabric.get(1, JobType::Scan).unwrap();
        assert_eq!(snap.completed, 5);
    }

    #[tokio::test]
    async fn complete_is_terminal_and_ignores_further_reports() {
        let fabric = JobNotificationFabric::new(memory_db().await);
        fabric.start(1, JobType::Scan, 10);
        fabric.complete(1, JobType::Scan);
        fabric.report_progress(1, JobType::Scan, 3, 10);
        let snap = fabric.get(1, JobType::Scan).unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.completed, 10);
    }

    #[tokio::test]
    async fn restart_bumps_epoch_and_resets_completed() {
        let fabric = JobNotificationFabric::new(memory_db().await);
        fabric.start(1, JobType::Scan, 10);
        fabric.report_progress(1, JobType::Scan, 7, 10);
        fabric.start(1, JobType::Scan, 20);
        let snap = fabric.get(1, JobType::Scan).unwrap();
        assert_eq!(snap.epoch, 2);
        assert_eq!(snap.completed, 0);
        assert_eq!(snap.total, 20);
    }

    #[tokio::test]
    async fn flush_persists_and_broadcasts() {
        let fabric = JobNotificationFabric::new(memory_db().await);
        let mut rx = fabric.subscribe();
        fabric.start(1, JobType::Scan, 5);
        fabric.report_progress(1, JobType::Scan, 5, 5);
        fabric.complete(1, JobType::Scan);
        fabric.flush().await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.status, JobStatus::Completed);

        let persisted = fabric
            .inner
            .db
            .job_notifications()
            .get(1, JobType::Scan.as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.status, "Completed");
        assert_eq!(persisted.completed, 5);
    }

    #[tokio::test]
    async fn list_active_excludes_terminal_entries() {
        let fabric = JobNotificationFabric::new(memory_db().await);
        fabric.start(1, JobType::Scan, 5);
        fabric.start(2, JobType::Transcode, 3);
        fabric.complete(2, JobType::Transcode);

        let active = fabric.list_active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].library_section_id, 1);
    }
}
