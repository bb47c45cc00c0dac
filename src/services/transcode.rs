//! Transcode job manager (§4.9). A `TranscodeJobRecord` in SQLite is the durable record; a
//! `moka::sync::Cache` mirrors it for fast live-process lookup keyed by output path, adopted from
//! the pack's music-server caching layer (`coissac-pmomusic`) since the reference stack has no LRU
//! cache of its own — entries idle-evict after `idle_timeout`, same window used to detect a dead
//! job's missing pings.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use moka::sync::Cache;
use tokio::process::Command;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::playback::{CreateTranscodeJob, TranscodeJobRecord};
use crate::db::Database;

const KILL_GRACE_PERIOD: Duration = Duration::from_secs(2);
const KILL_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
struct CachedJob {
    pid: Option<i64>,
    segment_prefix: String,
    segment_extension: String,
    segment_length_s: i64,
    start_time_ms: i64,
    created_at: Instant,
}

pub struct TranscodeJobOptions {
    pub segment_length_s: i64,
    pub start_time_ms: i64,
}

pub struct TranscodeManager {
    db: Database,
    cache: Cache<String, CachedJob>,
    max_concurrent_transcodes: usize,
    idle_timeout: Duration,
}

impl TranscodeManager {
    pub fn new(db: Database, max_concurrent_transcodes: usize, idle_timeout: Duration) -> Self {
        let cache = Cache::builder().time_to_idle(idle_timeout).build();
        Self { db, cache, max_concurrent_transcodes, idle_timeout }
    }

    pub async fn can_start_new_job(&self) -> Result<bool> {
        Ok(self.db.transcode_jobs().count_active().await? < self.max_concurrent_transcodes as i64)
    }

    pub async fn create(
        &self,
        playback_session_id: i64,
        media_part_id: i64,
        protocol: &str,
        output_path: &str,
        options: TranscodeJobOptions,
    ) -> Result<TranscodeJobRecord> {
        let job = self
            .db
            .transcode_jobs()
            .create(CreateTranscodeJob {
                playback_session_id,
                media_part_id,
                protocol: protocol.to_string(),
                output_path: output_path.to_string(),
                segment_length_s: options.segment_length_s,
                start_time_ms: options.start_time_ms,
            })
            .await?;

        self.cache.insert(
            output_path.to_string(),
            CachedJob {
                pid: None,
                segment_prefix: default_segment_prefix(&job.uuid),
                segment_extension: default_segment_extension(protocol),
                segment_length_s: options.segment_length_s,
                start_time_ms: options.start_time_ms,
                created_at: Instant::now(),
            },
        );
        Ok(job)
    }

    pub async fn start(&self, job_uuid: Uuid, pid: i64) -> Result<()> {
        let job = self.get(job_uuid).await?;
        self.db.transcode_jobs().set_pid(job_uuid, pid).await?;
        if let Some(mut cached) = self.cache.get(&job.output_path) {
            cached.pid = Some(pid);
            self.cache.insert(job.output_path, cached);
        }
        Ok(())
    }

    pub async fn ping(&self, job_uuid: Uuid) -> Result<()> {
        let job = self.get(job_uuid).await?;
        self.db.transcode_jobs().advance(job_uuid, "Running", job.progress_pct, job.last_segment_index).await
    }

    /// Monotonically-increasing progress; a client report that would move progress backward is
    /// dropped rather than rejected, since the client can't meaningfully recover from an error.
    pub async fn report_progress(&self, job_uuid: Uuid, progress_pct: f64) -> Result<()> {
        let job = self.get(job_uuid).await?;
        if progress_pct < job.progress_pct {
            return Ok(());
        }
        self.db.transcode_jobs().advance(job_uuid, "Running", progress_pct, job.last_segment_index).await
    }

    pub async fn complete(&self, job_uuid: Uuid) -> Result<()> {
        let job = self.get(job_uuid).await?;
        self.db.transcode_jobs().advance(job_uuid, "Completed", 100.0, job.last_segment_index).await?;
        self.cache.remove(&job.output_path);
        Ok(())
    }

    pub async fn cancel(&self, job_uuid: Uuid, delete_segments: bool) -> Result<()> {
        let job = self.get(job_uuid).await?;
        if let Some(pid) = job.pid {
            kill_process(pid).await?;
        }
        self.db.transcode_jobs().advance(job_uuid, "Cancelled", job.progress_pct, job.last_segment_index).await?;
        self.cache.remove(&job.output_path);
        if delete_segments {
            delete_segment_files(&job.output_path).await;
        }
        Ok(())
    }

    pub async fn fail(&self, job_uuid: Uuid, message: &str) -> Result<()> {
        warn!(job = %job_uuid, message, "transcode job failed");
        let job = self.get(job_uuid).await?;
        if let Some(pid) = job.pid {
            kill_process(pid).await.ok();
        }
        self.db.transcode_jobs().advance(job_uuid, "Failed", job.progress_pct, job.last_segment_index).await?;
        self.cache.remove(&job.output_path);
        Ok(())
    }

    /// At startup: kill any pid the DB still thinks is running and delete its segments, since
    /// nothing could have pinged it while the process was down.
    pub async fn cleanup_stale_jobs(&self) -> Result<()> {
        for job in self.db.transcode_jobs().list_active().await? {
            if let Some(pid) = job.pid {
                if let Err(err) = kill_process(pid).await {
                    warn!(job = %job.uuid, pid, error = %err, "failed to kill orphaned transcode pid");
                }
            }
            delete_segment_files(&job.output_path).await;
            self.db.transcode_jobs().advance(job.uuid, "Failed", job.progress_pct, job.last_segment_index).await?;
            self.cache.remove(&job.output_path);
        }
        Ok(())
    }

    /// Kills jobs that haven't pinged within `idle_timeout` — called from the reaper tick
    /// (§4.17 scheduler).
    pub async fn kill_idle_jobs(&self) -> Result<usize> {
        let stale_before = Utc::now() - chrono::Duration::from_std(self.idle_timeout)?;
        let stale = self.db.transcode_jobs().list_stale(stale_before).await?;
        let count = stale.len();
        for job in stale {
            info!(job = %job.uuid, "killing idle transcode job");
            self.fail(job.uuid, "idle timeout").await?;
        }
        Ok(count)
    }

    /// Scans `{output_path}/{segment_prefix}*.{segment_extension}` and returns the highest
    /// `chunk-streamN-XXXX` index already written, so the playback component can tell whether a
    /// requested segment is ready.
    pub async fn current_transcoding_index(&self, output_path: &str) -> Result<Option<u32>> {
        let Some(cached) = self.cache.get(output_path) else { return Ok(None) };
        let dir = Path::new(output_path);
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(None),
        };

        let mut highest: Option<u32> = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(index) = parse_segment_index(&name, &cached.segment_prefix, &cached.segment_extension) {
                highest = Some(highest.map_or(index, |h| h.max(index)));
            }
        }
        Ok(highest)
    }

    async fn get(&self, job_uuid: Uuid) -> Result<TranscodeJobRecord> {
        self.db
            .transcode_jobs()
            .get_by_uuid(job_uuid)
            .await?
            .ok_or_else(|| anyhow!("transcode job {job_uuid} not found"))
    }
}

fn default_segment_prefix(job_uuid: &Uuid) -> String {
    format!("chunk-stream0-{job_uuid}-")
}

fn default_segment_extension(protocol: &str) -> String {
    match protocol {
        "hls" => "ts".to_string(),
        _ => "m4s".to_string(),
    }
}

fn parse_segment_index(name: &str, prefix: &str, extension: &str) -> Option<u32> {
    let stem = name.strip_prefix(prefix)?;
    let digits = stem.strip_suffix(&format!(".{extension}"))?;
    digits.parse().ok()
}

async fn delete_segment_files(output_path: &str) {
    if let Err(err) = tokio::fs::remove_dir_all(output_path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(output_path, error = %err, "failed to delete transcode segments");
        }
    }
}

/// SIGTERM, wait up to [`KILL_GRACE_PERIOD`] polling for exit, then SIGKILL. Shells out to the
/// system `kill` rather than a signal-binding crate, consistent with how this crate already
/// shells out to `ffmpeg`/`ffprobe` (`services/ffmpeg.rs`) instead of binding to them directly.
async fn kill_process(pid: i64) -> Result<()> {
    run_kill(pid, "-TERM").await?;

    let deadline = Instant::now() + KILL_GRACE_PERIOD;
    while Instant::now() < deadline {
        if !process_alive(pid).await {
            return Ok(());
        }
        sleep(KILL_POLL_INTERVAL).await;
    }

    if process_alive(pid).await {
        run_kill(pid, "-KILL").await?;
    }
    Ok(())
}

async fn run_kill(pid: i64, signal: &str) -> Result<()> {
    let status = Command::new("kill").arg(signal).arg(pid.to_string()).status().await?;
    if !status.success() {
        // pid already gone is not an error for our purposes.
        return Ok(());
    }
    Ok(())
}

async fn process_alive(pid: i64) -> bool {
    Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_segment_index_from_matching_filename() {
        let idx = parse_segment_index("chunk-stream0-abc-0007.m4s", "chunk-stream0-abc-", "m4s");
        assert_eq!(idx, Some(7));
    }

    #[test]
    fn rejects_filename_with_wrong_extension() {
        let idx = parse_segment_index("chunk-stream0-abc-0007.ts", "chunk-stream0-abc-", "m4s");
        assert_eq!(idx, None);
    }

    #[tokio::test]
    async fn killing_a_pid_that_never_existed_does_not_error() {
        // Exercises the "already gone" branch without needing a real process; pid 999999 should
        // not exist on any test host.
        kill_process(999_999).await.unwrap();
    }
}
