//! Transcode/session reaper tick: kills jobs whose client has stopped pinging.
//!
//! `TranscodeManager::cleanup_stale_jobs` (every active job, unconditionally) is a startup-only
//! recovery step for jobs orphaned by a prior crash, run once in `main` before the scheduler
//! starts — it is not safe to run on a recurring tick since it would kill healthy jobs too.

use anyhow::Result;
use tracing::info;

use crate::services::transcode::TranscodeManager;

/// Kills transcode jobs that haven't pinged within the configured idle timeout.
pub async fn reap(transcode: &TranscodeManager) -> Result<()> {
    let killed = transcode.kill_idle_jobs().await?;
    if killed > 0 {
        info!(killed, "reaped idle transcode jobs");
    }
    Ok(())
}
