//! Ambient scheduler (§4.17): hourly library rescans, a 30s transcode/session reaper tick, and a
//! daily job-notification retention sweep, wired the way the teacher's `jobs/mod.rs` registers
//! its cron jobs against a `tokio_cron_scheduler::JobScheduler`.

pub mod scanner;
pub mod transcode_gc;

use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::Config;
use crate::db::Database;
use crate::paths::Paths;
use crate::services::notifications::JobNotificationFabric;
use crate::services::scan::agents::MetadataAgent;
use crate::services::transcode::TranscodeManager;

const JOB_NOTIFICATION_RETENTION_DAYS: i64 = 7;

/// Initialize and start the ambient job scheduler.
pub async fn start_scheduler(
    db: Database,
    config: Arc<Config>,
    paths: Arc<Paths>,
    fabric: JobNotificationFabric,
    transcode: Arc<TranscodeManager>,
    agents: Vec<Arc<dyn MetadataAgent>>,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    // Library rescan - run every hour
    let scan_db = db.clone();
    let scan_config = config.clone();
    let scan_paths = paths.clone();
    let scan_fabric = fabric.clone();
    let scan_agents = agents.clone();
    let scan_job = Job::new_async("0 0 * * * *", move |_uuid, _l| {
        let db = scan_db.clone();
        let config = scan_config.clone();
        let paths = scan_paths.clone();
        let fabric = scan_fabric.clone();
        let agents = scan_agents.clone();
        Box::pin(async move {
            info!("Running scheduled library rescan");
            if let Err(e) = scanner::scan_all_sections(db, config, paths, fabric, agents).await {
                error!(error = %e, "scheduled library rescan failed");
            }
        })
    })?;
    scheduler.add(scan_job).await?;

    // Transcode/session reaper - run every 30 seconds
    let gc_transcode = transcode.clone();
    let reaper_job = Job::new_async("*/30 * * * * *", move |_uuid, _l| {
        let transcode = gc_transcode.clone();
        Box::pin(async move {
            if let Err(e) = transcode_gc::reap(&transcode).await {
                error!(error = %e, "transcode reaper tick failed");
            }
        })
    })?;
    scheduler.add(reaper_job).await?;

    // Job notification retention sweep - run daily at 3 AM
    let sweep_fabric = fabric.clone();
    let sweep_job = Job::new_async("0 0 3 * * *", move |_uuid, _l| {
        let fabric = sweep_fabric.clone();
        Box::pin(async move {
            info!("Running job notification retention sweep");
            if let Err(e) = fabric.retention_sweep(JOB_NOTIFICATION_RETENTION_DAYS).await {
                error!(error = %e, "job notification retention sweep failed");
            }
        })
    })?;
    scheduler.add(sweep_job).await?;

    scheduler.start().await?;

    info!("Job scheduler started");
    Ok(scheduler)
}
