//! Scheduled-rescan entry point: runs every registered library section's locations through the
//! scan pipeline (§4.4), one location at a time so a stuck section never starves the others.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::Config;
use crate::db::Database;
use crate::paths::Paths;
use crate::services::notifications::JobNotificationFabric;
use crate::services::scan::agents::MetadataAgent;
use crate::services::scan::run_scan;

/// Scans every location of every library section, tolerating a single section's failure so the
/// rest of the sweep still runs.
pub async fn scan_all_sections(
    db: Database,
    config: Arc<Config>,
    paths: Arc<Paths>,
    fabric: JobNotificationFabric,
    agents: Vec<Arc<dyn MetadataAgent>>,
) -> Result<()> {
    let http_client = reqwest::Client::new();
    let sections = db.library_sections().list_all().await?;

    for section in sections {
        let locations = db.section_locations().list_for_section(section.id).await?;
        for location in locations {
            let cancel = CancellationToken::new();
            if let Err(e) = run_scan(
                db.clone(),
                config.clone(),
                fabric.clone(),
                http_client.clone(),
                paths.clone(),
                location.clone(),
                section.section_type.clone(),
                agents.clone(),
                cancel,
            )
            .await
            {
                warn!(error = %e, section = section.id, location = location.id, "scheduled rescan failed for location");
            }
        }
    }

    Ok(())
}
