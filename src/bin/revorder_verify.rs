//! revorder-verify: timeline consistency check
//!
//! Rebuilds every pipeline timeline from storage and checks that each stored
//! natural order and neighbour link is reproduced. Exits non-zero when
//! ordering corruption is found, so it can run as a scheduled job or a
//! startup probe.
//!
//! ## Configuration
//! - REVORDER_CONFIG: YAML configuration file (default ./config.yaml)
//! - REVORDER__STORAGE__TYPE / REVORDER__STORAGE__PATH: storage backend
//! - REVORDER_LOG: log filter (default "info")

use std::process::ExitCode;

use tracing::{error, info};

use revorder::config::Config;
use revorder::storage::init_storage;
use revorder::timeline::PipelineTimeline;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    revorder::utils::bootstrap::init_tracing();

    let config = Config::load(None).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let store = init_storage(&config.storage).await?;
    info!("Storage initialized");

    let timeline = PipelineTimeline::new(store.clone(), &config.timeline);
    match timeline.rebuild().await {
        Ok(()) => {
            for pipeline in store.list_pipelines().await? {
                let entries = timeline.entries_for(&pipeline).await;
                info!(
                    pipeline = %pipeline,
                    entries = entries.len(),
                    latest_counter = ?entries.last().map(|e| e.counter()),
                    "Timeline consistent"
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_fatal() => {
            error!(error = %e, "Timeline verification failed");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
