//! Snapshot persistence for the companion read-only web view.
//!
//! The latest `(timestamp, summary, headlines)` tuple is written as a single
//! JSON document, overwriting whatever the previous run left behind. There
//! is no history and no versioning; an external viewer polls this one file.
//! Persistence is best-effort: a failed write is logged and swallowed.

use crate::models::Snapshot;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write the run's snapshot, absorbing any failure.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn write_snapshot(snapshot: &Snapshot, path: &str) {
    match write(snapshot, path).await {
        Ok(()) => info!(news = snapshot.news.len(), "Snapshot written"),
        Err(e) => error!(error = %e, "Failed to write snapshot; continuing"),
    }
}

async fn write(snapshot: &Snapshot, path: &str) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(snapshot)?;

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    fs::write(path, json).await?;
    Ok(())
}
