//! Retention cleanup for rolled log files.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use tracing::{debug, info, warn};

use super::logger::LOG_FILE_NAME;

/// Delete rolled log files last modified more than `retention_days` before
/// `now`. Returns the number of files removed.
pub async fn prune_expired_logs(
    log_dir: impl AsRef<Path>,
    retention_days: u32,
    now: DateTime<Utc>,
) -> Result<usize> {
    let log_dir = log_dir.as_ref();
    if !log_dir.exists() {
        warn!(path = %log_dir.display(), "log directory does not exist");
        return Ok(0);
    }

    let cutoff = now - Duration::days(i64::from(retention_days));
    let mut deleted = 0;
    let mut entries = tokio::fs::read_dir(log_dir)
        .await
        .context("failed to read log directory")?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .context("failed to read directory entry")?
    {
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(LOG_FILE_NAME));
        if !is_log {
            continue;
        }

        let modified: DateTime<Utc> = entry
            .metadata()
            .await
            .context("failed to get file metadata")?
            .modified()
            .context("failed to get file modification time")?
            .into();

        if modified < cutoff {
            tokio::fs::remove_file(&path)
                .await
                .with_context(|| format!("failed to delete {}", path.display()))?;
            debug!(path = %path.display(), age_days = (now - modified).num_days(), "deleted old log file");
            deleted += 1;
        }
    }

    if deleted > 0 {
        info!(count = deleted, retention_days, "pruned expired log files");
    }
    Ok(deleted)
}
