///! Cache management for rendered maps
use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::path::Path;
use tokio::fs;

/// File name of the cached map for a QSO, e.g. "VK2_W1AW-1705329000.png"
pub fn map_file_name(callsign: &str, unix_ts: i64) -> String {
    format!("{}-{}.png", callsign.replace('/', "_"), unix_ts)
}

/// Maps and leftovers of interrupted writes are both subject to retention.
fn is_cache_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "png" || ext == "tmp")
}

/// Delete cached maps (and stale temporary files) last modified more than
/// `days_to_keep` days ago. Returns how many files were removed.
///
/// A missing `map_dir` is an empty cache. Entries whose metadata cannot be read,
/// usually because they vanished mid-scan, are skipped and not counted.
pub async fn cleanup_old_maps(map_dir: &Path, days_to_keep: i64) -> Result<usize> {
    if !fs::try_exists(map_dir).await.unwrap_or(false) {
        return Ok(0);
    }

    // A retention beyond chrono's range keeps everything
    let Some(cutoff) = TimeDelta::try_days(days_to_keep).and_then(|keep| Utc::now().checked_sub_signed(keep)) else {
        return Ok(0);
    };
    let mut entries = fs::read_dir(map_dir)
        .await
        .with_context(|| format!("Failed to read map directory {:?}", map_dir))?;

    let mut deleted = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() || !is_cache_file(&path) {
            continue;
        }

        let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
            tracing::debug!("Skipping {:?}: metadata unavailable", path);
            continue;
        };
        if DateTime::<Utc>::from(modified) >= cutoff {
            continue;
        }

        match fs::remove_file(&path).await {
            Ok(()) => deleted += 1,
            Err(e) => tracing::warn!("Failed to delete old map {:?}: {}", path, e),
        }
    }

    Ok(deleted)
}
