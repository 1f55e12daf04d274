///! Reloadable logbook
///!
///! Owns the snapshot that is currently served. A reload parses the whole
///! file first and only then swaps the new snapshot in, so readers always
///! see a complete log. Failed reloads leave the old snapshot in place.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::types::LogSnapshot;
use crate::error::LogError;
use crate::module::adif::AdifParser;

/// Shared logbook – owns the ADIF path and the current snapshot.
pub struct LogReloader {
    path: PathBuf,
    /// Snapshot handed out to readers
    current: RwLock<Arc<LogSnapshot>>,
    /// Serializes reloads; readers never take it
    reload_lock: Mutex<()>,
}

impl LogReloader {
    /// Load `path` for the first time. Fails if the file cannot be read.
    pub async fn load(path: impl AsRef<Path>) -> Result<Arc<Self>, LogError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = Self::read_snapshot(&path).await?;

        Ok(Arc::new(Self {
            path,
            current: RwLock::new(Arc::new(snapshot)),
            reload_lock: Mutex::new(()),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The snapshot being served right now.
    pub async fn current(&self) -> Arc<LogSnapshot> {
        self.current.read().await.clone()
    }

    /// Re-read the ADIF file and publish the result.
    pub async fn reload(&self) -> Result<Arc<LogSnapshot>, LogError> {
        let _guard = self.reload_lock.lock().await;

        let snapshot = Arc::new(Self::read_snapshot(&self.path).await?);
        *self.current.write().await = snapshot.clone();

        tracing::info!(
            "Reloaded {} QSOs from {}",
            snapshot.log.len(),
            self.path.display()
        );
        Ok(snapshot)
    }

    async fn read_snapshot(path: &Path) -> Result<LogSnapshot, LogError> {
        let log = AdifParser::parse_file(path).await?;
        Ok(LogSnapshot {
            path: path.to_path_buf(),
            loaded_at: Utc::now(),
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_QSO: &str = "<EOH><CALL:4>W1AW<QSO_DATE:8>20240115<TIME_ON:6>143000<EOR>";
    const TWO_QSOS: &str = "<EOH><CALL:4>W1AW<QSO_DATE:8>20240115<TIME_ON:6>143000<EOR>\
                            <CALL:4>K1AB<QSO_DATE:8>20240116<TIME_ON:6>100000<EOR>";

    #[tokio::test]
    async fn test_load_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.adi");
        std::fs::write(&path, ONE_QSO).unwrap();

        let reloader = LogReloader::load(&path).await.unwrap();
        let before = reloader.current().await;
        assert_eq!(before.log.len(), 1);

        std::fs::write(&path, TWO_QSOS).unwrap();
        let after = reloader.reload().await.unwrap();
        assert_eq!(after.log.len(), 2);
        assert_eq!(reloader.current().await.log.len(), 2);

        // Readers holding the old snapshot keep seeing it
        assert_eq!(before.log.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.adi");
        std::fs::write(&path, TWO_QSOS).unwrap();

        let reloader = LogReloader::load(&path).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = reloader.reload().await.unwrap_err();
        assert!(matches!(err, LogError::Read { .. }));

        let current = reloader.current().await;
        assert_eq!(current.log.len(), 2);
        assert_eq!(current.log.qsos()[1].call, "K1AB");
    }

    #[tokio::test]
    async fn test_initial_load_fails_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LogReloader::load(dir.path().join("missing.adi")).await.is_err());
    }
}
