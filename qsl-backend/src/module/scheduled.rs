///! Scheduled task manager - Centralize all periodic tasks
///!
///! This module manages all scheduled background tasks:
///! - ADIF log reloads (every `reload_interval`)
///! - Map cache cleanup (every `map_cleanup_interval`)

use super::logbook::LogReloader;
use super::map::cleanup_old_maps;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::AppConfig;

/// Configuration for scheduled tasks
#[derive(Debug, Clone)]
pub struct ScheduledTaskConfig {
    /// Interval between ADIF reloads
    pub reload_interval: Duration,

    /// Interval between map cache cleanups
    pub map_cleanup_interval: Duration,

    /// Number of days to keep cached maps (0 disables cleanup)
    pub map_retention_days: i64,

    /// Rendered map directory
    pub map_dir: PathBuf,
}

impl Default for ScheduledTaskConfig {
    fn default() -> Self {
        Self {
            reload_interval: Duration::from_secs(5 * 60),
            map_cleanup_interval: Duration::from_secs(24 * 60 * 60),
            map_retention_days: 30,
            map_dir: PathBuf::from("maps"),
        }
    }
}

impl From<&AppConfig> for ScheduledTaskConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            reload_interval: Duration::from_secs(config.reload_interval_secs.max(1)),
            map_cleanup_interval: Duration::from_secs(config.map_cleanup_interval_hours.max(1) * 60 * 60),
            map_retention_days: config.map_retention_days,
            map_dir: config.map_dir.clone(),
        }
    }
}

/// Scheduled task manager
pub struct ScheduledTaskManager {
    config: ScheduledTaskConfig,
    reloader: Arc<LogReloader>,
    task_handles: Vec<JoinHandle<()>>,
}

impl ScheduledTaskManager {
    /// Create a new scheduled task manager
    pub fn new(config: ScheduledTaskConfig, reloader: Arc<LogReloader>) -> Self {
        Self {
            config,
            reloader,
            task_handles: Vec::new(),
        }
    }

    /// Start all scheduled tasks
    pub fn start_all(&mut self) {
        tracing::info!("Starting scheduled task manager...");

        let reload_handle = self.start_reload_task();
        self.task_handles.push(reload_handle);

        if self.config.map_retention_days > 0 {
            let cleanup_handle = self.start_map_cleanup_task();
            self.task_handles.push(cleanup_handle);
        } else {
            tracing::info!("Map cache cleanup disabled (retention 0 days)");
        }

        tracing::info!(
            "Started {} scheduled tasks (ADIF reload every {:?}, map cleanup every {:?})",
            self.task_handles.len(),
            self.config.reload_interval,
            self.config.map_cleanup_interval
        );
    }

    /// Start the periodic ADIF reload task
    fn start_reload_task(&self) -> JoinHandle<()> {
        let reloader = self.reloader.clone();
        let period = self.config.reload_interval;

        tracing::info!(
            "Scheduling ADIF reload task (interval: {:?}, file: {})",
            period,
            reloader.path().display()
        );

        tokio::spawn(Self::reload_loop(reloader, period))
    }

    /// Reload loop. The initial load happens before the manager starts, so the
    /// first tick waits a full period. Failures are not retried until the next tick.
    async fn reload_loop(reloader: Arc<LogReloader>, period: Duration) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = reloader.reload().await {
                tracing::error!("Failed to reload ADIF file: {}", e);
            }
        }
    }

    /// Start map cache cleanup task
    fn start_map_cleanup_task(&self) -> JoinHandle<()> {
        let map_dir = self.config.map_dir.clone();
        let period = self.config.map_cleanup_interval;
        let retention_days = self.config.map_retention_days;

        tracing::info!(
            "Scheduling map cleanup task (interval: {:?}, retention: {} days)",
            period,
            retention_days
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match cleanup_old_maps(&map_dir, retention_days).await {
                    Ok(0) => tracing::debug!("Map cleanup completed: no old maps to delete"),
                    Ok(deleted_count) => {
                        tracing::info!("Map cleanup completed: deleted {} old maps", deleted_count)
                    }
                    Err(e) => tracing::error!("Map cleanup failed: {}", e),
                }
            }
        })
    }

    /// Number of running tasks
    pub fn task_count(&self) -> usize {
        self.task_handles.len()
    }

    /// Gracefully shutdown all tasks
    pub async fn shutdown(self) {
        tracing::info!("Shutting down scheduled task manager...");

        for handle in self.task_handles {
            handle.abort();
        }

        tracing::info!("All scheduled tasks stopped");
    }
}
