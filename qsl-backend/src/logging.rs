use anyhow::Context;
use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tokio::task;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt, prelude::*};

/// Keeps the file writer flushing; drop it only on shutdown.
#[allow(dead_code)]
pub struct LoggerGuard(WorkerGuard);

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Console + daily rolling file logging. `RUST_LOG` refines the configured level.
///
/// Must be called from within a tokio runtime: files older than `retention_days`
/// are pruned in the background.
pub fn init_logging(
    log_dir: impl AsRef<Path>,
    prefix: &str,
    level: &str,
    retention_days: u64,
) -> anyhow::Result<LoggerGuard> {
    let log_dir = log_dir.as_ref().to_path_buf();

    let valid_level = LEVELS.contains(&level);
    let default_level: LevelFilter = if valid_level {
        level.parse().unwrap_or(LevelFilter::INFO)
    } else {
        LevelFilter::INFO
    };

    let builder = EnvFilter::builder().with_default_directive(default_level.into());
    let rust_log = std::env::var("RUST_LOG").unwrap_or_default();
    let console_filter = builder.clone().parse_lossy(&rust_log);
    let file_filter = builder.parse_lossy(&rust_log);

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(&log_dir)
        .with_context(|| format!("Failed to create log file appender in {:?}", log_dir))?;
    let (non_blocking, guard) = NonBlocking::new(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(file_filter);
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if !valid_level {
        tracing::warn!("Invalid log level '{}', defaulting to 'info'", level);
    }

    start_log_cleanup_task(
        log_dir,
        prefix.to_string(),
        Duration::from_secs(retention_days.max(1) * 24 * 60 * 60),
    );

    Ok(LoggerGuard(guard))
}

fn start_log_cleanup_task(log_dir: PathBuf, prefix: String, retention: Duration) {
    const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

    task::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            match cleanup_old_logs(&log_dir, &prefix, retention) {
                Ok(0) => {}
                Ok(deleted) => tracing::info!("Deleted {} old log files from {:?}", deleted, log_dir),
                Err(e) => tracing::warn!("Log cleanup in {:?} failed: {}", log_dir, e),
            }
        }
    });
}

/// Delete `<prefix>*.log` files in `log_dir` last modified more than `max_age` ago.
fn cleanup_old_logs(log_dir: &Path, prefix: &str, max_age: Duration) -> std::io::Result<usize> {
    let now = SystemTime::now();
    let is_ours = |path: &Path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".log"))
    };

    let mut deleted = 0;
    for path in fs::read_dir(log_dir)?.filter_map(|e| e.ok().map(|e| e.path())) {
        if !is_ours(&path) {
            continue;
        }
        let age = fs::metadata(&path)?
            .modified()
            .map(|modified| now.duration_since(modified).unwrap_or_default())
            .unwrap_or_default();
        if age > max_age {
            fs::remove_file(&path)?;
            deleted += 1;
        }
    }
    Ok(deleted)
}
