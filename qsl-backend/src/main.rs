use qsl_backend::config;
use qsl_backend::module::logbook::LogReloader;
use qsl_backend::module::scheduled::{ScheduledTaskConfig, ScheduledTaskManager};
use qsl_backend::service::{self, AppState};

use anyhow::{Context, Result};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::read_config()?;

    // Initialize logging
    let _logging_guard = qsl_backend::logging::init_logging(
        &config.log_dir,
        "qsl-backend",
        &config.log_level,
        config.log_retention_days,
    )?;

    tracing::info!("QSL backend starting...");
    tracing::info!("Server will listen on {}", config.server_address());

    tokio::fs::create_dir_all(&config.map_dir)
        .await
        .with_context(|| format!("Failed to create map directory {:?}", config.map_dir))?;

    // Initial load; the service does not start without a readable log
    let reloader = LogReloader::load(&config.adif_path).await?;
    tracing::info!(
        "Loaded {} QSOs from {}",
        reloader.current().await.log.len(),
        config.adif_path.display()
    );

    let mut task_manager = ScheduledTaskManager::new(ScheduledTaskConfig::from(config), reloader.clone());
    task_manager.start_all();

    let app = service::router(AppState::new(config.clone(), reloader));

    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.server_address()))?;
    tracing::info!("HTTP server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    task_manager.shutdown().await;
    Ok(())
}
