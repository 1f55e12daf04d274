///! HTTP service
///!
///! JSON views over the logbook for the public QSL site, QSO path maps and
///! static assets.

use axum::{
    Json, Router,
    extract::{ConnectInfo, Path, Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use qsl_common::{Qso, time_ago};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{Span, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, MapError};
use crate::module::logbook::{LogReloader, normalize_callsign};
use crate::module::map::{GridMapRenderer, distance_km, map_file_name};

/// Shared state passed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub reloader: Arc<LogReloader>,
    pub renderer: Arc<GridMapRenderer>,
    render_locks: Arc<RenderLocks>,
}

impl AppState {
    pub fn new(config: AppConfig, reloader: Arc<LogReloader>) -> Self {
        Self {
            config: Arc::new(config),
            reloader,
            renderer: Arc::new(GridMapRenderer::new()),
            render_locks: Arc::default(),
        }
    }
}

/// One lock per map file name, so concurrent requests render a map once.
#[derive(Default)]
struct RenderLocks(Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>);

impl RenderLocks {
    fn lock_for(&self, file_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(file_name.to_string()).or_default().clone()
    }

    fn release(&self, file_name: &str) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).remove(file_name);
    }
}

/// A QSO together with its display fields
#[derive(Debug, Serialize)]
pub struct QsoView {
    #[serde(flatten)]
    pub qso: Qso,
    pub date: String,
    pub time: String,
    pub qso_time: String,
    pub flag_code: &'static str,
    /// Permalink of this QSO, if it has a timestamp
    pub url: Option<String>,
}

impl From<&Qso> for QsoView {
    fn from(qso: &Qso) -> Self {
        Self {
            date: qso.format_date(),
            time: qso.format_time(),
            qso_time: qso.format_qso_time(),
            flag_code: qso.flag_code(),
            url: qso.timestamp.map(|ts| qso_url(&qso.call, ts.timestamp())),
            qso: qso.clone(),
        }
    }
}

fn views(qsos: Vec<&Qso>) -> Vec<QsoView> {
    qsos.into_iter().map(QsoView::from).collect()
}

/// "/W1AW-1705329000", call sign percent-encoded
pub fn qso_url(callsign: &str, unix_ts: i64) -> String {
    format!("/{}-{}", urlencoding::encode(callsign), unix_ts)
}

/// Split "W1AW-1705329000" on the last dash into an upper-cased call sign and a timestamp.
pub fn parse_qso_path(path: &str) -> Option<(String, i64)> {
    let (callsign, ts) = path.rsplit_once('-')?;
    let callsign = normalize_callsign(callsign);
    if callsign.is_empty() {
        return None;
    }
    Some((callsign, ts.parse().ok()?))
}

#[derive(Debug, Serialize)]
pub struct HomeData {
    pub total_qsos: usize,
    pub unique_countries: usize,
    pub latest_qsos: Vec<QsoView>,
    pub paper_qsl_hall_of_fame: Vec<QsoView>,
    pub latest_qso_date: Option<String>,
    pub latest_qso_time_ago: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QrzData {
    pub latest_qsos: Vec<QsoView>,
    pub paper_qsl_hall_of_fame: Vec<QsoView>,
}

#[derive(Debug, Serialize)]
pub struct QsoResult {
    pub callsign: String,
    pub qso: QsoView,
    pub all_qsos: Vec<QsoView>,
    pub map_url: Option<String>,
    pub distance_km: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub callsign: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub month: String,
    #[serde(default)]
    pub day: String,
    #[serde(default)]
    pub hour: String,
    #[serde(default)]
    pub minute: String,
}

impl SearchRequest {
    /// Validate the form and build the UTC search time
    fn search_time(&self) -> Result<DateTime<Utc>, AppError> {
        let fields = [&self.year, &self.month, &self.day, &self.hour, &self.minute];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(AppError::BadRequest("All date and time fields are required".to_string()));
        }

        let invalid = || AppError::BadRequest("Invalid date and time values".to_string());
        let num = |s: &str| s.trim().parse::<u32>().map_err(|_| invalid());

        let year = self.year.trim().parse::<i32>().map_err(|_| invalid())?;
        let date = NaiveDate::from_ymd_opt(year, num(&self.month)?, num(&self.day)?).ok_or_else(invalid)?;
        let time = date
            .and_hms_opt(num(&self.hour)?, num(&self.minute)?, 0)
            .ok_or_else(invalid)?;
        Ok(time.and_utc())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub url: String,
}

/// Build the application router.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`: the
/// access and lookup logs record the client address.
pub fn router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .route("/api/home", get(home))
        .route("/api/qrz", get(qrz))
        .route("/api/search", post(search))
        .route("/{path}", get(qso_or_map))
        .nest_service("/static", static_files)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Added after the CORS layer: browsers on other origins cannot trigger reloads
        .route("/api/reload", post(reload))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(access_span)
                .on_response(log_access),
        )
        .with_state(state)
}

fn remote_addr(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "-".to_string(), |ConnectInfo(addr)| addr.to_string())
}

fn access_span(request: &Request) -> Span {
    tracing::info_span!(
        target: "access",
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        remote = %remote_addr(request),
    )
}

fn log_access(response: &Response, latency: Duration, _span: &Span) {
    info!(target: "access", "{} - {:?}", response.status(), latency);
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Stats endpoint - returns basic server information
async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.reloader.current().await;
    Json(serde_json::json!({
        "status": "running",
        "service": "qsl-backend",
        "version": env!("CARGO_PKG_VERSION"),
        "qsos": snapshot.log.len(),
        "source": snapshot.path.display().to_string(),
        "loaded_at": snapshot.loaded_at,
    }))
}

async fn home(State(state): State<AppState>) -> Json<HomeData> {
    let snapshot = state.reloader.current().await;
    let log = &snapshot.log;
    let latest = log.latest_one();

    Json(HomeData {
        total_qsos: log.total_count(),
        unique_countries: log.unique_countries_count(),
        latest_qsos: views(log.latest(state.config.latest_count)),
        paper_qsl_hall_of_fame: views(log.confirmed_unique()),
        latest_qso_date: latest.map(Qso::format_date),
        latest_qso_time_ago: latest
            .and_then(|qso| qso.timestamp)
            .map(|ts| time_ago(ts, Utc::now())),
    })
}

async fn qrz(State(state): State<AppState>) -> Json<QrzData> {
    let snapshot = state.reloader.current().await;
    Json(QrzData {
        latest_qsos: views(snapshot.log.latest(state.config.latest_count)),
        paper_qsl_hall_of_fame: views(snapshot.log.confirmed_unique()),
    })
}

async fn search(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let callsign = normalize_callsign(&request.callsign);
    if callsign.is_empty() {
        return Err(AppError::BadRequest("Call sign is required".to_string()));
    }
    let search_time = request.search_time()?;

    let snapshot = state.reloader.current().await;
    let found = snapshot
        .log
        .search(&callsign, search_time, state.config.search_tolerance_minutes);

    info!(
        target: "lookup",
        "QSO_SEARCH {} {} {} - {}",
        callsign,
        search_time.format("%Y-%m-%d %H:%M"),
        remote,
        if found.is_some() { "SUCCESS" } else { "NOT_FOUND" }
    );

    let qso = found.ok_or_else(|| {
        AppError::NotFound(format!(
            "No QSO found for {} around {} UTC",
            callsign,
            search_time.format("%Y-%m-%d %H:%M")
        ))
    })?;

    // A match always has a timestamp
    let ts = qso.timestamp.map(|t| t.timestamp()).unwrap_or_default();
    Ok(Json(SearchResponse {
        url: qso_url(&qso.call, ts),
    }))
}

/// Whether `headers` carry `Authorization: Bearer <token>` for the configured reload token.
fn reload_authorized(config: &AppConfig, headers: &HeaderMap) -> bool {
    let Some(expected) = config.reload_token.as_deref() else {
        return false;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

async fn reload(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, AppError> {
    if !reload_authorized(&state.config, &headers) {
        return Err(AppError::Forbidden("Reload is not permitted".to_string()));
    }

    let snapshot = state.reloader.reload().await.map_err(|e| {
        warn!("On-demand reload failed: {}", e);
        AppError::Internal(e.to_string())
    })?;

    Ok(Json(serde_json::json!({
        "qsos": snapshot.log.len(),
        "loaded_at": snapshot.loaded_at,
    })))
}

async fn qso_or_map(State(state): State<AppState>, Path(path): Path<String>) -> Result<Response, AppError> {
    match path.strip_suffix(".png") {
        Some(stem) => qso_map(state, stem).await,
        None => qso_result(state, &path).await.map(IntoResponse::into_response),
    }
}

async fn qso_result(state: AppState, path: &str) -> Result<Json<QsoResult>, AppError> {
    let not_found = || AppError::NotFound(format!("No QSO found for '{}'", path));

    let (callsign, ts) = parse_qso_path(path).ok_or_else(not_found)?;
    let target = DateTime::from_timestamp(ts, 0).ok_or_else(not_found)?;

    let snapshot = state.reloader.current().await;
    let qso = snapshot
        .log
        .search(&callsign, target, state.config.search_tolerance_minutes)
        .ok_or_else(not_found)?;

    let (map_url, distance) = if qso.has_grids() {
        let file_name = map_file_name(&callsign, ts);
        spawn_map_generation(state.clone(), file_name, qso.my_gridsquare.clone(), qso.gridsquare.clone());

        let distance = distance_km(&qso.my_gridsquare, &qso.gridsquare)
            .inspect_err(|e| warn!("Cannot compute distance for {}: {}", callsign, e))
            .ok();
        (Some(format!("{}.png", qso_url(&callsign, ts))), distance)
    } else {
        (None, None)
    };

    Ok(Json(QsoResult {
        qso: QsoView::from(qso),
        all_qsos: views(snapshot.log.by_callsign(&callsign)),
        callsign,
        map_url,
        distance_km: distance,
    }))
}

async fn qso_map(state: AppState, stem: &str) -> Result<Response, AppError> {
    let not_found = || AppError::NotFound("Map not found".to_string());

    let (callsign, ts) = parse_qso_path(stem).ok_or_else(not_found)?;
    let file_name = map_file_name(&callsign, ts);
    let map_path = state.config.map_dir.join(&file_name);

    let png = match tokio::fs::read(&map_path).await {
        Ok(png) => png,
        Err(_) => {
            let target = DateTime::from_timestamp(ts, 0).ok_or_else(not_found)?;
            let snapshot = state.reloader.current().await;
            let qso = snapshot
                .log
                .search(&callsign, target, state.config.search_tolerance_minutes)
                .filter(|qso| qso.has_grids())
                .ok_or_else(not_found)?;

            generate_map(&state, &file_name, &qso.my_gridsquare, &qso.gridsquare).await?
        }
    };

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// Return the cached map, rendering it on the blocking pool first if needed.
///
/// Renders of the same file are serialized; a request that waited for another
/// render picks up its result from the cache.
async fn generate_map(state: &AppState, file_name: &str, my_grid: &str, their_grid: &str) -> Result<Vec<u8>, MapError> {
    let lock = state.render_locks.lock_for(file_name);
    let result = {
        let _guard = lock.lock().await;
        let map_config = state.config.map_config(file_name);

        match tokio::fs::read(&map_config.output_path).await {
            Ok(png) => Ok(png),
            Err(_) => {
                let renderer = state.renderer.clone();
                let (mine, theirs) = (my_grid.to_string(), their_grid.to_string());
                let output_path = map_config.output_path.clone();

                let png = tokio::task::spawn_blocking(move || renderer.create_grid_map(&mine, &theirs, &map_config))
                    .await
                    .unwrap_or_else(|e| Err(MapError::Render(e.to_string())));
                if png.is_ok() {
                    info!("Generated map {:?}", output_path);
                }
                png
            }
        }
    };
    state.render_locks.release(file_name);
    result
}

/// Generate the map for a result page in the background if it is not cached yet.
fn spawn_map_generation(state: AppState, file_name: String, my_grid: String, their_grid: String) {
    tokio::spawn(async move {
        if tokio::fs::try_exists(state.config.map_dir.join(&file_name)).await.unwrap_or(false) {
            return;
        }
        if let Err(e) = generate_map(&state, &file_name, &my_grid, &their_grid).await {
            warn!("Failed to generate map {}: {}", file_name, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qso_path() {
        assert_eq!(parse_qso_path("W1AW-1705329000"), Some(("W1AW".to_string(), 1705329000)));
        assert_eq!(parse_qso_path("vk2/w1aw-5"), Some(("VK2/W1AW".to_string(), 5)));
        assert_eq!(parse_qso_path("A-B-C-12"), Some(("A-B-C".to_string(), 12)));
        assert_eq!(parse_qso_path("W1AW"), None);
        assert_eq!(parse_qso_path("W1AW-abc"), None);
        assert_eq!(parse_qso_path("-12"), None);
    }

    #[test]
    fn test_qso_url_encodes_callsign() {
        assert_eq!(qso_url("W1AW", 1), "/W1AW-1");
        assert_eq!(qso_url("VK2/W1AW", 1), "/VK2%2FW1AW-1");
    }

    #[test]
    fn test_search_time_validation() {
        let mut request = SearchRequest {
            callsign: "W1AW".to_string(),
            year: "2024".to_string(),
            month: "1".to_string(),
            day: "15".to_string(),
            hour: "14".to_string(),
            minute: "30".to_string(),
        };
        assert_eq!(request.search_time().unwrap().to_rfc3339(), "2024-01-15T14:30:00+00:00");

        request.month = "13".to_string();
        assert!(matches!(request.search_time(), Err(AppError::BadRequest(_))));

        request.month = " ".to_string();
        let err = request.search_time().unwrap_err();
        assert_eq!(err.to_string(), "All date and time fields are required");
    }

    #[test]
    fn test_reload_requires_configured_bearer_token() {
        let mut config = AppConfig::new("log.adi");
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer s3cret".parse().unwrap());

        // No token configured: reload is disabled
        assert!(!reload_authorized(&config, &headers));

        config.reload_token = Some("s3cret".to_string());
        assert!(reload_authorized(&config, &headers));

        headers.insert(header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
        assert!(!reload_authorized(&config, &headers));
        assert!(!reload_authorized(&config, &HeaderMap::new()));
    }

    #[test]
    fn test_render_locks_are_shared_per_file() {
        let locks = RenderLocks::default();
        let a = locks.lock_for("W1AW-1.png");
        let b = locks.lock_for("W1AW-1.png");
        let c = locks.lock_for("K1AB-1.png");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));

        locks.release("W1AW-1.png");
        assert!(!Arc::ptr_eq(&a, &locks.lock_for("W1AW-1.png")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_map_requests_share_one_published_file() {
        let dir = tempfile::tempdir().unwrap();
        let adif_path = dir.path().join("log.adi");
        std::fs::write(&adif_path, "<EOH>").unwrap();

        let mut config = AppConfig::new(&adif_path);
        config.map_dir = dir.path().join("maps");
        config.map_width = 200;
        config.map_height = 150;
        let state = AppState::new(config, LogReloader::load(&adif_path).await.unwrap());

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { generate_map(&state, "W1AW-1.png", "DM79hx", "FN31pr").await })
            })
            .collect();

        let mut maps = Vec::new();
        for handle in handles {
            maps.push(handle.await.unwrap().unwrap());
        }
        assert!(maps.iter().all(|png| png == &maps[0]));
        assert_eq!(std::fs::read(dir.path().join("maps/W1AW-1.png")).unwrap(), maps[0]);

        let files: Vec<_> = std::fs::read_dir(dir.path().join("maps")).unwrap().collect();
        assert_eq!(files.len(), 1);
    }
}
