use axum::body::{Body, to_bytes};
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode, header};
use qsl_backend::config::AppConfig;
use qsl_backend::module::logbook::LogReloader;
use qsl_backend::service::{AppState, router};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;

const LOG: &str = "<EOH><CALL:4>W1AW<QSO_DATE:8>20240115<TIME_ON:6>143000<BAND:3>20m<EOR>";

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Captured;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

async fn search(app: &axum::Router, callsign: &str, minute: &str) -> StatusCode {
    let body = serde_json::json!({
        "callsign": callsign,
        "year": "2024",
        "month": "1",
        "day": "15",
        "hour": "14",
        "minute": minute,
    });
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/search")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    to_bytes(response.into_body(), usize::MAX).await.unwrap();
    status
}

// Default flavor runs on the current thread, so the scoped subscriber sees every event.
#[tokio::test]
async fn test_lookups_and_requests_are_logged_with_client_address() {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(captured.clone())
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .finish();
    let _default = tracing::subscriber::set_default(subscriber);

    let dir = tempfile::tempdir().unwrap();
    let adif_path = dir.path().join("log.adi");
    std::fs::write(&adif_path, LOG).unwrap();
    let mut config = AppConfig::new(&adif_path);
    config.map_dir = dir.path().join("maps");

    let reloader = LogReloader::load(&adif_path).await.unwrap();
    let app = router(AppState::new(config, reloader))
        .layer(MockConnectInfo(SocketAddr::from(([198, 51, 100, 4], 52000))));

    assert_eq!(search(&app, "w1aw", "35").await, StatusCode::OK);
    assert_eq!(search(&app, "K1AB", "35").await, StatusCode::NOT_FOUND);

    let output = captured.text();
    assert!(
        output.contains("QSO_SEARCH W1AW 2024-01-15 14:35 198.51.100.4:52000 - SUCCESS"),
        "missing successful lookup in:\n{}",
        output
    );
    assert!(
        output.contains("QSO_SEARCH K1AB 2024-01-15 14:35 198.51.100.4:52000 - NOT_FOUND"),
        "missing failed lookup in:\n{}",
        output
    );

    // Access log: one line per request, with method, path and remote address from the span
    let access: Vec<_> = output.lines().filter(|l| l.contains(" access: ")).collect();
    assert_eq!(access.len(), 2, "access lines in:\n{}", output);
    assert!(access[0].contains("method=POST"));
    assert!(access[0].contains("path=/api/search"));
    assert!(access[0].contains("remote=198.51.100.4:52000"));
    assert!(access[0].contains("200 OK"));
    assert!(access[1].contains("404 Not Found"));
}
