use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce a log from the ADIF file. Record-level problems never surface here.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Failed to read ADIF file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum MapError {
    #[error("Invalid grid locator '{0}'")]
    InvalidLocator(String),

    #[error("Failed to build map SVG: {0}")]
    Svg(String),

    #[error("Failed to render map: {0}")]
    Render(String),

    #[error("Map I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Map error: {0}")]
    Map(#[from] MapError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Map(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
