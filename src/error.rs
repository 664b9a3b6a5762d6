use axum::{
    response::{IntoResponse, Response},
    Json,
    http::StatusCode,
};
use serde::Serialize;

/// Which pipeline stage produced a [`ScrapeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    Parse,
    Publish,
    Config,
}

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Request failed: {0}")]
    Fetch(String),

    #[error("Processing failed: {0}")]
    Parse(String),

    #[error("Processing failed: {0}")]
    Publish(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::Fetch(_) => ErrorKind::Fetch,
            ScrapeError::Parse(_) => ErrorKind::Parse,
            ScrapeError::Publish(_) => ErrorKind::Publish,
            ScrapeError::Config(_) => ErrorKind::Config,
        }
    }
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Fetch => StatusCode::BAD_GATEWAY,
            ErrorKind::Parse => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Publish | ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: &'static str,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status: "error",
        }
    }
}

impl IntoResponse for ScrapeError {
    fn into_response(self) -> Response {
        let status = self.kind().status_code();
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::Fetch(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
