use serde::Serialize;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::api::models::ScrapeResult;
use crate::error::ErrorResponse;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub message: &'static str,
}

pub fn health() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            timestamp: Utc::now().to_rfc3339(),
            message: "Kastor scraper",
        }),
    )
}

pub fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

impl IntoResponse for ScrapeResult {
    fn into_response(self) -> Response {
        let status = self
            .error_kind()
            .map(|kind| kind.status_code())
            .unwrap_or(StatusCode::OK);

        (status, Json(self)).into_response()
    }
}
