use axum::{
    routing::{get, post},
    Router,
    extract::{rejection::JsonRejection, Json, State},
    response::{IntoResponse, Response},
};
use tower_http::cors::{CorsLayer, Any};
use tracing::{info, warn};

use crate::api::models::ScrapeRequest;
use crate::api::response;
use crate::AppState;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/scrape", post(scrape_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn health_handler() -> impl IntoResponse {
    response::health()
}

async fn scrape_handler(
    State(state): State<AppState>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            warn!(error = %rejection, "rejected scrape request body");
            return response::bad_request(&rejection.body_text()).into_response();
        }
    };

    // The URL is passed on as sent; only a blank one is refused here.
    if req.url.trim().is_empty() {
        return response::bad_request("URL is required").into_response();
    }

    info!(url = %req.url, "received scrape request");
    state.scraper.scrape(&req.url).await.into_response()
}
