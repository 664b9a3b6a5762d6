pub mod api;
pub mod config;
pub mod error;
pub mod scraper;
pub mod service;
pub mod storage;

use std::sync::Arc;
use service::ContentScraper;

pub use api::models::{ScrapeRequest, ScrapeResult, ScrapedContent};
pub use error::{ErrorKind, ScrapeError};

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub scraper: Arc<ContentScraper>,
}
