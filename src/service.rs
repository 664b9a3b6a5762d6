//! The scrape pipeline: fetch, extract, normalize, publish.
//!
//! Each call is independent. A failure at any stage ends the call and is
//! reported through [`ScrapeResult::Error`]; nothing is retried.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::api::models::{ScrapeResult, ScrapedContent};
use crate::config::Config;
use crate::error::{Result, ScrapeError};
use crate::scraper::{clean_html, ContentRules, Fetcher};
use crate::storage::{ObjectStore, Publisher};

pub struct ContentScraper {
    fetcher: Fetcher,
    rules: Arc<ContentRules>,
    publisher: Publisher,
}

impl ContentScraper {
    pub fn new(config: &Config, store: Arc<dyn ObjectStore>) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(&config.scrape)?,
            rules: Arc::new(ContentRules::default()),
            publisher: Publisher::new(store, config.store.upload_timeout),
        })
    }

    /// Replaces the content-selection rules.
    pub fn with_rules(mut self, rules: ContentRules) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    /// Runs the pipeline and folds any failure into the error variant.
    pub async fn scrape(&self, url: &str) -> ScrapeResult {
        let result = self.try_scrape(url).await;
        if let Err(err) = &result {
            warn!(url, kind = ?err.kind(), error = %err, "scrape failed");
        }
        result.into()
    }

    /// Same as [`scrape`](Self::scrape) but keeps the typed error.
    pub async fn try_scrape(&self, url: &str) -> Result<ScrapedContent> {
        let started = Instant::now();
        info!(url, "scraping");

        let document = self.fetcher.fetch(url).await?;

        // Parsing is CPU bound and the parsed tree is not Send.
        let rules = Arc::clone(&self.rules);
        let cleaned_text = tokio::task::spawn_blocking(move || clean_html(&document.body, &rules))
            .await
            .map_err(|e| ScrapeError::Parse(e.to_string()))?;

        let published = self.publisher.publish(&cleaned_text, url, Utc::now()).await?;

        let content_length = cleaned_text.chars().count();
        info!(
            url,
            key = %published.key,
            content_length,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scrape complete"
        );

        Ok(ScrapedContent {
            cleaned_text,
            s3_url: published.location,
            filename: published.key,
            content_length,
        })
    }
}
