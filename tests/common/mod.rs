#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kastor_scraper::config::Config;
use kastor_scraper::error::{Result, ScrapeError};
use kastor_scraper::service::ContentScraper;
use kastor_scraper::storage::{ObjectStore, StoredObject};

pub fn test_config() -> Config {
    let mut config = Config::from_lookup(|_| None).expect("default config");
    config.scrape.fetch_timeout = Duration::from_secs(5);
    config.store.upload_timeout = Duration::from_secs(5);
    config
}

pub fn scraper_with(store: Arc<dyn ObjectStore>) -> ContentScraper {
    ContentScraper::new(&test_config(), store).expect("scraper should build")
}

/// Rejects every upload the way a store with bad credentials would.
pub struct FailingStore;

#[async_trait]
impl ObjectStore for FailingStore {
    fn bucket(&self) -> &str {
        "denied-bucket"
    }

    async fn put_object(&self, _object: StoredObject) -> Result<()> {
        Err(ScrapeError::Publish("InvalidAccessKeyId: The AWS Access Key Id you provided does not exist".to_string()))
    }
}

pub const ARTICLE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Example</title><style>body { margin: 0 }</style></head>
<body>
  <header>Site header</header>
  <nav><a href="/">Home</a> <a href="/about">About</a></nav>
  <main>
    <p>Main column text</p>
    <article>
      <h1>Article   title</h1>
      <p>Article
         body text.</p>
      <script>window.tracking = true;</script>
    </article>
  </main>
  <aside>Related links</aside>
  <footer>Copyright</footer>
</body>
</html>"#;
