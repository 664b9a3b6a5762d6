use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{Result, ScrapeError};

pub const KEY_PREFIX: &str = "scraped_content/";
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://").expect("Failed to compile scheme regex"));

/// An object ready to be written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    async fn put_object(&self, object: StoredObject) -> Result<()>;
}

pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    pub async fn new(config: &StoreConfig) -> Self {
        let region = Region::new(config.region.clone());

        let mut builder = match (&config.access_key_id, &config.secret_access_key) {
            (Some(key), Some(secret)) => aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(Credentials::new(key, secret, None, None, "kastor-config")),
            _ => {
                debug!("no static credentials configured, using default provider chain");
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(&self, object: StoredObject) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&object.key)
            .content_type(&object.content_type)
            .body(ByteStream::from(object.body));
        for (name, value) in &object.metadata {
            request = request.metadata(name, value);
        }

        request
            .send()
            .await
            .map_err(|e| ScrapeError::Publish(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

/// Keeps objects in memory. Useful for tests and dry runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    bucket: String,
    objects: Arc<Mutex<Vec<StoredObject>>>,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::default(),
        }
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(&self, object: StoredObject) -> Result<()> {
        self.objects
            .lock()
            .map_err(|e| ScrapeError::Publish(e.to_string()))?
            .push(object);
        Ok(())
    }
}

/// Strips URL schemes and replaces `/` and `.` so the URL fits in a key.
pub fn sanitize_url(url: &str) -> String {
    SCHEME.replace_all(url, "").replace(['/', '.'], "_")
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn object_key(timestamp: &str, url: &str) -> String {
    format!("{}{}_{}.txt", KEY_PREFIX, timestamp, sanitize_url(url))
}

/// Where a published text ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub key: String,
    pub location: String,
}

pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    upload_timeout: Duration,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>, upload_timeout: Duration) -> Self {
        Self { store, upload_timeout }
    }

    /// Uploads `text` under a key derived from `scraped_at` and `source_url`.
    pub async fn publish(&self, text: &str, source_url: &str, scraped_at: DateTime<Utc>) -> Result<Published> {
        let timestamp = format_timestamp(scraped_at);
        let key = object_key(&timestamp, source_url);

        let metadata = HashMap::from([
            ("source_url".to_string(), source_url.to_string()),
            ("scraped_at".to_string(), timestamp),
        ]);
        let object = StoredObject {
            key: key.clone(),
            body: text.as_bytes().to_vec(),
            content_type: "text/plain".to_string(),
            metadata,
        };
        let bytes = object.body.len();

        tokio::time::timeout(self.upload_timeout, self.store.put_object(object))
            .await
            .map_err(|_| ScrapeError::Publish(format!("upload timed out after {:?}", self.upload_timeout)))??;

        let location = format!("s3://{}/{}", self.store.bucket(), key);
        info!(key = %key, bytes, bucket = self.store.bucket(), "published scraped text");

        Ok(Published { key, location })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn builds_sortable_sanitized_key() {
        let key = object_key(&format_timestamp(noon()), "https://example.com/a/b.html");
        assert_eq!(key, "scraped_content/20240101_120000_example_com_a_b_html.txt");
    }

    #[test]
    fn sanitize_strips_either_scheme() {
        assert_eq!(sanitize_url("http://www.rust-lang.org/"), "www_rust-lang_org_");
        assert_eq!(sanitize_url("https://example.com"), "example_com");
        assert_eq!(sanitize_url("example.com/x"), "example_com_x");
    }

    #[tokio::test]
    async fn publish_writes_text_with_metadata() {
        let store = MemoryStore::new("bucket");
        let publisher = Publisher::new(Arc::new(store.clone()), Duration::from_secs(5));

        let published = publisher
            .publish("héllo", "https://example.com/a/b.html", noon())
            .await
            .unwrap();

        assert_eq!(published.key, "scraped_content/20240101_120000_example_com_a_b_html.txt");
        assert_eq!(published.location, format!("s3://bucket/{}", published.key));

        let objects = store.objects();
        assert_eq!(objects.len(), 1);
        let object = &objects[0];
        assert_eq!(object.body, "héllo".as_bytes());
        assert_eq!(object.content_type, "text/plain");
        assert_eq!(object.metadata["source_url"], "https://example.com/a/b.html");
        assert_eq!(object.metadata["scraped_at"], "20240101_120000");
    }

    struct SlowStore;

    #[async_trait]
    impl ObjectStore for SlowStore {
        fn bucket(&self) -> &str {
            "slow"
        }

        async fn put_object(&self, _object: StoredObject) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn upload_is_bounded_by_timeout() {
        let publisher = Publisher::new(Arc::new(SlowStore), Duration::from_secs(1));
        let err = publisher.publish("x", "https://example.com", noon()).await.unwrap_err();

        assert!(matches!(err, ScrapeError::Publish(_)));
        assert!(err.to_string().starts_with("Processing failed: upload timed out"));
    }
}
