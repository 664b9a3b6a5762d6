use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{ScrapeError, Result};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_BUCKET: &str = "kastor-scraped-content";

/// Settings for the fetch stage.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub user_agent: String,
    pub fetch_timeout: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout: Duration::from_secs(15),
        }
    }
}

/// Object store settings. Credentials are optional; without them the
/// default AWS credential chain is used.
#[derive(Clone)]
pub struct StoreConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
    pub bucket: String,
    pub endpoint_url: Option<String>,
    pub upload_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            region: DEFAULT_REGION.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            endpoint_url: None,
            upload_timeout: Duration::from_secs(30),
        }
    }
}

// Keep secrets out of logs.
impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<set>"))
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<set>"))
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("endpoint_url", &self.endpoint_url)
            .field("upload_timeout", &self.upload_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub scrape: ScrapeConfig,
    pub store: StoreConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = var("PORT").unwrap_or_else(|| "3000".to_string());
        let port = port.parse::<u16>().map_err(|e| ScrapeError::Config(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| ScrapeError::Config(format!("Invalid host address: {}", e)))?;

        let mut scrape = ScrapeConfig::default();
        if let Some(agent) = var("SCRAPE_USER_AGENT") {
            scrape.user_agent = agent;
        }
        if let Some(secs) = var("SCRAPE_TIMEOUT_SECS") {
            scrape.fetch_timeout = parse_secs("SCRAPE_TIMEOUT_SECS", &secs)?;
        }

        let mut store = StoreConfig {
            access_key_id: var("AWS_ACCESS_KEY_ID"),
            secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            endpoint_url: var("S3_ENDPOINT_URL"),
            ..StoreConfig::default()
        };
        if let Some(region) = var("AWS_REGION") {
            store.region = region;
        }
        if let Some(bucket) = var("S3_BUCKET") {
            store.bucket = bucket;
        }
        if let Some(secs) = var("S3_UPLOAD_TIMEOUT_SECS") {
            store.upload_timeout = parse_secs("S3_UPLOAD_TIMEOUT_SECS", &secs)?;
        }

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            scrape,
            store,
        })
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ScrapeError::Config(format!("{} must be at least 1", key))),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ScrapeError::Config(format!("Invalid {}: {}", key, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(config.store.region, "us-east-1");
        assert_eq!(config.store.bucket, "kastor-scraped-content");
        assert!(config.store.access_key_id.is_none());
        assert_eq!(config.scrape.fetch_timeout, Duration::from_secs(15));
        assert_eq!(config.scrape.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn reads_store_settings() {
        let config = Config::from_lookup(lookup(&[
            ("AWS_ACCESS_KEY_ID", "AKIA"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_REGION", "eu-west-1"),
            ("S3_BUCKET", "my-bucket"),
            ("S3_UPLOAD_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.store.access_key_id.as_deref(), Some("AKIA"));
        assert_eq!(config.store.region, "eu-west-1");
        assert_eq!(config.store.bucket, "my-bucket");
        assert_eq!(config.store.upload_timeout, Duration::from_secs(5));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[("S3_BUCKET", "  ")])).unwrap();
        assert_eq!(config.store.bucket, DEFAULT_BUCKET);
    }

    #[test]
    fn rejects_invalid_port_and_timeouts() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("PORT", "abc")])),
            Err(ScrapeError::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("SCRAPE_TIMEOUT_SECS", "0")])),
            Err(ScrapeError::Config(_))
        ));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let store = StoreConfig {
            secret_access_key: Some("hunter2".to_string()),
            ..StoreConfig::default()
        };
        assert!(!format!("{:?}", store).contains("hunter2"));
    }
}
