use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ScrapeError};

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub url: String,
}

/// Output of a successful scrape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapedContent {
    pub cleaned_text: String,
    pub s3_url: String,
    pub filename: String,
    pub content_length: usize,
}

/// Serializes to `{"status": "success", ...}` or
/// `{"status": "error", "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScrapeResult {
    Success(ScrapedContent),
    Error {
        error: String,
        #[serde(skip)]
        kind: ErrorKind,
    },
}

impl ScrapeResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ScrapeResult::Success(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            ScrapeResult::Success(_) => "success",
            ScrapeResult::Error { .. } => "error",
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ScrapeResult::Success(_) => None,
            ScrapeResult::Error { kind, .. } => Some(*kind),
        }
    }
}

impl From<ScrapeError> for ScrapeResult {
    fn from(err: ScrapeError) -> Self {
        ScrapeResult::Error {
            kind: err.kind(),
            error: err.to_string(),
        }
    }
}

impl From<Result<ScrapedContent, ScrapeError>> for ScrapeResult {
    fn from(result: Result<ScrapedContent, ScrapeError>) -> Self {
        match result {
            Ok(content) => ScrapeResult::Success(content),
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_serializes_flat_with_status() {
        let result = ScrapeResult::Success(ScrapedContent {
            cleaned_text: "hi".to_string(),
            s3_url: "s3://b/k.txt".to_string(),
            filename: "k.txt".to_string(),
            content_length: 2,
        });

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "status": "success",
                "cleaned_text": "hi",
                "s3_url": "s3://b/k.txt",
                "filename": "k.txt",
                "content_length": 2
            })
        );
        assert!(result.is_success());
        assert_eq!(result.error_kind(), None);
    }

    #[test]
    fn error_serializes_message_only() {
        let result = ScrapeResult::from(ScrapeError::Fetch("timed out".to_string()));

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "status": "error", "error": "Request failed: timed out" })
        );
        assert_eq!(result.status(), "error");
        assert_eq!(result.error_kind(), Some(ErrorKind::Fetch));
    }

    #[test]
    fn missing_url_deserializes_as_empty() {
        let req: ScrapeRequest = serde_json::from_str("{}").unwrap();
        assert!(req.url.is_empty());
    }
}
