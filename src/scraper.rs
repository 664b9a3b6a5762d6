use encoding_rs::{Encoding, UTF_8};
use html5ever::driver::{self, ParseOpts};
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use regex::bytes::Regex;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder};
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use once_cell::sync::Lazy;
use tracing::debug;

use crate::config::ScrapeConfig;
use crate::error::{Result, ScrapeError};

/// Longest cleaned text kept, in characters.
pub const MAX_TEXT_CHARS: usize = 10_000;
/// Appended when the cleaned text had to be cut.
pub const TRUNCATION_MARKER: &str = "...";

/// Elements dropped, with their descendants, before looking for content.
pub const NOISE_TAGS: [&str; 6] = ["script", "style", "nav", "footer", "header", "aside"];

// Create static selectors to avoid recompiling them each time
static NOISE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(&NOISE_TAGS.join(", ")).expect("Failed to parse noise selector")
});

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body").expect("Failed to parse body selector")
});

// Matches both `<meta charset=..>` and the http-equiv `content="..; charset=.."` form.
static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i-u)<meta[^>]*?charset\s*=\s*["']?\s*([a-z0-9_.:-]+)"#)
        .expect("Failed to compile meta charset regex")
});

/// How far into the body a `<meta>` charset declaration is looked for.
const SNIFF_BYTES: usize = 1024;

/// Markup returned by the fetch stage.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub url: String,
    pub body: String,
    /// Charset declared by the `Content-Type` header or, failing that, a
    /// `<meta>` tag. The body is already decoded with it.
    pub charset: Option<String>,
}

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .user_agent(config.user_agent.as_str())
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| ScrapeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Issues a single GET. Transport failures and non-2xx statuses are
    /// both reported as [`ScrapeError::Fetch`]; there are no retries.
    pub async fn fetch(&self, url: &str) -> Result<RawDocument> {
        let started = Instant::now();
        let response = self.client.get(url).send().await?.error_for_status()?;

        let status = response.status();
        let header_charset = declared_charset(response.headers());
        let bytes = response.bytes().await?;
        let (body, charset) = decode_body(&bytes, header_charset);

        debug!(
            url,
            status = status.as_u16(),
            bytes = bytes.len(),
            charset = charset.as_deref().unwrap_or("utf-8"),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched document"
        );

        Ok(RawDocument {
            url: url.to_string(),
            body,
            charset,
        })
    }
}

fn declared_charset(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_ascii_lowercase())
        .filter(|value| !value.is_empty())
}

fn sniffed_charset(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(SNIFF_BYTES)];
    let caps = META_CHARSET.captures(head)?;
    std::str::from_utf8(caps.get(1)?.as_bytes())
        .ok()
        .map(|label| label.to_ascii_lowercase())
}

/// Decodes the body with the header charset, then a `<meta>` declaration,
/// then UTF-8. A byte order mark overrides all of them. Returns the text
/// and the declared label that was used.
pub fn decode_body(bytes: &[u8], header_charset: Option<String>) -> (String, Option<String>) {
    let declared = header_charset
        .filter(|label| Encoding::for_label(label.as_bytes()).is_some())
        .or_else(|| sniffed_charset(bytes).filter(|label| Encoding::for_label(label.as_bytes()).is_some()));

    let encoding = declared
        .as_deref()
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);

    (text.into_owned(), declared)
}

/// Parses a full document with scripting disabled, so `<noscript>`
/// children become elements rather than raw text.
pub fn parse_html(html: &str) -> Html {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            scripting_enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    driver::parse_document(Html::new_document(), opts).one(html)
}

type Predicate = dyn for<'a> Fn(&ElementRef<'a>) -> bool + Send + Sync;

/// One structural hint for locating the main content of a page.
#[derive(Clone)]
pub struct ContentRule {
    name: String,
    predicate: Arc<Predicate>,
}

impl ContentRule {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&ElementRef<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self::new(tag.clone(), move |el| el.value().name() == tag)
    }

    /// Matches when the raw `class` attribute contains `needle` anywhere.
    pub fn class_contains(needle: impl Into<String>) -> Self {
        let needle = needle.into();
        Self::new(format!("[class*=\"{}\"]", needle), move |el| {
            el.value().attr("class").is_some_and(|class| class.contains(needle.as_str()))
        })
    }

    pub fn class(class: impl Into<String>) -> Self {
        let class = class.into();
        Self::new(format!(".{}", class), move |el| {
            el.value().classes().any(|c| c == class)
        })
    }

    pub fn id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(format!("#{}", id), move |el| el.value().id() == Some(id.as_str()))
    }

    pub fn css(selector: &str) -> Result<Self> {
        let parsed = Selector::parse(selector)
            .map_err(|e| ScrapeError::Config(format!("Invalid selector {:?}: {:?}", selector, e)))?;
        Ok(Self::new(selector, move |el| parsed.matches(el)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, element: &ElementRef<'_>) -> bool {
        (self.predicate)(element)
    }
}

impl fmt::Debug for ContentRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContentRule").field(&self.name).finish()
    }
}

/// Ordered content hints; the first rule with any match wins.
#[derive(Debug, Clone)]
pub struct ContentRules {
    rules: Vec<ContentRule>,
}

impl ContentRules {
    pub fn new(rules: Vec<ContentRule>) -> Self {
        Self { rules }
    }

    pub fn push(mut self, rule: ContentRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ContentRule] {
        &self.rules
    }
}

impl Default for ContentRules {
    fn default() -> Self {
        Self::new(vec![
            ContentRule::tag("article"),
            ContentRule::tag("main"),
            ContentRule::class_contains("content"),
            ContentRule::class_contains("post"),
            ContentRule::class_contains("article"),
            ContentRule::class("entry-content"),
            ContentRule::id("content"),
        ])
    }
}

/// Detaches every noise element from the tree. Returns how many were removed.
pub fn remove_noise(document: &mut Html) -> usize {
    let ids: Vec<_> = document.select(&NOISE_SELECTOR).map(|el| el.id()).collect();
    for id in &ids {
        if let Some(mut node) = document.tree.get_mut(*id) {
            node.detach();
        }
    }
    ids.len()
}

/// Picks the main content element, falling back to `<body>` and then to
/// the document root. Also returns the name of the rule that matched.
pub fn select_main_content<'a, 'r>(
    document: &'a Html,
    rules: &'r ContentRules,
) -> (ElementRef<'a>, Option<&'r str>) {
    let root = document.root_element();

    for rule in rules.rules() {
        // Walk from the root so detached noise is never visited.
        let found = root
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| rule.matches(el));
        if let Some(element) = found {
            return (element, Some(rule.name()));
        }
    }

    let fallback = root.select(&BODY_SELECTOR).next().unwrap_or(root);
    (fallback, None)
}

/// Parses markup, strips noise, picks the main content and returns its
/// normalized text.
pub fn clean_html(html: &str, rules: &ContentRules) -> String {
    let mut document = parse_html(html);
    let removed = remove_noise(&mut document);

    let (element, rule) = select_main_content(&document, rules);
    let raw: String = element.text().collect();
    debug!(removed, rule = rule.unwrap_or("<body>"), raw_chars = raw.len(), "extracted content");

    normalize_text(&raw)
}

/// Collapses every run of whitespace to a single space and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace collapse followed by the length cap.
pub fn normalize_text(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.chars().count() <= MAX_TEXT_CHARS {
        return collapsed;
    }

    let mut truncated: String = collapsed.chars().take(MAX_TEXT_CHARS).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
