// src/ingest/providers/primezone.rs
use async_trait::async_trait;
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;

use crate::error::FetchError;
use crate::ingest::normalize_text;
use crate::ingest::types::{Candidate, CandidateSource};

// `.coupon-thumb` anchors carry the deal link; everything else lives inside them.
const THUMB_CLASS: &str = "coupon-thumb";

static RE_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<a\b([^>]*)>(.*?)</a\s*>"#).expect("anchor regex"));
static RE_OPEN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<([a-z][a-z0-9]*)\b([^>]*)>"#).expect("open tag regex"));
static RE_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)(?:^|\s)class\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("class regex")
});
static RE_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)(?:^|\s)href\s*=\s*["']([^"']*)["']"#).expect("href regex"));
static RE_IMG_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<img\b[^>]*\bsrc\s*=\s*["']([^"']*)["']"#).expect("img regex"));

/// Deals listing scraped page by page, newest first (`sort=new`).
pub struct PrimezoneSource {
    site_url: String,
    auth_token: Option<String>,
    pages: u32,
    client: reqwest::Client,
}

impl PrimezoneSource {
    pub fn new(site_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            site_url: site_url.into(),
            auth_token: None,
            pages: 1,
            client,
        })
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn with_pages(mut self, pages: u32) -> Self {
        self.pages = pages.max(1);
        self
    }

    /// Session cookies from the handshake stay in the client's cookie store.
    async fn authenticate(&self, token: &str) -> Result<(), FetchError> {
        let url = join_url(&self.site_url, "auth");
        let resp = self
            .client
            .get(&url)
            .query(&[("token", token)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FetchError::Auth {
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn fetch_page(&self, page: u32) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(&self.site_url)
            .query(&[("page", page.to_string().as_str()), ("sort", "new")])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl CandidateSource for PrimezoneSource {
    async fn fetch(&self) -> Result<Vec<Candidate>, FetchError> {
        let t0 = std::time::Instant::now();
        if let Some(token) = self.auth_token.as_deref() {
            self.authenticate(token).await?;
        }

        let mut out = Vec::new();
        for page in 1..=self.pages {
            let html = self.fetch_page(page).await?;
            let mut items = parse_listing(&html, &self.site_url)?;
            tracing::debug!(target: "ingest", page, items = items.len(), "listing page parsed");
            out.append(&mut items);
        }
        let out = dedup_preserving_order(out);

        histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("pipeline_items_fetched_total").increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "primezone"
    }
}

/// Parse one listing page. Missing `href` or image `src` fails the whole page.
pub fn parse_listing(html: &str, site_url: &str) -> Result<Vec<Candidate>, FetchError> {
    let mut out = Vec::new();
    let thumbs = RE_ANCHOR
        .captures_iter(html)
        .filter(|cap| has_class(cap.get(1).map_or("", |m| m.as_str()), THUMB_CLASS));
    for (idx, cap) in thumbs.enumerate() {
        let attrs = cap.get(1).map_or("", |m| m.as_str());
        let body = cap.get(2).map_or("", |m| m.as_str());

        let href = RE_HREF
            .captures(attrs)
            .and_then(|c| c.get(1))
            .map(|m| html_escape::decode_html_entities(m.as_str().trim()).to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FetchError::Markup(format!("item #{idx}: href not present")))?;
        let src = RE_IMG_SRC
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| html_escape::decode_html_entities(m.as_str().trim()).to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FetchError::Markup(format!("item #{idx}: img src not present")))?;

        let title = inner_text_by_class(body, "coupon-title").unwrap_or_default();
        let description = inner_text_by_class(body, "coupon-desciption")
            .or_else(|| inner_text_by_class(body, "coupon-description"))
            .filter(|d| !d.is_empty());

        out.push(Candidate {
            id: join_url(site_url, &href),
            title,
            media_ref: join_url(site_url, &src),
            description,
        });
    }
    Ok(out)
}

/// Whether the tag attributes list `class` as one of their class tokens.
fn has_class(attrs: &str, class: &str) -> bool {
    RE_CLASS
        .captures(attrs)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .is_some_and(|m| m.as_str().split_whitespace().any(|t| t == class))
}

/// Text content of the first element carrying `class`. Assumes the element
/// does not nest another element with the same tag name.
fn inner_text_by_class(block: &str, class: &str) -> Option<String> {
    let cap = RE_OPEN_TAG
        .captures_iter(block)
        .find(|c| has_class(c.get(2).map_or("", |m| m.as_str()), class))?;
    let tag = cap.get(1)?.as_str().to_ascii_lowercase();
    let start = cap.get(0)?.end();
    let rest = &block[start..];
    let end = rest
        .to_ascii_lowercase()
        .find(&format!("</{tag}"))
        .unwrap_or(rest.len());
    Some(normalize_text(&rest[..end]))
}

/// Resolve `href` against the site root. Absolute URLs pass through.
pub fn join_url(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Some(rest) = href.strip_prefix("//") {
        let scheme = base.split("://").next().unwrap_or("https");
        return format!("{scheme}://{rest}");
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        href.trim_start_matches('/')
    )
}

// Listing can shift between page requests; the first (newest) sighting wins.
fn dedup_preserving_order(items: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}
