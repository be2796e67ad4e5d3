// src/resolve/mod.rs
pub mod dates;
pub mod html;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use rand::Rng;
use tracing::{debug, warn};
use url::Url;

use crate::config::HttpConfig;
use crate::error::FetchError;
use crate::extract::TextExtractor;
use crate::model::{CandidateItem, ContentRecord};
use crate::summarize::strip_markup;

/// Query parameters that never identify a document. Stripped during
/// canonicalization so different entry links converge on one external_id.
const TRACKING_PARAMS: [&str; 7] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
];

/// Content resolution seam. The HTTP implementation is the production path;
/// tests substitute fixtures.
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, candidate: &CandidateItem) -> Result<ContentRecord, FetchError>;
}

/// Fetches a candidate URL, canonicalizes it, and runs the title and
/// publication-date waterfalls. Non-HTML payloads go through the external
/// text-extraction collaborator.
pub struct HttpResolver {
    client: reqwest::Client,
    max_attempts: u32,
    backoff_base: Duration,
    extractor: Arc<dyn TextExtractor>,
}

impl HttpResolver {
    pub fn new(cfg: &HttpConfig, extractor: Arc<dyn TextExtractor>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(cfg.connect_timeout())
            .timeout(cfg.read_timeout())
            .build()?;
        Ok(Self {
            client,
            max_attempts: cfg.max_attempts.max(1),
            backoff_base: Duration::from_millis(cfg.backoff_base_ms.max(1)),
            extractor,
        })
    }

    /// GET with bounded retry: exponential backoff plus jitter for transient
    /// failures, immediate return for permanent ones.
    async fn fetch_with_retry(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    FetchError::from_status(url, status)
                }
                Err(e) => FetchError::from_reqwest(url, &e),
            };

            if !err.is_transient() {
                return Err(err);
            }
            if attempt >= self.max_attempts {
                counter!("resolve_exhausted_total").increment(1);
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt,
                });
            }

            let backoff = self.backoff_base * 2u32.saturating_pow(attempt - 1);
            let jitter_ms = rand::rng().random_range(0..=self.backoff_base.as_millis() as u64);
            let delay = backoff + Duration::from_millis(jitter_ms);
            debug!(url, attempt, ?delay, error = %err, "transient fetch failure, retrying");
            counter!("resolve_retries_total").increment(1);
            tokio::time::sleep(delay).await;
        }
    }
}

/// Canonical form of a final (post-redirect) URL: no fragment, no tracking
/// parameters.
pub fn canonicalize(final_url: &Url) -> String {
    let mut out = final_url.clone();
    out.set_fragment(None);
    let kept: Vec<(String, String)> = out
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        out.set_query(None);
    } else {
        // Serialize through the url crate so reserved characters inside
        // values stay percent-encoded.
        out.query_pairs_mut().clear().extend_pairs(&kept);
    }
    out.to_string()
}

fn parse_last_modified(resp: &reqwest::Response) -> Option<DateTime<Utc>> {
    resp.headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait::async_trait]
impl Resolver for HttpResolver {
    async fn resolve(&self, candidate: &CandidateItem) -> Result<ContentRecord, FetchError> {
        let resp = self.fetch_with_retry(&candidate.external_id).await?;

        let http_status = resp.status().as_u16();
        let external_id = canonicalize(resp.url());
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let http_last_modified = parse_last_modified(&resp);
        let fetched_at = Utc::now();
        let now = fetched_at;

        let hint = candidate.title_hint.as_deref();

        let (title, body_text, published_at) = if html::is_html_content_type(&content_type) {
            let raw = resp.text().await.map_err(|e| FetchError::Permanent {
                url: external_id.clone(),
                reason: format!("reading body: {e}"),
            })?;
            let body_text = strip_markup(&raw);
            let (title, miss) = html::title_waterfall(&raw, hint, &external_id);
            if let Some(miss) = miss {
                debug!(url = %external_id, %miss, "title waterfall exhausted");
            }
            let published_at = dates::published_at(
                &dates::DateSignals {
                    hint: candidate.date_hint,
                    html: Some(&raw),
                    url: &external_id,
                    body_text: &body_text,
                    doc_modified: None,
                    http_last_modified,
                },
                now,
            )
            .map_err(|miss| debug!(url = %external_id, %miss, "date waterfall exhausted"))
            .ok();
            (title, body_text, published_at)
        } else {
            let bytes = resp.bytes().await.map_err(|e| FetchError::Permanent {
                url: external_id.clone(),
                reason: format!("reading body: {e}"),
            })?;
            let extracted = self.extractor.extract(&bytes, &content_type).await;
            if extracted.text.is_empty() {
                warn!(url = %external_id, content_type, "text extraction returned nothing");
            }
            let (title, _) = html::title_waterfall("", hint, &external_id);
            let published_at = dates::published_at(
                &dates::DateSignals {
                    hint: candidate.date_hint,
                    html: None,
                    url: &external_id,
                    body_text: &extracted.text,
                    doc_modified: extracted.modified_at,
                    http_last_modified,
                },
                now,
            )
            .map_err(|miss| debug!(url = %external_id, %miss, "date waterfall exhausted"))
            .ok();
            (title, extracted.text, published_at)
        };

        Ok(ContentRecord {
            external_id,
            title,
            body_text,
            content_type,
            http_status,
            published_at,
            fetched_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_strips_tracking_and_fragment() {
        let u = Url::parse(
            "https://x.gov/2025/01/post/?utm_source=mail&utm_campaign=c&page=2#section-3",
        )
        .unwrap();
        assert_eq!(canonicalize(&u), "https://x.gov/2025/01/post/?page=2");
    }

    #[test]
    fn canonicalize_drops_empty_query() {
        let u = Url::parse("https://x.gov/post/?fbclid=abc123").unwrap();
        assert_eq!(canonicalize(&u), "https://x.gov/post/");
    }

    #[test]
    fn canonicalize_keeps_identifying_params() {
        let u = Url::parse("https://x.gov/doc?id=42&gclid=zzz").unwrap();
        assert_eq!(canonicalize(&u), "https://x.gov/doc?id=42");
    }

    #[test]
    fn canonicalize_preserves_encoded_values() {
        // An encoded value must not collapse into a different document's
        // query string.
        let a = Url::parse("https://x.gov/doc?id=a%26b%3Dc").unwrap();
        let b = Url::parse("https://x.gov/doc?id=a&b=c").unwrap();
        assert_eq!(canonicalize(&a), "https://x.gov/doc?id=a%26b%3Dc");
        assert_ne!(canonicalize(&a), canonicalize(&b));
    }
}
