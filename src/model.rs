// src/model.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog source (one listing per government site section). Created once,
/// idempotent get-or-create by unique name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub base_url: String,
}

/// One candidate discovered on a listing page. Ephemeral: lives only for
/// the duration of a single run. Adapters yield these newest→oldest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Canonical URL; the per-source idempotency key.
    pub external_id: String,
    /// Anchor text from the originating listing, if any.
    pub title_hint: Option<String>,
    /// Date printed on the listing, if any.
    pub date_hint: Option<DateTime<Utc>>,
}

impl CandidateItem {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title_hint: None,
            date_hint: None,
        }
    }
}

/// Resolver output for one candidate. Ephemeral working object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    /// Canonical URL after redirects + tracking-param stripping.
    pub external_id: String,
    pub title: String,
    pub body_text: String,
    pub content_type: String,
    pub http_status: u16,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

/// Payload for one persisted item. Identity is (source_id, external_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub external_id: String,
    pub source_id: i64,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub jurisdiction: String,
    pub agency: String,
    pub status: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

/// Crawl mode, recomputed at the start of every run from the current
/// persisted item count. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlMode {
    /// Full historical crawl; active only while the source owns zero items.
    Backfill,
    /// Bounded, cron-safe crawl of not-yet-persisted candidates.
    Incremental,
}

impl CrawlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlMode::Backfill => "backfill",
            CrawlMode::Incremental => "incremental",
        }
    }
}

impl std::fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run counters for one source. The only outward contract of `ingest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Candidates scanned from listing batches (after cutoff truncation).
    pub seen: usize,
    /// Candidates that survived deduplication.
    pub new: usize,
    /// Items successfully written.
    pub upserted: usize,
    /// Candidates dropped at the item boundary (fetch/persist failures).
    pub skipped: usize,
    pub stopped_at_cutoff: bool,
    pub mode: CrawlMode,
}

impl RunReport {
    pub fn empty(mode: CrawlMode) -> Self {
        Self {
            seen: 0,
            new: 0,
            upserted: 0,
            skipped: 0,
            stopped_at_cutoff: false,
            mode,
        }
    }
}
