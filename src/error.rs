// src/error.rs
use std::time::Duration;

/// Fetch failures, split by whether a bounded retry makes sense.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Timeouts, connection resets, 5xx, 429. Retried in place with backoff.
    #[error("transient fetch failure for {url}: {reason}")]
    Transient { url: String, reason: String },

    /// 4xx other than 429, malformed responses. Never retried.
    #[error("permanent fetch failure for {url}: {reason}")]
    Permanent { url: String, reason: String },

    /// All retry attempts exhausted.
    #[error("retries exhausted for {url} after {attempts} attempts")]
    Exhausted { url: String, attempts: u32 },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    pub(crate) fn from_reqwest(url: &str, e: &reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            FetchError::Transient {
                url: url.to_string(),
                reason: e.to_string(),
            }
        } else {
            FetchError::Permanent {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }

    pub(crate) fn from_status(url: &str, status: reqwest::StatusCode) -> Self {
        if status.is_server_error() || status.as_u16() == 429 {
            FetchError::Transient {
                url: url.to_string(),
                reason: format!("http status {status}"),
            }
        } else {
            FetchError::Permanent {
                url: url.to_string(),
                reason: format!("http status {status}"),
            }
        }
    }
}

/// Why a waterfall (title or date) came up empty. Informational only: an
/// extraction miss never fails an item, callers proceed with the best
/// available value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionMiss {
    #[error("no usable title found")]
    Title,
    #[error("no usable publication date found")]
    Date,
    #[error("date candidate rejected as too far in the future")]
    FutureDate,
}

/// Persistence failures abort a single item write; the run continues.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store invariant violated: {0}")]
    Invariant(String),
}

/// Everything the polish gate can silently absorb. Only surfaced in logs.
#[derive(Debug, thiserror::Error)]
pub enum PolishSkip {
    #[error("daily polish budget exhausted")]
    BudgetExhausted,
    #[error("no polish provider configured")]
    NoProvider,
    #[error("polish call timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider returned an unusable reply: {0}")]
    BadReply(String),
    #[error("provider call failed: {0}")]
    Call(String),
}
