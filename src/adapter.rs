// src/adapter.rs
use anyhow::Result;

use crate::model::CandidateItem;

/// Per-site candidate discovery. Each of the concrete listing scrapers
/// (markup-specific extraction rules) lives outside this crate and plugs in
/// here. One adapter instance serves exactly one run.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch one listing page. Pages are 1-based; batch N+1 holds strictly
    /// older candidates than batch N. `Ok(None)` means no further pages.
    ///
    /// Adapters must not re-yield a candidate already produced earlier in
    /// the same run.
    async fn next_batch(&mut self, page: u32) -> Result<Option<Vec<CandidateItem>>>;

    /// Whether batches are guaranteed newest→oldest. Adapters that cannot
    /// promise this return false and the controller re-sorts each batch by
    /// date hint before applying cutoff and fast-exit logic.
    fn ordered(&self) -> bool {
        true
    }

    fn name(&self) -> &str;
}
