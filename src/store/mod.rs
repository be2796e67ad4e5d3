// src/store/mod.rs
pub mod memory;
pub mod postgres;

use std::collections::HashSet;

use crate::error::StoreError;
use crate::model::{NewItem, Source};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence seam for the catalog. Writes are idempotent: the upsert is
/// keyed by (source_id, external_id) and safe to replay indefinitely.
#[async_trait::async_trait]
pub trait ItemStore: Send + Sync {
    /// Idempotent get-or-create by unique name; a conflict refreshes
    /// kind/base_url but the id is stable for the life of the catalog.
    async fn get_or_create_source(
        &self,
        name: &str,
        kind: &str,
        base_url: &str,
    ) -> Result<Source, StoreError>;

    async fn count_items(&self, source_id: i64) -> Result<i64, StoreError>;

    /// One batch membership check: which of these external_ids are already
    /// persisted for this source.
    async fn known_external_ids(
        &self,
        source_id: i64,
        external_ids: &[String],
    ) -> Result<HashSet<String>, StoreError>;

    /// Upsert one item in its own transaction. On conflict: mutable
    /// descriptive fields are overwritten, `published_at` keeps the existing
    /// non-null value, `fetched_at` always advances.
    async fn upsert_item(&self, item: &NewItem) -> Result<(), StoreError>;
}
