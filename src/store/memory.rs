// src/store/memory.rs
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::StoreError;
use crate::model::{NewItem, Source};

use super::ItemStore;

/// In-memory store with the same merge semantics as the Postgres writer.
/// Used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    sources: Vec<Source>,
    items: HashMap<(i64, String), NewItem>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items_for(&self, source_id: i64) -> Vec<NewItem> {
        let g = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let mut out: Vec<NewItem> = g
            .items
            .values()
            .filter(|i| i.source_id == source_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        out
    }

    pub fn item(&self, source_id: i64, external_id: &str) -> Option<NewItem> {
        let g = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        g.items.get(&(source_id, external_id.to_string())).cloned()
    }

    pub fn total_items(&self) -> usize {
        let g = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        g.items.len()
    }
}

#[async_trait::async_trait]
impl ItemStore for MemoryStore {
    async fn get_or_create_source(
        &self,
        name: &str,
        kind: &str,
        base_url: &str,
    ) -> Result<Source, StoreError> {
        let mut g = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(existing) = g.sources.iter_mut().find(|s| s.name == name) {
            existing.kind = kind.to_string();
            existing.base_url = base_url.to_string();
            return Ok(existing.clone());
        }
        let source = Source {
            id: g.sources.len() as i64 + 1,
            name: name.to_string(),
            kind: kind.to_string(),
            base_url: base_url.to_string(),
        };
        g.sources.push(source.clone());
        Ok(source)
    }

    async fn count_items(&self, source_id: i64) -> Result<i64, StoreError> {
        let g = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        Ok(g.items.values().filter(|i| i.source_id == source_id).count() as i64)
    }

    async fn known_external_ids(
        &self,
        source_id: i64,
        external_ids: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        let g = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        Ok(external_ids
            .iter()
            .filter(|id| g.items.contains_key(&(source_id, (*id).clone())))
            .cloned()
            .collect())
    }

    async fn upsert_item(&self, item: &NewItem) -> Result<(), StoreError> {
        let mut g = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let key = (item.source_id, item.external_id.clone());
        match g.items.get_mut(&key) {
            Some(existing) => {
                existing.title = item.title.clone();
                existing.summary = item.summary.clone();
                existing.url = item.url.clone();
                existing.jurisdiction = item.jurisdiction.clone();
                existing.agency = item.agency.clone();
                existing.status = item.status.clone();
                // Keep the existing non-null published_at.
                if existing.published_at.is_none() {
                    existing.published_at = item.published_at;
                }
                existing.fetched_at = item.fetched_at;
            }
            None => {
                g.items.insert(key, item.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(external_id: &str, published: Option<(i32, u32, u32)>) -> NewItem {
        NewItem {
            external_id: external_id.to_string(),
            source_id: 1,
            title: "t".into(),
            summary: "s".into(),
            url: external_id.to_string(),
            jurisdiction: "federal".into(),
            agency: "White House".into(),
            status: "executive_order".into(),
            published_at: published
                .map(|(y, m, d)| Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()),
            fetched_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn get_or_create_is_stable() {
        let store = MemoryStore::new();
        let a = store
            .get_or_create_source("WH", "wh", "https://wh.gov/")
            .await
            .unwrap();
        let b = store
            .get_or_create_source("WH", "wh2", "https://wh.gov/v2/")
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.kind, "wh2");
    }

    #[tokio::test]
    async fn published_at_is_monotonic() {
        let store = MemoryStore::new();
        store.upsert_item(&item("u1", None)).await.unwrap();
        store.upsert_item(&item("u1", Some((2024, 1, 5)))).await.unwrap();
        store.upsert_item(&item("u1", None)).await.unwrap();
        let stored = store.item(1, "u1").unwrap();
        assert_eq!(
            stored.published_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn membership_check_finds_known_ids() {
        let store = MemoryStore::new();
        store.upsert_item(&item("a", None)).await.unwrap();
        let known = store
            .known_external_ids(1, &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert!(known.contains("a"));
        assert!(!known.contains("b"));
    }
}
