// src/store/postgres.rs
use std::collections::HashSet;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use crate::error::StoreError;
use crate::model::{NewItem, Source};

use super::ItemStore;

/// Postgres-backed catalog store. The pool is shared across concurrent
/// source runs; each item write is one independent statement, so one item's
/// failure never blocks siblings.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the crate's own tables. Idempotent.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id        BIGSERIAL PRIMARY KEY,
                name      TEXT NOT NULL UNIQUE,
                kind      TEXT NOT NULL,
                base_url  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id           BIGSERIAL PRIMARY KEY,
                external_id  TEXT NOT NULL,
                source_id    BIGINT NOT NULL REFERENCES sources(id),
                title        TEXT NOT NULL,
                summary      TEXT NOT NULL,
                url          TEXT NOT NULL,
                jurisdiction TEXT NOT NULL,
                agency       TEXT NOT NULL,
                status       TEXT NOT NULL,
                published_at TIMESTAMPTZ NULL,
                fetched_at   TIMESTAMPTZ NOT NULL,
                UNIQUE (source_id, external_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS items_source_published_idx
              ON items (source_id, published_at DESC NULLS LAST)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl ItemStore for PgStore {
    async fn get_or_create_source(
        &self,
        name: &str,
        kind: &str,
        base_url: &str,
    ) -> Result<Source, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO sources (name, kind, base_url)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE
              SET kind = EXCLUDED.kind, base_url = EXCLUDED.base_url
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(kind)
        .bind(base_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(Source {
            id: row.try_get("id")?,
            name: name.to_string(),
            kind: kind.to_string(),
            base_url: base_url.to_string(),
        })
    }

    async fn count_items(&self, source_id: i64) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS c FROM items WHERE source_id = $1")
            .bind(source_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("c")?)
    }

    async fn known_external_ids(
        &self,
        source_id: i64,
        external_ids: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        if external_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT external_id FROM items
            WHERE source_id = $1 AND external_id = ANY($2)
            "#,
        )
        .bind(source_id)
        .bind(external_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| r.try_get::<String, _>("external_id").map_err(Into::into))
            .collect()
    }

    async fn upsert_item(&self, item: &NewItem) -> Result<(), StoreError> {
        // published_at merge keeps a non-null value forever; fetched_at
        // advances on every write even when nothing else changed.
        sqlx::query(
            r#"
            INSERT INTO items (
                external_id, source_id, title, summary, url,
                jurisdiction, agency, status, published_at, fetched_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (source_id, external_id) DO UPDATE SET
                title        = EXCLUDED.title,
                summary      = EXCLUDED.summary,
                url          = EXCLUDED.url,
                jurisdiction = EXCLUDED.jurisdiction,
                agency       = EXCLUDED.agency,
                status       = EXCLUDED.status,
                published_at = COALESCE(items.published_at, EXCLUDED.published_at),
                fetched_at   = EXCLUDED.fetched_at
            "#,
        )
        .bind(&item.external_id)
        .bind(item.source_id)
        .bind(&item.title)
        .bind(&item.summary)
        .bind(&item.url)
        .bind(&item.jurisdiction)
        .bind(&item.agency)
        .bind(&item.status)
        .bind(item.published_at)
        .bind(item.fetched_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
