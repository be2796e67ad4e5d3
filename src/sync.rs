// src/sync.rs
// Incremental Sync Controller: one run over one source. Owns crawl-mode
// selection, effective depth clamping, cutoff truncation, dedup and
// fast-exit. Per-item failures are absorbed as skip-and-continue; the run
// always returns a best-effort RunReport.

use std::collections::HashSet;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::adapter::SourceAdapter;
use crate::config::{SourceSpec, SyncBounds};
use crate::model::{CandidateItem, CrawlMode, NewItem, RunReport};
use crate::polish::PolishGate;
use crate::resolve::Resolver;
use crate::store::ItemStore;
use crate::summarize::{summarize, SummarizeOptions};

/// Hard page ceiling so a backfill can never crawl forever if a site
/// changes pagination behavior.
const BACKFILL_PAGE_SAFETY: u32 = 500;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_candidates_total", "Candidates scanned from listings.");
        describe_counter!("ingest_new_total", "Candidates surviving deduplication.");
        describe_counter!("ingest_upserted_total", "Items successfully written.");
        describe_counter!("ingest_skipped_total", "Candidates dropped at the item boundary.");
        describe_counter!("ingest_cutoff_total", "Runs that stopped at the cutoff.");
        describe_counter!("resolve_retries_total", "Transient fetch retries.");
        describe_counter!("resolve_exhausted_total", "Fetches that exhausted all retries.");
        describe_counter!("polish_calls_total", "Polish attempts admitted by the budget.");
        describe_counter!("polish_skipped_total", "Polish attempts the gate refused.");
    });
}

/// Depth actually applied to this run. `max_items == 0` means no item cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveParams {
    pub max_pages: u32,
    pub max_items: u32,
}

/// The single cron-safety policy: backfill honors the caller's depth,
/// incremental clamps it into the source's bounds so one scheduled run can
/// never re-scan full history. Zero means "no preference" on input.
pub fn effective_params(
    mode: CrawlMode,
    requested_pages: u32,
    requested_limit: u32,
    bounds: &SyncBounds,
) -> EffectiveParams {
    match mode {
        CrawlMode::Backfill => EffectiveParams {
            max_pages: if requested_pages == 0 {
                BACKFILL_PAGE_SAFETY
            } else {
                requested_pages.min(BACKFILL_PAGE_SAFETY)
            },
            max_items: requested_limit,
        },
        CrawlMode::Incremental => EffectiveParams {
            max_pages: if requested_pages == 0 {
                bounds.max_pages
            } else {
                requested_pages.min(bounds.max_pages)
            },
            max_items: if requested_limit == 0 {
                bounds.max_items
            } else {
                requested_limit.min(bounds.max_items)
            },
        },
    }
}

/// Newest→oldest by date hint, stable so hintless candidates keep their
/// relative listing order (and sort last).
fn sort_newest_first(batch: &mut [CandidateItem]) {
    batch.sort_by(|a, b| match (a.date_hint, b.date_hint) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Truncate a newest→oldest batch at the inclusive cutoff external_id.
/// Returns true when the cutoff was present.
fn truncate_at_cutoff(batch: &mut Vec<CandidateItem>, cutoff: Option<&str>) -> bool {
    let Some(cutoff) = cutoff else { return false };
    if let Some(pos) = batch.iter().position(|c| c.external_id == cutoff) {
        batch.truncate(pos + 1);
        true
    } else {
        false
    }
}

/// Run one ingest pass for one source. The returned counters are the only
/// outward contract; under normal operation this never fails past the
/// initial source bootstrap.
pub async fn ingest(
    adapter: &mut dyn SourceAdapter,
    resolver: &dyn Resolver,
    store: &dyn ItemStore,
    gate: &PolishGate,
    spec: &SourceSpec,
    limit: u32,
    max_pages: u32,
) -> anyhow::Result<RunReport> {
    ensure_metrics_described();

    let source = store
        .get_or_create_source(&spec.name, &spec.kind, &spec.base_url)
        .await?;
    let existing = store.count_items(source.id).await?;
    let mode = if existing == 0 {
        CrawlMode::Backfill
    } else {
        CrawlMode::Incremental
    };
    let eff = effective_params(mode, max_pages, limit, &spec.bounds);
    info!(
        source = %spec.name,
        %mode,
        existing,
        max_pages = eff.max_pages,
        max_items = eff.max_items,
        "starting ingest run"
    );

    let mut report = RunReport::empty(mode);
    let mut yielded_this_run: HashSet<String> = HashSet::new();
    let mut processed = 0u32;
    let cutoff = spec.cutoff_external_id.as_deref();

    'pages: for page in 1..=eff.max_pages {
        let mut batch = match adapter.next_batch(page).await {
            Ok(Some(batch)) if !batch.is_empty() => batch,
            Ok(_) => break,
            Err(e) => {
                // A listing failure ends this source's scan, not the run.
                warn!(source = %spec.name, page, error = ?e, "listing fetch failed, ending scan");
                break;
            }
        };

        // Adapter contract says no re-yields; keep a guard anyway so a
        // misbehaving adapter cannot double-process an item.
        batch.retain(|c| yielded_this_run.insert(c.external_id.clone()));

        if !adapter.ordered() {
            sort_newest_first(&mut batch);
        }
        let hit_cutoff = truncate_at_cutoff(&mut batch, cutoff);
        if hit_cutoff {
            report.stopped_at_cutoff = true;
        }
        report.seen += batch.len();

        let ids: Vec<String> = batch.iter().map(|c| c.external_id.clone()).collect();
        let known = match store.known_external_ids(source.id, &ids).await {
            Ok(known) => known,
            Err(e) => {
                warn!(source = %spec.name, page, error = ?e, "membership check failed, ending scan");
                break;
            }
        };

        let fresh: Vec<CandidateItem> = match mode {
            // Backfill ingests everything; correctness rests on the
            // writer's idempotence.
            CrawlMode::Backfill => batch,
            CrawlMode::Incremental => batch
                .into_iter()
                .filter(|c| !known.contains(&c.external_id))
                .collect(),
        };

        report.new += fresh.len();

        for candidate in &fresh {
            if eff.max_items > 0 && processed >= eff.max_items {
                debug!(source = %spec.name, processed, "item limit reached");
                break 'pages;
            }
            processed += 1;

            let record = match resolver.resolve(candidate).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(source = %spec.name, url = %candidate.external_id, error = %e, "resolution failed, skipping item");
                    report.skipped += 1;
                    continue;
                }
            };

            let opts = SummarizeOptions::default();
            let mut summary = summarize(&record.body_text, &opts);
            if summary.is_empty() {
                // Degraded fallback: lead of the body text.
                summary = record.body_text.chars().take(opts.max_chars).collect();
                summary = summary.trim().to_string();
            }
            let summary = gate
                .polish(&summary, &record.title, &record.external_id)
                .await;

            let item = NewItem {
                external_id: record.external_id.clone(),
                source_id: source.id,
                title: record.title,
                summary,
                url: record.external_id,
                jurisdiction: spec.jurisdiction.clone(),
                agency: spec.agency.clone(),
                status: spec.status.clone(),
                published_at: record.published_at,
                fetched_at: record.fetched_at,
            };
            match store.upsert_item(&item).await {
                Ok(()) => report.upserted += 1,
                Err(e) => {
                    warn!(source = %spec.name, url = %item.url, error = ?e, "upsert failed, skipping item");
                    report.skipped += 1;
                }
            }
        }

        if hit_cutoff {
            break;
        }

        // Fast-exit: the catalog is append-only at the head, so once a
        // batch overlaps already-known items every older page is known too.
        // A first batch with zero new candidates is the degenerate case.
        if mode == CrawlMode::Incremental && !known.is_empty() {
            debug!(source = %spec.name, page, "batch reached the known head, fast-exit");
            break;
        }
    }

    counter!("ingest_candidates_total").increment(report.seen as u64);
    counter!("ingest_new_total").increment(report.new as u64);
    counter!("ingest_upserted_total").increment(report.upserted as u64);
    counter!("ingest_skipped_total").increment(report.skipped as u64);
    if report.stopped_at_cutoff {
        counter!("ingest_cutoff_total").increment(1);
    }
    info!(
        source = %spec.name,
        seen = report.seen,
        new = report.new,
        upserted = report.upserted,
        skipped = report.skipped,
        stopped_at_cutoff = report.stopped_at_cutoff,
        "ingest run finished"
    );
    Ok(report)
}
