// tests/budget_gate.rs
// Daily-budget behavior of the polish gate across sequential calls.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use policywatch_ingest::{PolishGate, PolishProvider};

struct CountingProvider {
    calls: Arc<AtomicU32>,
    reply: String,
}

#[async_trait::async_trait]
impl PolishProvider for CountingProvider {
    async fn rewrite(&self, _draft: &str, _title: &str, _url: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
    fn name(&self) -> &'static str {
        "counting"
    }
}

struct FailingProvider;

#[async_trait::async_trait]
impl PolishProvider for FailingProvider {
    async fn rewrite(&self, _draft: &str, _title: &str, _url: &str) -> anyhow::Result<String> {
        anyhow::bail!("provider exploded")
    }
    fn name(&self) -> &'static str {
        "failing"
    }
}

struct SlowProvider;

#[async_trait::async_trait]
impl PolishProvider for SlowProvider {
    async fn rewrite(&self, draft: &str, _title: &str, _url: &str) -> anyhow::Result<String> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(draft.to_string())
    }
    fn name(&self) -> &'static str {
        "slow"
    }
}

fn counting_gate(calls: Arc<AtomicU32>, budget: i64) -> PolishGate {
    PolishGate::new(
        Some(Box::new(CountingProvider {
            calls,
            reply: "a neutral rewrite long enough to be usable".to_string(),
        })),
        budget,
        Duration::from_secs(5),
    )
}

const DRAFT: &str = "The order directs agencies to publish compliance plans within 90 days.";

#[tokio::test]
async fn budget_admits_exactly_its_count_then_passes_drafts_through() {
    let calls = Arc::new(AtomicU32::new(0));
    let gate = counting_gate(calls.clone(), 2);

    let first = gate.polish(DRAFT, "t", "u1").await;
    let second = gate.polish(DRAFT, "t", "u2").await;
    let third = gate.polish(DRAFT, "t", "u3").await;

    assert_eq!(first, "a neutral rewrite long enough to be usable");
    assert_eq!(second, "a neutral rewrite long enough to be usable");
    // Third attempt is refused before the provider is reached.
    assert_eq!(third, DRAFT);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(gate.calls_used_today(), 2);
}

#[tokio::test]
async fn refused_attempts_do_not_consume_budget() {
    let calls = Arc::new(AtomicU32::new(0));
    let gate = counting_gate(calls.clone(), 1);

    gate.polish(DRAFT, "t", "u1").await;
    for _ in 0..10 {
        gate.polish(DRAFT, "t", "u").await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(gate.calls_used_today(), 1);
}

#[tokio::test]
async fn day_rollover_resets_the_counter() {
    let calls = Arc::new(AtomicU32::new(0));
    let gate = counting_gate(calls.clone(), 1);

    gate.polish(DRAFT, "t", "u1").await;
    assert_eq!(gate.polish(DRAFT, "t", "u2").await, DRAFT);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Simulate the UTC day ticking over.
    gate.set_day_key("2000-01-01");
    assert_eq!(gate.calls_used_today(), 0);
    let out = gate.polish(DRAFT, "t", "u3").await;
    assert_eq!(out, "a neutral rewrite long enough to be usable");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(gate.calls_used_today(), 1);
}

#[tokio::test]
async fn provider_failure_keeps_draft_but_still_counts() {
    let gate = PolishGate::new(Some(Box::new(FailingProvider)), 5, Duration::from_secs(5));
    let out = gate.polish(DRAFT, "t", "u").await;
    assert_eq!(out, DRAFT);
    // The admitted attempt was spent even though the call failed.
    assert_eq!(gate.calls_used_today(), 1);
}

#[tokio::test]
async fn timeout_keeps_draft_and_counts_the_attempt() {
    let gate = PolishGate::new(Some(Box::new(SlowProvider)), 5, Duration::from_millis(50));
    let out = gate.polish(DRAFT, "t", "u").await;
    assert_eq!(out, DRAFT);
    assert_eq!(gate.calls_used_today(), 1);
}
