// src/polish.rs
// Budget-gated prose rewrite of the extractive draft. The gate never fails
// the pipeline: any trouble returns the draft unchanged.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PolishConfig;
use crate::error::PolishSkip;

/// Replies shorter than this are treated as unusable and the draft kept.
const MIN_POLISHED_CHARS: usize = 20;

/// One provider does one remote rewrite. Chosen once per process lifetime.
#[async_trait::async_trait]
pub trait PolishProvider: Send + Sync {
    async fn rewrite(&self, draft: &str, title: &str, url: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}

// ------------------------------------------------------------
// Daily budget
// ------------------------------------------------------------

/// Day-keyed call counter. Process-wide state, mutated only under the gate's
/// mutex; resets when the UTC day changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BudgetState {
    pub day_key: String,
    pub count: u32,
}

fn today_key() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

impl Default for BudgetState {
    fn default() -> Self {
        Self {
            day_key: today_key(),
            count: 0,
        }
    }
}

// ------------------------------------------------------------
// Gate
// ------------------------------------------------------------

pub struct PolishGate {
    provider: Option<Box<dyn PolishProvider>>,
    /// Calls per UTC day. <= 0 means unlimited.
    daily_budget: i64,
    call_timeout: Duration,
    state: Mutex<BudgetState>,
}

impl PolishGate {
    pub fn new(
        provider: Option<Box<dyn PolishProvider>>,
        daily_budget: i64,
        call_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            daily_budget,
            call_timeout,
            state: Mutex::new(BudgetState::default()),
        }
    }

    /// Build from static configuration. Missing credentials degrade silently
    /// to a no-provider gate that passes drafts through.
    pub fn from_config(cfg: &PolishConfig) -> Self {
        let provider: Option<Box<dyn PolishProvider>> = match cfg.provider.as_str() {
            "openai" => match std::env::var("OPENAI_API_KEY") {
                Ok(key) if !key.is_empty() => Some(Box::new(OpenAiPolish::new(
                    key,
                    cfg.model.clone(),
                    cfg.timeout(),
                ))),
                _ => {
                    warn!("polish provider 'openai' configured but OPENAI_API_KEY is unset, skipping");
                    None
                }
            },
            "huggingface" => match std::env::var("HF_TOKEN") {
                Ok(token) if !token.is_empty() => Some(Box::new(HuggingFacePolish::new(
                    token,
                    cfg.model.clone(),
                    cfg.timeout(),
                ))),
                _ => {
                    warn!("polish provider 'huggingface' configured but HF_TOKEN is unset, skipping");
                    None
                }
            },
            _ => None,
        };
        Self::new(provider, cfg.daily_budget, cfg.timeout())
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.as_ref().map(|p| p.name()).unwrap_or("none")
    }

    pub fn calls_used_today(&self) -> u32 {
        let mut g = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let today = today_key();
        if g.day_key != today {
            g.day_key = today;
            g.count = 0;
        }
        g.count
    }

    /// Pretend the budget state was last touched on `day_key`; the next
    /// admission check sees a day change and resets the counter. Exists for
    /// rollover tests.
    pub fn set_day_key(&self, day_key: &str) {
        let mut g = self.state.lock().unwrap_or_else(|p| p.into_inner());
        g.day_key = day_key.to_string();
    }

    /// Check-and-increment under one lock. An admitted attempt counts
    /// exactly once, before the call and independent of its outcome;
    /// exhaustion does not count.
    fn admit(&self) -> std::result::Result<(), PolishSkip> {
        let mut g = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let today = today_key();
        if g.day_key != today {
            g.day_key = today;
            g.count = 0;
        }
        if self.daily_budget > 0 && i64::from(g.count) >= self.daily_budget {
            return Err(PolishSkip::BudgetExhausted);
        }
        g.count = g.count.saturating_add(1);
        Ok(())
    }

    /// Rewrite `draft` via the configured provider. On any skip condition
    /// (no provider, exhausted budget, timeout, error, unusable reply) the
    /// original draft comes back unchanged.
    pub async fn polish(&self, draft: &str, title: &str, url: &str) -> String {
        if draft.trim().is_empty() {
            return draft.to_string();
        }
        let Some(provider) = self.provider.as_ref() else {
            debug!(url, skip = %PolishSkip::NoProvider, "polish skipped");
            return draft.to_string();
        };
        if let Err(skip) = self.admit() {
            debug!(url, %skip, "polish skipped");
            counter!("polish_skipped_total").increment(1);
            return draft.to_string();
        }

        counter!("polish_calls_total").increment(1);
        let outcome = tokio::time::timeout(self.call_timeout, provider.rewrite(draft, title, url))
            .await
            .map_err(|_| PolishSkip::Timeout(self.call_timeout))
            .and_then(|r| r.map_err(|e| PolishSkip::Call(e.to_string())))
            .and_then(|text| {
                let cleaned = text.trim().to_string();
                if cleaned.chars().count() < MIN_POLISHED_CHARS {
                    Err(PolishSkip::BadReply(format!(
                        "reply of {} chars is too short",
                        cleaned.chars().count()
                    )))
                } else {
                    Ok(cleaned)
                }
            });

        match outcome {
            Ok(text) => text,
            Err(skip) => {
                warn!(url, provider = provider.name(), %skip, "polish call failed, keeping draft");
                draft.to_string()
            }
        }
    }
}

// ------------------------------------------------------------
// Providers
// ------------------------------------------------------------

/// OpenAI chat-completions rewrite (primary provider).
pub struct OpenAiPolish {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiPolish {
    pub fn new(api_key: String, model: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
        }
    }
}

#[async_trait::async_trait]
impl PolishProvider for OpenAiPolish {
    async fn rewrite(&self, draft: &str, title: &str, url: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let sys = "Rewrite the draft into a clear, neutral summary for policy analysts. \
            Preserve facts. Use 2-4 sentences. No bullets. No opinions.";
        let bounded: String = draft.chars().take(2_000).collect();
        let user = format!("TITLE: {title}\nURL: {url}\n\nDRAFT SUMMARY:\n{bounded}");
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: sys,
                },
                Msg {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: 0.2,
            max_tokens: 160,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(anyhow!("openai status {}", resp.status()));
        }
        let body: Resp = resp.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("openai reply had no choices"))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Hugging Face inference rewrite (fallback provider). Seq2seq summarizers
/// expect raw text, not instructions.
pub struct HuggingFacePolish {
    http: reqwest::Client,
    token: String,
    model: String,
}

impl HuggingFacePolish {
    pub fn new(token: String, model: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            token,
            model: model.unwrap_or_else(|| "sshleifer/distilbart-cnn-12-6".to_string()),
        }
    }
}

#[async_trait::async_trait]
impl PolishProvider for HuggingFacePolish {
    async fn rewrite(&self, draft: &str, title: &str, _url: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Reply {
            #[serde(default)]
            summary_text: Option<String>,
            #[serde(default)]
            generated_text: Option<String>,
        }

        let input = if title.is_empty() {
            draft.to_string()
        } else {
            format!("{title}. {draft}")
        };
        let payload = serde_json::json!({
            "inputs": input,
            "parameters": { "min_length": 40, "max_length": 120, "do_sample": false },
            "options": { "wait_for_model": true, "use_cache": true },
        });

        let api = format!(
            "https://router.huggingface.co/hf-inference/models/{}",
            self.model
        );
        let resp = self
            .http
            .post(&api)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(anyhow!("huggingface status {}", resp.status()));
        }
        let replies: Vec<Reply> = resp.json().await?;
        replies
            .into_iter()
            .next()
            .and_then(|r| r.summary_text.or(r.generated_text))
            .ok_or_else(|| anyhow!("huggingface reply had no text"))
    }

    fn name(&self) -> &'static str {
        "huggingface"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingProvider {
        calls: Arc<AtomicU32>,
        reply: String,
    }

    #[async_trait::async_trait]
    impl PolishProvider for CountingProvider {
        async fn rewrite(&self, _draft: &str, _title: &str, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn gate_with(calls: Arc<AtomicU32>, reply: &str, budget: i64) -> PolishGate {
        PolishGate::new(
            Some(Box::new(CountingProvider {
                calls,
                reply: reply.to_string(),
            })),
            budget,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn empty_draft_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));
        let gate = gate_with(calls.clone(), "a polished rewrite of the draft", 10);
        assert_eq!(gate.polish("", "t", "u").await, "");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(gate.calls_used_today(), 0);
    }

    #[tokio::test]
    async fn too_short_reply_keeps_draft_but_counts() {
        let calls = Arc::new(AtomicU32::new(0));
        let gate = gate_with(calls.clone(), "short", 10);
        let out = gate.polish("the extractive draft text", "t", "u").await;
        assert_eq!(out, "the extractive draft text");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(gate.calls_used_today(), 1);
    }

    #[tokio::test]
    async fn no_provider_passes_draft_through() {
        let gate = PolishGate::new(None, 10, Duration::from_secs(5));
        let out = gate.polish("draft stays as-is", "t", "u").await;
        assert_eq!(out, "draft stays as-is");
        assert_eq!(gate.provider_name(), "none");
    }

    #[tokio::test]
    async fn zero_budget_means_unlimited() {
        let calls = Arc::new(AtomicU32::new(0));
        let gate = gate_with(calls.clone(), "a sufficiently long polished rewrite", 0);
        for _ in 0..5 {
            gate.polish("some draft text here", "t", "u").await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
