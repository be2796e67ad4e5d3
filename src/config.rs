// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PATH: &str = "POLICYWATCH_CONFIG_PATH";

/// Safety bounds applied to a scheduled (incremental) run so a cron tick can
/// never re-scan full history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SyncBounds {
    pub max_pages: u32,
    pub max_items: u32,
}

impl Default for SyncBounds {
    fn default() -> Self {
        Self {
            max_pages: 5,
            max_items: 60,
        }
    }
}

/// Static description of one source instance. The markup-specific scraping
/// lives in the adapter; everything here is catalog metadata plus the
/// cutoff and safety bounds the controller needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub kind: String,
    pub base_url: String,
    pub jurisdiction: String,
    pub agency: String,
    /// Catalog status label for items from this source
    /// (e.g. "executive_order", "proclamation", "press_release").
    pub status: String,
    /// Oldest external_id this source should ever ingest. Inclusive.
    pub cutoff_external_id: Option<String>,
    #[serde(default)]
    pub bounds: SyncBounds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_read_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    4
}
fn default_backoff_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    "policywatch-ingest/0.1 (catalog crawler)".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolishConfig {
    /// "openai" | "huggingface" | "none". Missing credentials degrade to none.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Calls per UTC day across the whole process. <= 0 means unlimited.
    #[serde(default = "default_daily_budget")]
    pub daily_budget: i64,
    #[serde(default = "default_polish_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub model: Option<String>,
}

fn default_provider() -> String {
    "none".to_string()
}
fn default_daily_budget() -> i64 {
    200
}
fn default_polish_timeout_secs() -> u64 {
    12
}

impl Default for PolishConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            daily_budget: default_daily_budget(),
            timeout_secs: default_polish_timeout_secs(),
            model: None,
        }
    }
}

impl PolishConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level ingest configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub polish: PolishConfig,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

impl IngestConfig {
    pub fn source(&self, name: &str) -> Option<&SourceSpec> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// Load configuration from an explicit TOML path.
pub fn load_config_from(path: &Path) -> Result<IngestConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

/// Load configuration using env var + fallback:
/// 1) $POLICYWATCH_CONFIG_PATH
/// 2) config/ingest.toml
/// Missing files yield the built-in defaults (empty source list).
pub fn load_config_default() -> Result<IngestConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
        return Err(anyhow!("POLICYWATCH_CONFIG_PATH points to non-existent path"));
    }
    let default_p = PathBuf::from("config/ingest.toml");
    if default_p.exists() {
        return load_config_from(&default_p);
    }
    Ok(IngestConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_full_config() {
        let toml_src = r#"
            [http]
            max_attempts = 3
            backoff_base_ms = 250

            [polish]
            provider = "openai"
            daily_budget = 50

            [[sources]]
            name = "White House — Executive Orders"
            kind = "wh_executive_orders"
            base_url = "https://www.whitehouse.gov/presidential-actions/executive-orders/"
            jurisdiction = "federal"
            agency = "White House"
            status = "executive_order"
            cutoff_external_id = "https://www.whitehouse.gov/presidential-actions/2025/01/first-order/"
            bounds = { max_pages = 3, max_items = 40 }
        "#;
        let cfg: IngestConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(cfg.http.max_attempts, 3);
        assert_eq!(cfg.polish.daily_budget, 50);
        assert_eq!(cfg.sources.len(), 1);
        let src = cfg.source("White House — Executive Orders").unwrap();
        assert_eq!(src.bounds.max_pages, 3);
        assert!(src.cutoff_external_id.is_some());
    }

    #[test]
    fn bounds_default_when_omitted() {
        let toml_src = r#"
            [[sources]]
            name = "X"
            kind = "x"
            base_url = "https://example.gov/"
            jurisdiction = "state"
            agency = "Governor"
            status = "press_release"
        "#;
        let cfg: IngestConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(cfg.sources[0].bounds, SyncBounds::default());
        assert!(cfg.sources[0].cutoff_external_id.is_none());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallback() {
        let old = std::env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();
        std::env::remove_var(ENV_PATH);

        // No files anywhere → built-in defaults
        let cfg = load_config_default().unwrap();
        assert!(cfg.sources.is_empty());

        // Env var takes precedence
        let p = tmp.path().join("ingest.toml");
        let mut f = std::fs::File::create(&p).unwrap();
        writeln!(f, "[polish]\ndaily_budget = 7").unwrap();
        std::env::set_var(ENV_PATH, p.display().to_string());
        let cfg2 = load_config_default().unwrap();
        assert_eq!(cfg2.polish.daily_budget, 7);
        std::env::remove_var(ENV_PATH);

        std::env::set_current_dir(&old).unwrap();
    }
}
