// src/lib.rs
// Public library surface for integration tests (and the service layer that
// embeds this pipeline).

pub mod adapter;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod polish;
pub mod resolve;
pub mod store;
pub mod summarize;
pub mod sync;

// ---- Re-exports for stable public API ----
pub use crate::adapter::SourceAdapter;
pub use crate::config::{IngestConfig, PolishConfig, SourceSpec, SyncBounds};
pub use crate::extract::{NoopExtractor, TextExtractor};
pub use crate::model::{CandidateItem, ContentRecord, CrawlMode, NewItem, RunReport, Source};
pub use crate::polish::{PolishGate, PolishProvider};
pub use crate::resolve::{HttpResolver, Resolver};
pub use crate::store::{ItemStore, MemoryStore, PgStore};
pub use crate::sync::{effective_params, ingest, EffectiveParams};
