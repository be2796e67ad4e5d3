// src/extract.rs
use chrono::{DateTime, Utc};

/// Best-effort plain text pulled out of a non-HTML document, plus the
/// document's own timestamp when the format carries one (PDF metadata etc).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub modified_at: Option<DateTime<Utc>>,
}

/// External text-extraction collaborator for non-HTML content (PDF, Word).
/// Implementations never fail: extraction trouble yields empty text.
#[async_trait::async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], content_type: &str) -> ExtractedText;
}

/// Default extractor: treats every non-HTML payload as opaque. Deployments
/// wire in a real PDF/OCR collaborator instead.
pub struct NoopExtractor;

#[async_trait::async_trait]
impl TextExtractor for NoopExtractor {
    async fn extract(&self, _bytes: &[u8], _content_type: &str) -> ExtractedText {
        ExtractedText::default()
    }
}
