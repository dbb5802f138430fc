//! Seams to the external collaborators of the pipeline.
//!
//! Concrete implementations live in `postharvest-core` (enrichment) and
//! `postharvest-google` (assets, documents); tests substitute fakes.

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::types::{BatchOperation, EnrichedText, PublishOutcome};

/// Turns raw scraped text into a cleaned body, a heading and insight lines.
/// Each call is independent.
#[async_trait]
pub trait TextEnricher: Send + Sync {
    async fn enrich(&self, raw_text: &str) -> Result<EnrichedText>;
}

/// Uploads one image and returns a durable public URL.
///
/// Never fails: a failed upload is reported as [`PublishOutcome::Failed`]
/// carrying the original URL.
#[async_trait]
pub trait AssetPublisher: Send + Sync {
    /// `label` names the asset (page slug plus position) on the remote side.
    async fn publish(&self, image_url: &Url, label: &str) -> PublishOutcome;
}

/// The remote structured document engine.
#[async_trait]
pub trait DocumentPublisher: Send + Sync {
    /// Create an empty document and return its identifier.
    async fn create_document(&self, title: &str) -> Result<String>;

    /// The document's reported end-of-content position.
    async fn end_index(&self, document_id: &str) -> Result<usize>;

    /// Apply the whole batch as one atomic update, in order.
    async fn apply_batch(&self, document_id: &str, operations: &[BatchOperation]) -> Result<()>;

    /// Human-facing link to the document.
    fn document_link(&self, document_id: &str) -> String;
}
