//! End-to-end request pipeline: URLs → extract → enrich → publish images →
//! assemble → one batch update.
//!
//! URLs are processed by a bounded worker pool. Finished posts pass through a
//! reorder buffer so the single [`DocumentAssembler`](crate::DocumentAssembler)
//! always sees them in input order, starting from the document's end index as
//! read after harvesting.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use postharvest_shared::{
    AppConfig, BearerToken, DocumentTarget, HarvestError, ImageSize, ProcessedPost, Result,
    SourcePage, is_resource_id,
};

use crate::assembler::assemble;
use crate::context::{CollaboratorFactory, Collaborators};
use crate::reorder::ReorderBuffer;

// ---------------------------------------------------------------------------
// Request / report
// ---------------------------------------------------------------------------

/// One harvest request as received at the boundary.
#[derive(Debug, Clone)]
pub struct HarvestRequest {
    pub urls: Vec<String>,
    /// `None` when the caller named neither a document nor asked for a new one.
    pub target: Option<DocumentTarget>,
    /// Raw `Authorization` header value.
    pub authorization: Option<String>,
}

/// A URL whose post was left out of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlFailure {
    pub url: String,
    pub reason: String,
}

/// Outcome of a completed request.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub request_id: Uuid,
    pub document_id: String,
    pub document_link: String,
    pub posts_inserted: usize,
    pub failures: Vec<UrlFailure>,
    pub final_cursor: usize,
    pub operations: usize,
    pub completed_at: DateTime<Utc>,
}

/// Settings that shape a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub navigation_timeout: Duration,
    /// URLs in flight at once; values below 1 are treated as 1.
    pub concurrency: usize,
    pub image_size: ImageSize,
}

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            navigation_timeout: config.browser.navigation_timeout(),
            concurrency: config.pipeline.concurrency,
            image_size: ImageSize::square(config.google.image_size_pt),
        }
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a URL starts processing.
    fn url_started(&self, url: &str, index: usize, total: usize);
    /// Called when a URL finished, successfully or not.
    fn url_finished(&self, url: &str, ok: bool);
    /// Called when the pipeline completes.
    fn done(&self, report: &HarvestReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn url_started(&self, _url: &str, _index: usize, _total: usize) {}
    fn url_finished(&self, _url: &str, _ok: bool) {}
    fn done(&self, _report: &HarvestReport) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run one request end to end.
///
/// 1. Check the credential (nothing else runs if it is invalid)
/// 2. Validate URLs and target
/// 3. Create the document when asked to
/// 4. Process URLs through the worker pool, collecting posts in input order
/// 5. Read the document's current end index, assemble and apply the batch
///
/// Only auth, config and document-service errors abort; any other failure
/// leaves that one URL out and is listed in the report.
#[instrument(skip_all, fields(request_id = tracing::field::Empty, urls = request.urls.len()))]
pub async fn process_request(
    request: &HarvestRequest,
    factory: &dyn CollaboratorFactory,
    options: &PipelineOptions,
    progress: &dyn ProgressReporter,
) -> Result<HarvestReport> {
    let start = Instant::now();
    let request_id = Uuid::now_v7();
    tracing::Span::current().record("request_id", tracing::field::display(request_id));

    let token = BearerToken::from_header(request.authorization.as_deref())?;
    let urls = parse_urls(&request.urls)?;
    let target = validate_target(request.target.as_ref())?;

    let collab = factory.build(&token)?;

    // --- Phase 1: Document ---
    progress.phase("Preparing document");
    let document_id = match target {
        DocumentTarget::Existing(id) => id.clone(),
        DocumentTarget::CreateNew { title } => collab.documents.create_document(title).await?,
    };
    info!(%document_id, "document ready");

    // --- Phase 2: Harvest ---
    progress.phase("Harvesting posts");
    let total = urls.len();
    let mut posts = Vec::with_capacity(total);
    let mut failures = Vec::new();
    let mut reorder = ReorderBuffer::new();

    let mut completions = stream::iter(urls.into_iter().enumerate())
        .map(|(index, url)| {
            let collab = &collab;
            async move {
                progress.url_started(url.as_str(), index, total);
                let outcome = process_url(collab, &url, options).await;
                progress.url_finished(url.as_str(), outcome.is_ok());
                (index, url, outcome)
            }
        })
        .buffer_unordered(options.concurrency.max(1));

    while let Some((index, url, outcome)) = completions.next().await {
        let outcome = match outcome {
            Err(e) if e.aborts_request() => return Err(e),
            other => other,
        };

        for (url, outcome) in reorder.push(index, (url, outcome)) {
            match outcome {
                Ok(post) => posts.push(post),
                Err(e) => {
                    warn!(url = %url, error = %e, "URL left out of document");
                    failures.push(UrlFailure {
                        url: url.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
    drop(completions);

    // --- Phase 3: Publish ---
    // The end index is read only now: harvesting takes minutes and the
    // document may have been edited meanwhile.
    progress.phase("Publishing batch");
    let end_index = collab.documents.end_index(&document_id).await?;
    debug!(end_index, posts = posts.len(), "assembling batch");
    let assembly = assemble(end_index, &posts, options.image_size);
    if assembly.operations.is_empty() {
        debug!("no posts to insert, skipping batch update");
    } else {
        collab
            .documents
            .apply_batch(&document_id, &assembly.operations)
            .await?;
    }

    let report = HarvestReport {
        request_id,
        document_link: collab.documents.document_link(&document_id),
        document_id,
        posts_inserted: assembly.posts,
        failures,
        final_cursor: assembly.final_cursor,
        operations: assembly.operations.len(),
        completed_at: Utc::now(),
    };

    info!(
        posts = report.posts_inserted,
        failed = report.failures.len(),
        ops = report.operations,
        cursor = report.final_cursor,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request complete"
    );
    progress.done(&report);

    Ok(report)
}

/// Extract, enrich and publish images for one URL.
#[instrument(skip_all, fields(url = %url))]
async fn process_url(
    collab: &Collaborators,
    url: &Url,
    options: &PipelineOptions,
) -> Result<ProcessedPost> {
    let page = SourcePage::new(url.clone(), options.navigation_timeout);
    let extraction = collab.extractor.extract(&page).await?;
    if !extraction.is_complete() {
        debug!(
            from_primary = extraction.from_primary,
            stabilized = extraction.scroll.stabilized,
            "best-effort extraction"
        );
    }

    let enriched = collab.enricher.enrich(&extraction.raw_text).await?;

    let slug = page_slug(url);
    let mut outcomes = Vec::with_capacity(extraction.images.len());
    for (n, image) in extraction.images.iter().enumerate() {
        let label = format!("{slug}_{}", n + 1);
        outcomes.push(collab.assets.publish(&image.canonical_url, &label).await);
    }

    Ok(ProcessedPost::from_parts(enriched, outcomes))
}

fn parse_urls(raw: &[String]) -> Result<Vec<Url>> {
    if raw.is_empty() {
        return Err(HarvestError::validation("no URLs to process"));
    }

    raw.iter()
        .map(|s| {
            let url = Url::parse(s.trim())
                .map_err(|e| HarvestError::validation(format!("invalid URL {s:?}: {e}")))?;
            match url.scheme() {
                "http" | "https" => Ok(url),
                other => Err(HarvestError::validation(format!(
                    "unsupported URL scheme {other:?} in {s:?}"
                ))),
            }
        })
        .collect()
}

fn validate_target(target: Option<&DocumentTarget>) -> Result<&DocumentTarget> {
    match target {
        None => Err(HarvestError::validation(
            "either a document id or create_new is required",
        )),
        Some(DocumentTarget::Existing(id)) if id.trim().is_empty() => {
            Err(HarvestError::validation("document id is empty"))
        }
        Some(DocumentTarget::Existing(id)) if !is_resource_id(id) => Err(
            HarvestError::validation(format!("invalid document id {id:?}")),
        ),
        Some(target) => Ok(target),
    }
}

/// Last non-empty path segment, or the host for bare URLs.
fn page_slug(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .or_else(|| url.host_str())
        .unwrap_or("post")
        .to_string()
}
