//! Content extraction from one rendered page.
//!
//! Navigate, wait for the primary content region, scroll until the page stops
//! growing, then read the region's text and its filtered images. A missing
//! region falls back to the whole body; it is never an error on its own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use postharvest_shared::{BrowserConfig, FilteredImage, ImageFilterConfig, Result, SourcePage};

use crate::browser::{BrowserDriver, PageSession};
use crate::images::ImageFilter;
use crate::scroll::{self, ScrollOutcome};

/// Region used when the primary content container never appears.
const FALLBACK_REGION: &str = "body";

/// Everything harvested from one page.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub raw_text: String,
    pub images: Vec<FilteredImage>,
    /// `false` when the primary region was absent and the body was used.
    pub from_primary: bool,
    pub scroll: ScrollOutcome,
}

impl Extraction {
    /// Whether everything the page offered was likely captured.
    pub fn is_complete(&self) -> bool {
        self.from_primary && self.scroll.stabilized
    }
}

/// Anything that can turn a source page into an [`Extraction`].
#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(&self, page: &SourcePage) -> Result<Extraction>;
}

/// Timing and selector settings for [`ContentExtractor`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub content_selector: String,
    pub selector_timeout: Duration,
    pub initial_settle: Duration,
    pub scroll_settle: Duration,
    pub max_scroll_passes: u32,
    pub image_nudges: u32,
    pub image_nudge_px: i64,
}

impl From<&BrowserConfig> for ExtractOptions {
    fn from(config: &BrowserConfig) -> Self {
        Self {
            content_selector: config.content_selector.clone(),
            selector_timeout: Duration::from_millis(config.selector_timeout_ms),
            initial_settle: Duration::from_millis(config.initial_settle_ms),
            scroll_settle: Duration::from_millis(config.scroll_settle_ms),
            max_scroll_passes: config.max_scroll_passes,
            image_nudges: config.image_nudges,
            image_nudge_px: config.image_nudge_px,
        }
    }
}

/// Drives a browser session per URL.
pub struct ContentExtractor {
    driver: Arc<dyn BrowserDriver>,
    options: ExtractOptions,
    filter: ImageFilter,
}

impl ContentExtractor {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        options: ExtractOptions,
        images: &ImageFilterConfig,
    ) -> Self {
        Self {
            driver,
            options,
            filter: ImageFilter::new(images),
        }
    }

    async fn harvest(&self, session: &dyn PageSession, page: &SourcePage) -> Result<Extraction> {
        let opts = &self.options;

        let from_primary = session
            .wait_for(&opts.content_selector, opts.selector_timeout)
            .await?;
        if !from_primary {
            warn!(
                selector = %opts.content_selector,
                "primary content region not found, falling back to page body"
            );
        }
        pause(opts.initial_settle).await;

        let scroll =
            scroll::stabilize(session, opts.scroll_settle, opts.max_scroll_passes).await?;

        let region = if from_primary {
            opts.content_selector.as_str()
        } else {
            FALLBACK_REGION
        };

        let raw_text = match session.inner_text(region).await? {
            Some(text) => text,
            None => session
                .inner_text(FALLBACK_REGION)
                .await?
                .unwrap_or_default(),
        };

        for _ in 0..opts.image_nudges {
            session.scroll_by(opts.image_nudge_px).await?;
            pause(opts.scroll_settle).await;
        }

        let html = session.html().await?;
        let images = self.filter.extract(&html, region, &page.url)?;

        Ok(Extraction {
            raw_text,
            images,
            from_primary,
            scroll,
        })
    }
}

#[async_trait]
impl PageExtractor for ContentExtractor {
    #[instrument(skip_all, fields(url = %page.url))]
    async fn extract(&self, page: &SourcePage) -> Result<Extraction> {
        let session = self.driver.open(&page.url, page.timeout).await?;

        let result = self.harvest(session.as_ref(), page).await;

        // Close on every path; a close failure never masks the extraction result.
        if let Err(e) = session.close().await {
            debug!(error = %e, "tab close failed");
        }

        let extraction = result?;
        info!(
            chars = extraction.raw_text.chars().count(),
            images = extraction.images.len(),
            passes = extraction.scroll.passes,
            complete = extraction.is_complete(),
            "page extracted"
        );
        Ok(extraction)
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
