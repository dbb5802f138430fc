//! Scroll stabilization for infinite-scroll pages.
//!
//! Lazily-loaded pages only render their full content once scrolled. We keep
//! scrolling to the bottom until two consecutive height measurements agree,
//! or until the pass budget runs out.

use std::time::Duration;

use tracing::{debug, warn};

use postharvest_shared::Result;

use crate::browser::PageSession;

/// How a stabilization run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    /// Number of scroll-to-bottom passes performed.
    pub passes: u32,
    /// `false` when the pass budget ran out while the page was still growing.
    pub stabilized: bool,
    /// Last measured document height.
    pub final_height: u64,
}

/// Scroll until the document height stops changing.
///
/// Hitting `max_passes` is not an error: the outcome is marked as not
/// stabilized and extraction continues with whatever has loaded.
pub async fn stabilize(
    page: &dyn PageSession,
    settle: Duration,
    max_passes: u32,
) -> Result<ScrollOutcome> {
    let mut previous: Option<u64> = None;
    let mut passes = 0;

    loop {
        let height = page.scroll_height().await?;

        if previous == Some(height) {
            debug!(passes, height, "page height stabilized");
            return Ok(ScrollOutcome {
                passes,
                stabilized: true,
                final_height: height,
            });
        }

        if passes >= max_passes {
            warn!(
                passes,
                height, "scroll pass budget exhausted, continuing with partial content"
            );
            return Ok(ScrollOutcome {
                passes,
                stabilized: false,
                final_height: height,
            });
        }

        previous = Some(height);
        page.scroll_to_bottom().await?;
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        passes += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::browser::testing::{Heights, ScriptedPage};

    #[tokio::test]
    async fn constant_height_stops_after_one_pass() {
        let page = ScriptedPage::new("").with_heights(Heights::Sequence(vec![1200]));
        let log = page.log.clone();

        let outcome = stabilize(&page, Duration::ZERO, 10).await.unwrap();

        assert!(outcome.stabilized);
        assert_eq!(outcome.passes, 1);
        assert_eq!(outcome.final_height, 1200);
        assert_eq!(log.measurements.load(Ordering::SeqCst), 2);
        assert_eq!(log.scrolls_to_bottom.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn growing_then_stable_page() {
        let page = ScriptedPage::new("")
            .with_heights(Heights::Sequence(vec![800, 1600, 2400, 2400]));

        let outcome = stabilize(&page, Duration::ZERO, 10).await.unwrap();

        assert!(outcome.stabilized);
        assert_eq!(outcome.passes, 3);
        assert_eq!(outcome.final_height, 2400);
    }

    #[tokio::test]
    async fn endlessly_growing_page_hits_the_cap() {
        let page = ScriptedPage::new("").with_heights(Heights::Growing {
            start: 1000,
            step: 500,
        });
        let log = page.log.clone();

        let outcome = stabilize(&page, Duration::ZERO, 5).await.unwrap();

        assert!(!outcome.stabilized);
        assert_eq!(outcome.passes, 5);
        assert_eq!(log.scrolls_to_bottom.load(Ordering::SeqCst), 5);
        assert_eq!(outcome.final_height, 1000 + 5 * 500);
    }

    #[tokio::test]
    async fn zero_budget_never_scrolls() {
        let page = ScriptedPage::new("");
        let log = page.log.clone();

        let outcome = stabilize(&page, Duration::ZERO, 0).await.unwrap();

        assert!(!outcome.stabilized);
        assert_eq!(outcome.passes, 0);
        assert_eq!(log.scrolls_to_bottom.load(Ordering::SeqCst), 0);
    }
}
