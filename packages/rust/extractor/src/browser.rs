//! Browser driver seam.
//!
//! [`BrowserDriver`] opens one tab per URL; [`PageSession`] is the small set
//! of page operations the extractor needs. The production implementation is
//! [`crate::chrome::ChromeDriver`]; tests drive scripted in-memory pages.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use postharvest_shared::Result;

/// Opens rendered pages.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate a fresh tab to `url`.
    ///
    /// Fails with `HarvestError::NavigationTimeout` when the page does not
    /// respond within `timeout`.
    async fn open(&self, url: &Url, timeout: Duration) -> Result<Box<dyn PageSession>>;
}

/// One open tab.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Wait until `selector` matches an element. `Ok(false)` when it never
    /// appears within `timeout`.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool>;

    /// Current document height in CSS pixels.
    async fn scroll_height(&self) -> Result<u64>;

    async fn scroll_to_bottom(&self) -> Result<()>;

    /// Relative scroll, like a mouse wheel tick.
    async fn scroll_by(&self, delta_y: i64) -> Result<()>;

    /// Rendered text of the first element matching `selector`, if any.
    async fn inner_text(&self, selector: &str) -> Result<Option<String>>;

    /// Serialized DOM of the whole page.
    async fn html(&self) -> Result<String>;

    /// Close the tab and release its resources.
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted page fakes shared by the extractor tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use postharvest_shared::HarvestError;

    /// Height sequence returned by successive `scroll_height` calls; the last
    /// value repeats forever.
    #[derive(Debug, Clone)]
    pub enum Heights {
        Sequence(Vec<u64>),
        /// Grows by `step` on every measurement, never stabilizing.
        Growing { start: u64, step: u64 },
    }

    #[derive(Debug, Default)]
    pub struct PageLog {
        pub measurements: AtomicUsize,
        pub scrolls_to_bottom: AtomicUsize,
        pub wheel_scrolls: AtomicUsize,
        pub closed: AtomicBool,
    }

    pub struct ScriptedPage {
        pub heights: Heights,
        pub present_selectors: Vec<String>,
        pub texts: HashMap<String, String>,
        pub html: String,
        pub fail_html: bool,
        pub log: Arc<PageLog>,
    }

    impl ScriptedPage {
        pub fn new(html: &str) -> Self {
            Self {
                heights: Heights::Sequence(vec![1000]),
                present_selectors: Vec::new(),
                texts: HashMap::new(),
                html: html.to_string(),
                fail_html: false,
                log: Arc::new(PageLog::default()),
            }
        }

        pub fn with_region(mut self, selector: &str, text: &str) -> Self {
            self.present_selectors.push(selector.to_string());
            self.texts.insert(selector.to_string(), text.to_string());
            self
        }

        pub fn with_body_text(mut self, text: &str) -> Self {
            self.texts.insert("body".to_string(), text.to_string());
            self
        }

        pub fn with_heights(mut self, heights: Heights) -> Self {
            self.heights = heights;
            self
        }
    }

    #[async_trait]
    impl PageSession for ScriptedPage {
        async fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<bool> {
            Ok(self.present_selectors.iter().any(|s| s == selector))
        }

        async fn scroll_height(&self) -> Result<u64> {
            let n = self.log.measurements.fetch_add(1, Ordering::SeqCst);
            Ok(match &self.heights {
                Heights::Sequence(values) => values
                    .get(n)
                    .or_else(|| values.last())
                    .copied()
                    .unwrap_or(0),
                Heights::Growing { start, step } => start + step * n as u64,
            })
        }

        async fn scroll_to_bottom(&self) -> Result<()> {
            self.log.scrolls_to_bottom.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn scroll_by(&self, _delta_y: i64) -> Result<()> {
            self.log.wheel_scrolls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn inner_text(&self, selector: &str) -> Result<Option<String>> {
            Ok(self.texts.get(selector).cloned())
        }

        async fn html(&self) -> Result<String> {
            if self.fail_html {
                return Err(HarvestError::Browser("target crashed".into()));
            }
            Ok(self.html.clone())
        }

        async fn close(&self) -> Result<()> {
            self.log.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Hands out one prepared page per `open` call, or times out.
    pub struct ScriptedDriver {
        pages: Mutex<Vec<ScriptedPage>>,
        pub timeout_navigation: bool,
    }

    impl ScriptedDriver {
        pub fn new(page: ScriptedPage) -> Self {
            Self {
                pages: Mutex::new(vec![page]),
                timeout_navigation: false,
            }
        }

        pub fn timing_out() -> Self {
            Self {
                pages: Mutex::new(Vec::new()),
                timeout_navigation: true,
            }
        }
    }

    #[async_trait]
    impl BrowserDriver for ScriptedDriver {
        async fn open(&self, url: &Url, timeout: Duration) -> Result<Box<dyn PageSession>> {
            if self.timeout_navigation {
                return Err(HarvestError::NavigationTimeout {
                    url: url.to_string(),
                    timeout,
                });
            }
            let page = self
                .pages
                .lock()
                .unwrap()
                .pop()
                .expect("scripted driver has no page left");
            Ok(Box::new(page))
        }
    }
}
