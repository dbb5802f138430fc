//! Headless Chromium driver backed by `chromiumoxide`.
//!
//! One browser process per driver; one tab per opened URL.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

use postharvest_shared::{BrowserConfig, HarvestError, Result};

use crate::browser::{BrowserDriver, PageSession};

/// Poll interval while waiting for a selector to appear.
const SELECTOR_POLL: Duration = Duration::from_millis(250);

/// chromiumoxide waits at most this long for a frame's load lifecycle,
/// whatever the command timeout is. Longer budgets are clamped to it.
pub const NAVIGATION_CAP: Duration = Duration::from_secs(30);

/// The navigation deadline actually enforced for a requested budget.
pub fn effective_navigation_timeout(budget: Duration) -> Duration {
    budget.min(NAVIGATION_CAP)
}

/// Production [`BrowserDriver`] running a local Chromium over CDP.
pub struct ChromeDriver {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
}

impl ChromeDriver {
    /// Launch Chromium with the given settings.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let mut builder = CdpConfig::builder().no_sandbox().arg("--disable-gpu");
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let navigation_timeout = config.navigation_timeout();
        if navigation_timeout > NAVIGATION_CAP {
            warn!(
                configured_ms = config.navigation_timeout_ms,
                effective_ms = NAVIGATION_CAP.as_millis() as u64,
                "navigation timeout exceeds the browser's frame deadline; clamping"
            );
        }
        builder = builder.request_timeout(effective_navigation_timeout(navigation_timeout));
        let cdp_config = builder
            .build()
            .map_err(|e| HarvestError::Browser(format!("invalid browser config: {e}")))?;

        let (browser, mut events) = Browser::launch(cdp_config)
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to launch Chromium: {e}")))?;

        // The CDP connection only makes progress while its handler is polled.
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    trace!(error = %e, "CDP handler event error");
                }
            }
        });

        info!(headless = config.headless, "browser launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
        })
    }

    /// Close the browser process and stop the CDP handler.
    pub async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!(error = %e, "browser close failed");
        }
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "browser wait failed");
        }
        self.handler.abort();
        info!("browser closed");
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    #[instrument(skip_all, fields(url = %url))]
    async fn open(&self, url: &Url, timeout: Duration) -> Result<Box<dyn PageSession>> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| HarvestError::Browser(format!("failed to open tab: {e}")))?
        };

        let timeout = effective_navigation_timeout(timeout);
        let outcome = tokio::time::timeout(timeout, page.goto(url.as_str()))
            .await
            .map(|nav| nav.map(|_| ()));

        match outcome {
            Ok(Ok(())) => {
                debug!("navigation complete");
                Ok(Box::new(ChromePage { page }))
            }
            Ok(Err(e)) => {
                let _ = page.close().await;
                Err(navigation_error(url, timeout, e))
            }
            Err(_) => {
                let _ = page.close().await;
                Err(HarvestError::NavigationTimeout {
                    url: url.to_string(),
                    timeout,
                })
            }
        }
    }
}

/// Classify a failed `goto`. The handler's own deadline surfaces as
/// `CdpError::Timeout` and is a navigation timeout like ours.
fn navigation_error(url: &Url, timeout: Duration, error: CdpError) -> HarvestError {
    match error {
        CdpError::Timeout => HarvestError::NavigationTimeout {
            url: url.to_string(),
            timeout,
        },
        other => HarvestError::Browser(format!("navigation to {url} failed: {other}")),
    }
}

/// Errors `find_element` returns while the selector matches nothing yet.
/// CDP reports a missing node as a protocol error; transport failures are
/// anything else.
fn is_missing_element(error: &CdpError) -> bool {
    matches!(
        error,
        CdpError::NotFound | CdpError::Chrome(_) | CdpError::ChromeMessage(_)
    )
}

/// One Chromium tab.
struct ChromePage {
    page: Page,
}

impl ChromePage {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| HarvestError::Browser(format!("script evaluation failed: {e}")))?
            .into_value()
            .map_err(|e| HarvestError::Browser(format!("unexpected script result: {e}")))
    }

    async fn run(&self, script: String) -> Result<()> {
        self.page
            .evaluate(script)
            .await
            .map(|_| ())
            .map_err(|e| HarvestError::Browser(format!("script evaluation failed: {e}")))
    }
}

#[async_trait]
impl PageSession for ChromePage {
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.page.find_element(selector).await {
                Ok(_) => return Ok(true),
                Err(e) if is_missing_element(&e) => {}
                Err(e) => {
                    return Err(HarvestError::Browser(format!(
                        "waiting for {selector} failed: {e}"
                    )));
                }
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }
    }

    async fn scroll_height(&self) -> Result<u64> {
        self.eval("document.body.scrollHeight".to_string()).await
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.run("window.scrollTo(0, document.body.scrollHeight)".to_string())
            .await
    }

    async fn scroll_by(&self, delta_y: i64) -> Result<()> {
        self.run(format!("window.scrollBy(0, {delta_y})")).await
    }

    async fn inner_text(&self, selector: &str) -> Result<Option<String>> {
        match self.page.find_element(selector).await {
            Ok(element) => element
                .inner_text()
                .await
                .map_err(|e| HarvestError::Browser(format!("innerText of {selector}: {e}"))),
            Err(e) if is_missing_element(&e) => Ok(None),
            Err(e) => Err(HarvestError::Browser(format!(
                "looking up {selector} failed: {e}"
            ))),
        }
    }

    async fn html(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to read page content: {e}")))
    }

    async fn close(&self) -> Result<()> {
        // `Page` is a cheap handle; closing a clone closes the tab.
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to close tab: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://www.linkedin.com/posts/a").unwrap()
    }

    #[test]
    fn budget_is_clamped_to_frame_deadline() {
        assert_eq!(
            effective_navigation_timeout(Duration::from_secs(60)),
            NAVIGATION_CAP
        );
        assert_eq!(
            effective_navigation_timeout(Duration::from_secs(10)),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn handler_timeout_is_a_navigation_timeout() {
        let err = navigation_error(&url(), Duration::from_secs(30), CdpError::Timeout);
        match err {
            HarvestError::NavigationTimeout { url, timeout } => {
                assert_eq!(url, "https://www.linkedin.com/posts/a");
                assert_eq!(timeout, Duration::from_secs(30));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn other_navigation_failures_are_browser_errors() {
        let err = navigation_error(&url(), Duration::from_secs(30), CdpError::NoResponse);
        assert!(matches!(err, HarvestError::Browser(_)));
    }

    #[test]
    fn only_lookup_misses_keep_polling() {
        assert!(is_missing_element(&CdpError::NotFound));
        assert!(is_missing_element(&CdpError::msg("Could not find node with given id")));
        assert!(!is_missing_element(&CdpError::NoResponse));
        assert!(!is_missing_element(&CdpError::Timeout));
        assert!(!is_missing_element(&CdpError::Io(std::io::Error::other("broken pipe"))));
    }
}
