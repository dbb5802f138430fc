//! Page content extraction for infinite-scroll post pages.
//!
//! This crate provides:
//! - [`browser`] — the driver seam ([`BrowserDriver`], [`PageSession`])
//! - [`chrome`] — the headless Chromium driver
//! - [`scroll`] — bounded scroll stabilization
//! - [`images`] — image candidate filtering and deduplication
//! - [`extract`] — the per-URL [`ContentExtractor`]

pub mod browser;
pub mod chrome;
pub mod extract;
pub mod images;
pub mod scroll;

pub use browser::{BrowserDriver, PageSession};
pub use chrome::ChromeDriver;
pub use extract::{ContentExtractor, ExtractOptions, Extraction, PageExtractor};
pub use images::{ImageFilter, parse_srcset};
pub use scroll::{ScrollOutcome, stabilize};
