//! Error types for postharvest.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only a few variants abort a whole request (see [`HarvestError::aborts_request`]).
//! Everything else raised while processing one URL degrades that URL alone.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all postharvest operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Missing, malformed or rejected bearer credential.
    #[error("auth error: {message}")]
    Auth { message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Request or input validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The page did not respond within the navigation budget.
    #[error("navigation to {url} timed out after {}ms", timeout.as_millis())]
    NavigationTimeout { url: String, timeout: Duration },

    /// Browser automation failure (launch, CDP command, script evaluation).
    #[error("browser error: {0}")]
    Browser(String),

    /// Network/HTTP error outside the document engine.
    #[error("network error: {0}")]
    Network(String),

    /// Text enrichment failure (LLM API or response parsing).
    #[error("enrichment error: {0}")]
    Enrichment(String),

    /// Document creation or batch publish failure.
    #[error("document service error: {0}")]
    Upstream(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create an auth error from any displayable message.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the whole multi-URL request.
    ///
    /// Credential and document-service failures abort; anything else is
    /// scoped to the URL that raised it.
    pub fn aborts_request(&self) -> bool {
        matches!(
            self,
            Self::Auth { .. } | Self::Config { .. } | Self::Upstream(_)
        )
    }
}
