//! Core domain types shared by the extraction, assembly and publishing crates.

use std::ops::Range;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarvestError, Result};

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// A page to harvest. Transient, one per requested URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePage {
    /// Page URL; also the base for resolving relative image references.
    pub url: Url,
    /// Navigation budget for the first response.
    pub timeout: Duration,
}

impl SourcePage {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self { url, timeout }
    }
}

/// An image reference found by DOM inspection, before filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageCandidate {
    /// `src` (or one `srcset` entry) exactly as written in the markup.
    pub raw_url: String,
    pub alt_text: String,
    pub css_class: String,
}

impl ImageCandidate {
    pub fn new(raw_url: impl Into<String>) -> Self {
        Self {
            raw_url: raw_url.into(),
            ..Default::default()
        }
    }

    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt_text = alt.into();
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.css_class = class.into();
        self
    }
}

/// An image that passed filtering. `canonical_url` is absolute and unique
/// within one extraction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilteredImage {
    pub canonical_url: Url,
}

impl From<&FilteredImage> for ImageCandidate {
    fn from(image: &FilteredImage) -> Self {
        ImageCandidate::new(image.canonical_url.as_str())
    }
}

// ---------------------------------------------------------------------------
// Enrichment and publishing
// ---------------------------------------------------------------------------

/// Output of the text enricher for one post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedText {
    /// Cleaned post body.
    pub body: String,
    /// Short heading derived from the body.
    pub heading: String,
    /// One-line takeaways derived from the body.
    pub insights: Vec<String>,
}

/// Result of publishing one image. A failure keeps the original URL so it
/// can be rendered as plain text instead of an embedded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published(String),
    Failed(String),
}

/// One fully processed source page, ready for assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedPost {
    pub heading: String,
    pub body: String,
    pub insights: Vec<String>,
    /// Durable asset URLs, in extraction order.
    pub image_refs: Vec<String>,
    /// Original image URLs that could not be published, in extraction order.
    pub failed_refs: Vec<String>,
}

impl ProcessedPost {
    /// Split publish outcomes into embedded references and failed references,
    /// preserving order within each list.
    pub fn from_parts(enriched: EnrichedText, outcomes: Vec<PublishOutcome>) -> Self {
        let mut image_refs = Vec::new();
        let mut failed_refs = Vec::new();
        for outcome in outcomes {
            match outcome {
                PublishOutcome::Published(url) => image_refs.push(url),
                PublishOutcome::Failed(url) => failed_refs.push(url),
            }
        }

        Self {
            heading: enriched.heading,
            body: enriched.body,
            insights: enriched.insights,
            image_refs,
            failed_refs,
        }
    }
}

// ---------------------------------------------------------------------------
// Batch operations
// ---------------------------------------------------------------------------

/// Fixed on-page size of an embedded image, in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width_pt: u32,
    pub height_pt: u32,
}

impl ImageSize {
    pub fn square(pt: u32) -> Self {
        Self {
            width_pt: pt,
            height_pt: pt,
        }
    }
}

/// One document mutation. Positions are only valid when every preceding
/// operation in the same batch has already been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    InsertText { at: usize, text: String },
    ApplyHeadingStyle { range: Range<usize> },
    InsertImage {
        at: usize,
        asset_url: String,
        size: ImageSize,
    },
}

// ---------------------------------------------------------------------------
// Request boundary
// ---------------------------------------------------------------------------

/// Where the assembled batch goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentTarget {
    Existing(String),
    CreateNew { title: String },
}

/// Google Docs and Drive ids are URL-safe base64: letters, digits, `-`, `_`.
/// Anything else would change the request path it is interpolated into.
pub fn is_resource_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// A validated bearer credential. `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Parse an `Authorization` header value of the form `Bearer <token>`.
    pub fn from_header(value: Option<&str>) -> Result<Self> {
        let value = value.ok_or_else(|| HarvestError::auth("missing Authorization header"))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| HarvestError::auth("Authorization header must use the Bearer scheme"))?
            .trim();

        if token.is_empty() || token.contains(char::is_whitespace) {
            return Err(HarvestError::auth("malformed bearer token"));
        }

        Ok(Self(token.to_string()))
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_ids_are_path_safe() {
        assert!(is_resource_id("1aBc-DEF_ghi234"));
        for bad in ["", "abc/def", "../admin", "doc?alt=media", "doc:batchUpdate", "a b", "dóc"] {
            assert!(!is_resource_id(bad), "{bad:?}");
        }
    }

    #[test]
    fn bearer_token_parsing() {
        let token = BearerToken::from_header(Some("Bearer ya29.abc")).expect("valid token");
        assert_eq!(token.secret(), "ya29.abc");

        assert!(matches!(
            BearerToken::from_header(None),
            Err(HarvestError::Auth { .. })
        ));
        assert!(matches!(
            BearerToken::from_header(Some("Basic dXNlcjpwYXNz")),
            Err(HarvestError::Auth { .. })
        ));
        assert!(matches!(
            BearerToken::from_header(Some("Bearer ")),
            Err(HarvestError::Auth { .. })
        ));
        assert!(matches!(
            BearerToken::from_header(Some("Bearer two tokens")),
            Err(HarvestError::Auth { .. })
        ));
    }

    #[test]
    fn bearer_token_debug_is_redacted() {
        let token = BearerToken::from_header(Some("Bearer secret-value")).unwrap();
        assert!(!format!("{token:?}").contains("secret-value"));
    }

    #[test]
    fn processed_post_splits_outcomes_in_order() {
        let enriched = EnrichedText {
            body: "Body".into(),
            heading: "Heading".into(),
            insights: vec!["One".into()],
        };
        let post = ProcessedPost::from_parts(
            enriched,
            vec![
                PublishOutcome::Published("https://drive.google.com/uc?id=a".into()),
                PublishOutcome::Failed("https://media.licdn.com/x.jpg".into()),
                PublishOutcome::Published("https://drive.google.com/uc?id=b".into()),
            ],
        );

        assert_eq!(
            post.image_refs,
            vec![
                "https://drive.google.com/uc?id=a".to_string(),
                "https://drive.google.com/uc?id=b".to_string(),
            ]
        );
        assert_eq!(post.failed_refs, vec!["https://media.licdn.com/x.jpg".to_string()]);
        assert_eq!(post.heading, "Heading");
    }

    #[test]
    fn filtered_image_roundtrips_to_candidate() {
        let image = FilteredImage {
            canonical_url: Url::parse("https://media.licdn.com/dms/image/a.jpg").unwrap(),
        };
        let candidate = ImageCandidate::from(&image);
        assert_eq!(candidate.raw_url, "https://media.licdn.com/dms/image/a.jpg");
        assert!(candidate.alt_text.is_empty());
    }
}
