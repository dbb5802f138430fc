//! Image candidate collection, filtering and deduplication.
//!
//! Candidates come from `<img>` elements and `<picture><source srcset>` entries
//! inside the content region. A candidate survives when it has a network
//! source, carries no decorative keyword, and is hosted on the content domain.
//! Survivors are deduplicated by their absolute URL, first occurrence wins.

use std::collections::HashSet;

use scraper::{Html, Selector};
use tracing::trace;
use url::Url;

use postharvest_shared::{
    FilteredImage, HarvestError, ImageCandidate, ImageFilterConfig, Result,
};

/// Heuristic classifier and deduplicator for image candidates.
#[derive(Debug, Clone)]
pub struct ImageFilter {
    content_domain: String,
    blocked_keywords: Vec<String>,
}

impl ImageFilter {
    pub fn new(config: &ImageFilterConfig) -> Self {
        Self {
            content_domain: config.content_domain.trim().to_ascii_lowercase(),
            blocked_keywords: config
                .blocked_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Collect candidates from the serialized DOM, restricted to `region`.
    ///
    /// `<img>` candidates come first, then every `srcset` entry of every
    /// `<picture><source>`, each in document order.
    pub fn collect_candidates(html: &str, region: &str) -> Result<Vec<ImageCandidate>> {
        let doc = Html::parse_document(html);
        let img_sel = parse_selector(&format!("{region} img"))?;
        let source_sel = parse_selector(&format!("{region} picture source"))?;

        let mut candidates = Vec::new();

        for el in doc.select(&img_sel) {
            let attrs = el.value();
            candidates.push(
                ImageCandidate::new(attrs.attr("src").unwrap_or_default())
                    .with_alt(attrs.attr("alt").unwrap_or_default())
                    .with_class(attrs.attr("class").unwrap_or_default()),
            );
        }

        for el in doc.select(&source_sel) {
            let attrs = el.value();
            let class = attrs.attr("class").unwrap_or_default();
            for url in parse_srcset(attrs.attr("srcset").unwrap_or_default()) {
                candidates.push(ImageCandidate::new(url).with_class(class));
            }
        }

        Ok(candidates)
    }

    /// Filter and deduplicate candidates, preserving first-seen order.
    pub fn filter(
        &self,
        candidates: impl IntoIterator<Item = ImageCandidate>,
        base_url: &Url,
    ) -> Vec<FilteredImage> {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();

        for candidate in candidates {
            let Some(url) = self.accept(&candidate, base_url) else {
                continue;
            };
            if seen.insert(url.as_str().to_string()) {
                kept.push(FilteredImage { canonical_url: url });
            }
        }

        kept
    }

    /// Collect and filter in one step.
    pub fn extract(&self, html: &str, region: &str, base_url: &Url) -> Result<Vec<FilteredImage>> {
        let candidates = Self::collect_candidates(html, region)?;
        let total = candidates.len();
        let images = self.filter(candidates, base_url);
        trace!(total, kept = images.len(), "image candidates filtered");
        Ok(images)
    }

    /// Apply the per-candidate rules; returns the resolved URL when accepted.
    fn accept(&self, candidate: &ImageCandidate, base_url: &Url) -> Option<Url> {
        let raw = candidate.raw_url.trim();
        if raw.is_empty() || raw.to_ascii_lowercase().starts_with("data:") {
            return None;
        }

        let url = base_url.join(raw).ok()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return None;
        }

        // Keywords are checked against the resolved URL too, so a path
        // inherited from the base is judged the same on every pass.
        if self.is_decorative(candidate, &url) {
            return None;
        }

        if !self.on_content_domain(&url) {
            return None;
        }

        Some(url)
    }

    fn is_decorative(&self, candidate: &ImageCandidate, resolved: &Url) -> bool {
        let fields = [
            candidate.raw_url.to_lowercase(),
            resolved.as_str().to_lowercase(),
            candidate.alt_text.to_lowercase(),
            candidate.css_class.to_lowercase(),
        ];
        self.blocked_keywords
            .iter()
            .any(|keyword| fields.iter().any(|field| field.contains(keyword.as_str())))
    }

    fn on_content_domain(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        host == self.content_domain
            || host
                .strip_suffix(self.content_domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

/// Split a `srcset` attribute into its URLs, dropping width/density descriptors.
pub fn parse_srcset(srcset: &str) -> Vec<&str> {
    srcset
        .split(',')
        .filter_map(|entry| entry.split_whitespace().next())
        .collect()
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| HarvestError::config(format!("invalid selector '{selector}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ImageFilter {
        ImageFilter::new(&ImageFilterConfig::default())
    }

    fn page_url() -> Url {
        Url::parse("https://www.linkedin.com/posts/someone_activity-123").unwrap()
    }

    fn urls(images: &[FilteredImage]) -> Vec<&str> {
        images.iter().map(|i| i.canonical_url.as_str()).collect()
    }

    #[test]
    fn blocked_keyword_in_alt_is_case_insensitive() {
        let kept = filter().filter(
            vec![
                ImageCandidate::new("https://media.licdn.com/dms/image/a.jpg")
                    .with_alt("Avatar of the author"),
                ImageCandidate::new("https://media.licdn.com/dms/image/b.jpg")
                    .with_class("feed-shared-IMAGE EMOJI-inline"),
                ImageCandidate::new("https://media.licdn.com/dms/image/company-LOGO_100.png"),
                ImageCandidate::new("https://media.licdn.com/dms/image/c.jpg")
                    .with_alt("Chart of quarterly growth"),
            ],
            &page_url(),
        );

        assert_eq!(urls(&kept), vec!["https://media.licdn.com/dms/image/c.jpg"]);
    }

    #[test]
    fn off_domain_images_are_rejected() {
        let kept = filter().filter(
            vec![
                ImageCandidate::new("https://ads.example.net/pixel/photo.jpg"),
                ImageCandidate::new("https://media.licdn.com.evil.example/photo.jpg"),
                ImageCandidate::new("https://cdn.media.licdn.com/photo.jpg"),
            ],
            &page_url(),
        );

        assert_eq!(urls(&kept), vec!["https://cdn.media.licdn.com/photo.jpg"]);
    }

    #[test]
    fn inline_and_missing_sources_are_rejected() {
        let kept = filter().filter(
            vec![
                ImageCandidate::new(""),
                ImageCandidate::new("   "),
                ImageCandidate::new("data:image/png;base64,iVBORw0KGgo="),
                ImageCandidate::new("DATA:image/gif;base64,R0lGOD"),
                ImageCandidate::new("blob:https://media.licdn.com/1234"),
            ],
            &page_url(),
        );

        assert!(kept.is_empty());
    }

    #[test]
    fn relative_and_absolute_references_dedupe_in_first_seen_order() {
        let base = Url::parse("https://media.licdn.com/feed/update/42").unwrap();
        let kept = filter().filter(
            vec![
                ImageCandidate::new("/dms/image/first.jpg"),
                ImageCandidate::new("https://media.licdn.com/dms/image/second.jpg"),
                ImageCandidate::new("https://media.licdn.com/dms/image/first.jpg"),
                ImageCandidate::new("../../dms/image/second.jpg"),
            ],
            &base,
        );

        assert_eq!(
            urls(&kept),
            vec![
                "https://media.licdn.com/dms/image/first.jpg",
                "https://media.licdn.com/dms/image/second.jpg",
            ]
        );
    }

    #[test]
    fn protocol_relative_source_resolves_against_page() {
        let kept = filter().filter(
            vec![
                ImageCandidate::new("//media.licdn.com/dms/image/p.jpg"),
                ImageCandidate::new("https://media.licdn.com/dms/image/p.jpg"),
            ],
            &page_url(),
        );

        assert_eq!(urls(&kept), vec!["https://media.licdn.com/dms/image/p.jpg"]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let f = filter();
        let first = f.filter(
            vec![
                ImageCandidate::new("//media.licdn.com/dms/image/1.jpg"),
                ImageCandidate::new("https://media.licdn.com/dms/image/2.jpg?e=1&t=x"),
                ImageCandidate::new("https://media.licdn.com/dms/image/1.jpg"),
                ImageCandidate::new("https://static.example.com/3.jpg"),
            ],
            &page_url(),
        );

        let second = f.filter(first.iter().map(ImageCandidate::from), &page_url());

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn keyword_inherited_from_base_path_rejects_on_first_pass() {
        let f = filter();
        let base =
            Url::parse("https://media.licdn.com/dms/image/profile-displayphoto/post/").unwrap();
        let first = f.filter(
            vec![
                ImageCandidate::new("shot.jpg"),
                ImageCandidate::new("/dms/image/chart.jpg"),
            ],
            &base,
        );

        assert_eq!(urls(&first), vec!["https://media.licdn.com/dms/image/chart.jpg"]);

        let second = f.filter(first.iter().map(ImageCandidate::from), &base);
        assert_eq!(first, second);
    }

    #[test]
    fn srcset_entries_are_split() {
        assert_eq!(
            parse_srcset("https://a/1.jpg 480w, https://a/2.jpg 800w,https://a/3.jpg"),
            vec!["https://a/1.jpg", "https://a/2.jpg", "https://a/3.jpg"]
        );
        assert!(parse_srcset("").is_empty());
        assert!(parse_srcset(" , ").is_empty());
    }

    #[test]
    fn collects_from_region_only() {
        let html = r#"<html><body>
            <header><img src="https://media.licdn.com/dms/image/outside.jpg"></header>
            <article>
                <img src="https://media.licdn.com/dms/image/inline.jpg" alt="Slide" class="update-image">
                <img src="https://media.licdn.com/dms/image/profile-photo.jpg" alt="">
                <picture>
                    <source srcset="https://media.licdn.com/dms/image/small.webp 480w, https://media.licdn.com/dms/image/large.webp 1200w" class="hero">
                    <img src="https://media.licdn.com/dms/image/fallback.jpg">
                </picture>
            </article>
        </body></html>"#;

        let candidates = ImageFilter::collect_candidates(html, "article").unwrap();
        let raw: Vec<&str> = candidates.iter().map(|c| c.raw_url.as_str()).collect();

        assert_eq!(
            raw,
            vec![
                "https://media.licdn.com/dms/image/inline.jpg",
                "https://media.licdn.com/dms/image/profile-photo.jpg",
                "https://media.licdn.com/dms/image/fallback.jpg",
                "https://media.licdn.com/dms/image/small.webp",
                "https://media.licdn.com/dms/image/large.webp",
            ]
        );
        assert_eq!(candidates[0].alt_text, "Slide");
        assert_eq!(candidates[3].css_class, "hero");

        let images = filter().extract(html, "article", &page_url()).unwrap();
        assert_eq!(images.len(), 4);
        assert!(!urls(&images).iter().any(|u| u.contains("profile")));
        assert!(!urls(&images).iter().any(|u| u.contains("outside")));
    }

    #[test]
    fn invalid_region_selector_is_a_config_error() {
        let result = ImageFilter::collect_candidates("<html></html>", "article[");
        assert!(matches!(result, Err(HarvestError::Config { .. })));
    }
}
