//! Shared types, error model, collaborator traits and configuration for postharvest.
//!
//! This crate is the foundation depended on by all other postharvest crates.
//! It provides:
//! - [`HarvestError`] — the unified error type
//! - Domain types ([`SourcePage`], [`FilteredImage`], [`ProcessedPost`], [`BatchOperation`])
//! - Collaborator seams ([`TextEnricher`], [`AssetPublisher`], [`DocumentPublisher`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrowserConfig, GoogleConfig, ImageFilterConfig, LlmConfig, PipelineConfig,
    ServerConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_api_key,
};
pub use error::{HarvestError, Result};
pub use traits::{AssetPublisher, DocumentPublisher, TextEnricher};
pub use types::{
    BatchOperation, BearerToken, DocumentTarget, EnrichedText, FilteredImage, ImageCandidate,
    ImageSize, ProcessedPost, PublishOutcome, SourcePage, is_resource_id,
};
