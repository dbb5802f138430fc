//! Google Workspace collaborators.
//!
//! - [`docs`] — [`DocsClient`], the document engine behind `DocumentPublisher`
//! - [`drive`] — [`DriveClient`], image hosting behind `AssetPublisher`
//! - [`staging`] — per-image temp files for uploads

mod http;
mod wire;

pub mod docs;
pub mod drive;
pub mod staging;

pub use docs::DocsClient;
pub use drive::DriveClient;
pub use staging::{StagedAsset, image_extension, sanitize_label};
