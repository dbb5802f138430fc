//! Per-image local staging.
//!
//! Each downloaded image lives in its own named temp file which is removed
//! when the [`StagedAsset`] is dropped, whether or not the upload succeeded.

use std::io::Write;
use std::path::{Path, PathBuf};

use reqwest::Client;
use tempfile::NamedTempFile;
use tracing::debug;
use url::Url;

use postharvest_shared::{HarvestError, Result};

/// Extensions kept as-is; anything else is staged as `.jpg`.
const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

const DEFAULT_EXTENSION: &str = "jpg";

/// One downloaded image waiting for upload.
#[derive(Debug)]
pub struct StagedAsset {
    file: NamedTempFile,
    file_name: String,
    mime_type: &'static str,
}

impl StagedAsset {
    /// Download `url` into a fresh temp file under `dir`.
    pub async fn download(http: &Client, url: &Url, dir: &Path, label: &str) -> Result<Self> {
        let response = http
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| HarvestError::Network(format!("download of {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Network(format!(
                "download of {url} returned {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HarvestError::Network(format!("download of {url} failed: {e}")))?;

        Self::stage(dir, url, label, &bytes)
    }

    /// Write already-fetched bytes into a fresh temp file under `dir`.
    pub fn stage(dir: &Path, url: &Url, label: &str, bytes: &[u8]) -> Result<Self> {
        let ext = image_extension(url);
        let mut file = tempfile::Builder::new()
            .prefix("postharvest-")
            .suffix(&format!(".{ext}"))
            .tempfile_in(dir)
            .map_err(|e| HarvestError::io(dir, e))?;
        file.write_all(bytes)
            .map_err(|e| HarvestError::io(file.path(), e))?;

        debug!(path = %file.path().display(), bytes = bytes.len(), "image staged");

        Ok(Self {
            file,
            file_name: format!("{}.{ext}", sanitize_label(label)),
            mime_type: mime_type(ext),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Name the asset gets on the remote side.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub async fn read(&self) -> Result<Vec<u8>> {
        tokio::fs::read(self.path())
            .await
            .map_err(|e| HarvestError::io(self.path(), e))
    }
}

/// Lower-cased extension of the URL path when it is a known image type.
pub fn image_extension(url: &Url) -> &'static str {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    last.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .and_then(|ext| KNOWN_EXTENSIONS.iter().find(|known| **known == ext).copied())
        .unwrap_or(DEFAULT_EXTENSION)
}

fn mime_type(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

/// Keep letters, digits, spaces and underscores.
pub fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .collect();
    let trimmed = cleaned.trim_end();
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Staging directory from config, falling back to the system temp dir.
pub fn staging_dir(configured: Option<&str>) -> Result<PathBuf> {
    match configured {
        Some(dir) => {
            let path = PathBuf::from(dir);
            std::fs::create_dir_all(&path).map_err(|e| HarvestError::io(&path, e))?;
            Ok(path)
        }
        None => Ok(std::env::temp_dir()),
    }
}
