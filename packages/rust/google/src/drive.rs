//! Google Drive image publishing.
//!
//! Download, stage, upload, rename, share publicly. Any failing step turns
//! into [`PublishOutcome::Failed`] with the original URL.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use postharvest_shared::{
    AssetPublisher, BearerToken, GoogleConfig, HarvestError, PublishOutcome, Result,
};

use crate::http::{self, build_client};
use crate::staging::{self, StagedAsset};

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
}

/// Drive v3 client that turns remote images into public Drive assets.
pub struct DriveClient {
    http: Client,
    token: BearerToken,
    api_base: String,
    upload_base: String,
    staging_dir: PathBuf,
}

impl DriveClient {
    pub fn new(token: BearerToken, config: &GoogleConfig) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            token,
            api_base: config.drive_base_url.trim_end_matches('/').to_string(),
            upload_base: config.drive_upload_url.trim_end_matches('/').to_string(),
            staging_dir: staging::staging_dir(config.staging_dir.as_deref())?,
        })
    }

    /// Publicly viewable URL for a Drive file.
    pub fn public_url(file_id: &str) -> String {
        format!("https://drive.google.com/uc?id={file_id}")
    }

    async fn try_publish(&self, image_url: &Url, label: &str) -> Result<String> {
        // Source images are fetched without the caller's Google credential.
        let staged = StagedAsset::download(&self.http, image_url, &self.staging_dir, label).await?;

        let file_id = self.upload(&staged).await?;
        self.rename(&file_id, staged.file_name()).await?;
        self.share_publicly(&file_id).await?;

        debug!(file_id = %file_id, name = %staged.file_name(), "image published");
        Ok(Self::public_url(&file_id))
    }

    async fn upload(&self, staged: &StagedAsset) -> Result<String> {
        let bytes = staged.read().await?;
        let response = self
            .http
            .post(format!("{}/drive/v3/files", self.upload_base))
            .query(&[("uploadType", "media")])
            .bearer_auth(self.token.secret())
            .header(reqwest::header::CONTENT_TYPE, staged.mime_type())
            .body(bytes)
            .send()
            .await
            .map_err(|e| http::transport("drive upload", e))?;

        let uploaded: UploadedFile = http::check(response, "drive upload")
            .await?
            .json()
            .await
            .map_err(|e| HarvestError::Upstream(format!("unexpected upload response: {e}")))?;
        http::resource_id("file", &uploaded.id)?;
        Ok(uploaded.id)
    }

    async fn rename(&self, file_id: &str, name: &str) -> Result<()> {
        let response = self
            .http
            .patch(format!("{}/drive/v3/files/{file_id}", self.api_base))
            .bearer_auth(self.token.secret())
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| http::transport("drive rename", e))?;
        http::check(response, "drive rename").await?;
        Ok(())
    }

    async fn share_publicly(&self, file_id: &str) -> Result<()> {
        let response = self
            .http
            .post(format!(
                "{}/drive/v3/files/{file_id}/permissions",
                self.api_base
            ))
            .bearer_auth(self.token.secret())
            .json(&serde_json::json!({ "type": "anyone", "role": "reader" }))
            .send()
            .await
            .map_err(|e| http::transport("drive permission", e))?;
        http::check(response, "drive permission").await?;
        Ok(())
    }
}

#[async_trait]
impl AssetPublisher for DriveClient {
    #[instrument(skip_all, fields(url = %image_url, label = %label))]
    async fn publish(&self, image_url: &Url, label: &str) -> PublishOutcome {
        match self.try_publish(image_url, label).await {
            Ok(asset_url) => PublishOutcome::Published(asset_url),
            Err(e) => {
                warn!(error = %e, "image publish failed, keeping original URL");
                PublishOutcome::Failed(image_url.to_string())
            }
        }
    }
}
