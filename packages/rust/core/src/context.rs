//! Per-request collaborator context.
//!
//! Credentials are never held ambiently: every request builds a
//! [`Collaborators`] value from its own bearer token and passes it down.

use std::sync::Arc;

use tracing::info;

use postharvest_extractor::{ChromeDriver, ContentExtractor, ExtractOptions, PageExtractor};
use postharvest_google::{DocsClient, DriveClient};
use postharvest_shared::{
    AppConfig, AssetPublisher, BearerToken, DocumentPublisher, GoogleConfig, Result, TextEnricher,
    resolve_api_key,
};

use crate::enrichment::LlmEnricher;

/// Handles used while processing one request.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn PageExtractor>,
    pub enricher: Arc<dyn TextEnricher>,
    pub assets: Arc<dyn AssetPublisher>,
    pub documents: Arc<dyn DocumentPublisher>,
}

/// Builds the collaborators for one request from its credential.
pub trait CollaboratorFactory: Send + Sync {
    fn build(&self, token: &BearerToken) -> Result<Collaborators>;
}

/// Production factory: one shared browser and LLM client, Google clients
/// bound to each request's token.
pub struct LiveFactory {
    driver: Arc<ChromeDriver>,
    extractor: Arc<dyn PageExtractor>,
    enricher: Arc<dyn TextEnricher>,
    google: GoogleConfig,
}

impl LiveFactory {
    /// Resolve the LLM key and launch the browser.
    pub async fn launch(config: &AppConfig) -> Result<Self> {
        let api_key = resolve_api_key(config)?;
        let enricher = Arc::new(LlmEnricher::new(api_key, &config.llm)?);

        let driver = Arc::new(ChromeDriver::launch(&config.browser).await?);
        let extractor = Arc::new(ContentExtractor::new(
            driver.clone(),
            ExtractOptions::from(&config.browser),
            &config.images,
        ));

        info!(model = %config.llm.model, "collaborators ready");

        Ok(Self {
            driver,
            extractor,
            enricher,
            google: config.google.clone(),
        })
    }

    /// Close the browser.
    pub async fn shutdown(&self) {
        self.driver.shutdown().await;
    }
}

impl CollaboratorFactory for LiveFactory {
    fn build(&self, token: &BearerToken) -> Result<Collaborators> {
        Ok(Collaborators {
            extractor: self.extractor.clone(),
            enricher: self.enricher.clone(),
            assets: Arc::new(DriveClient::new(token.clone(), &self.google)?),
            documents: Arc::new(DocsClient::new(token.clone(), &self.google)?),
        })
    }
}
