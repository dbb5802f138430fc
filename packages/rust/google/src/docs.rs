//! Google Docs client.
//!
//! Implements [`DocumentPublisher`]: create, read the end index, and apply one
//! atomic `batchUpdate` per request.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use postharvest_shared::{
    BatchOperation, BearerToken, DocumentPublisher, GoogleConfig, HarvestError, Result,
};

use crate::http::{self, build_client};
use crate::wire::{self, BatchUpdateBody};

/// End index of a document with no body content.
const EMPTY_DOCUMENT_END: usize = 1;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedDocument {
    document_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentBody {
    #[serde(default)]
    body: Option<Body>,
}

#[derive(Debug, Default, Deserialize)]
struct Body {
    #[serde(default)]
    content: Vec<StructuralElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuralElement {
    #[serde(default)]
    end_index: Option<usize>,
}

/// Docs v1 REST client authenticated with the caller's bearer token.
pub struct DocsClient {
    http: Client,
    token: BearerToken,
    base_url: String,
    heading_style: String,
}

impl DocsClient {
    pub fn new(token: BearerToken, config: &GoogleConfig) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            token,
            base_url: config.docs_base_url.trim_end_matches('/').to_string(),
            heading_style: config.heading_style.clone(),
        })
    }

    fn documents_url(&self) -> String {
        format!("{}/v1/documents", self.base_url)
    }
}

#[async_trait]
impl DocumentPublisher for DocsClient {
    #[instrument(skip_all, fields(title = %title))]
    async fn create_document(&self, title: &str) -> Result<String> {
        let response = self
            .http
            .post(self.documents_url())
            .bearer_auth(self.token.secret())
            .json(&serde_json::json!({ "title": title }))
            .send()
            .await
            .map_err(|e| http::transport("document create", e))?;

        let created: CreatedDocument = http::check(response, "document create")
            .await?
            .json()
            .await
            .map_err(|e| HarvestError::Upstream(format!("unexpected create response: {e}")))?;

        info!(document_id = %created.document_id, "document created");
        Ok(created.document_id)
    }

    #[instrument(skip_all, fields(document_id = %document_id))]
    async fn end_index(&self, document_id: &str) -> Result<usize> {
        let document_id = http::resource_id("document", document_id)?;
        let response = self
            .http
            .get(format!("{}/{document_id}", self.documents_url()))
            .bearer_auth(self.token.secret())
            .send()
            .await
            .map_err(|e| http::transport("document read", e))?;

        let document: DocumentBody = http::check(response, "document read")
            .await?
            .json()
            .await
            .map_err(|e| HarvestError::Upstream(format!("unexpected document response: {e}")))?;

        let end = document
            .body
            .and_then(|body| body.content.last().and_then(|el| el.end_index))
            .unwrap_or(EMPTY_DOCUMENT_END);

        debug!(end_index = end, "document end index");
        Ok(end)
    }

    #[instrument(skip_all, fields(document_id = %document_id, ops = operations.len()))]
    async fn apply_batch(&self, document_id: &str, operations: &[BatchOperation]) -> Result<()> {
        if operations.is_empty() {
            debug!("empty batch, nothing to send");
            return Ok(());
        }

        let document_id = http::resource_id("document", document_id)?;
        let body = BatchUpdateBody {
            requests: wire::encode(operations, &self.heading_style),
        };

        let response = self
            .http
            .post(format!("{}/{document_id}:batchUpdate", self.documents_url()))
            .bearer_auth(self.token.secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| http::transport("batch update", e))?;

        http::check(response, "batch update").await?;
        info!("batch applied");
        Ok(())
    }

    fn document_link(&self, document_id: &str) -> String {
        format!("https://docs.google.com/document/d/{document_id}/edit")
    }
}

#[cfg(test)]
mod tests {
    use postharvest_shared::ImageSize;

    use super::*;

    fn client(server: &wiremock::MockServer) -> DocsClient {
        let config = GoogleConfig {
            docs_base_url: server.uri(),
            ..GoogleConfig::default()
        };
        let token = BearerToken::from_header(Some("Bearer test-token")).unwrap();
        DocsClient::new(token, &config).unwrap()
    }

    #[tokio::test]
    async fn creates_document_with_title() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/documents"))
            .and(wiremock::matchers::header("authorization", "Bearer test-token"))
            .and(wiremock::matchers::body_json(
                serde_json::json!({ "title": "Weekly digest" }),
            ))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "documentId": "doc-123" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server)
            .create_document("Weekly digest")
            .await
            .unwrap();
        assert_eq!(id, "doc-123");
    }

    #[tokio::test]
    async fn end_index_reads_last_body_element() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/v1/documents/doc-1"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "documentId": "doc-1",
                    "body": { "content": [
                        { "endIndex": 1, "sectionBreak": {} },
                        { "startIndex": 1, "endIndex": 42, "paragraph": {} }
                    ] }
                }),
            ))
            .mount(&server)
            .await;

        assert_eq!(client(&server).end_index("doc-1").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn end_index_of_empty_document_is_one() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/v1/documents/blank"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "documentId": "blank" })),
            )
            .mount(&server)
            .await;

        assert_eq!(client(&server).end_index("blank").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn batch_is_sent_in_order_as_one_request() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/documents/doc-1:batchUpdate"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "documentId": "doc-1", "replies": [] }),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let ops = vec![
            BatchOperation::InsertText {
                at: 1,
                text: "Hi\n\n".into(),
            },
            BatchOperation::ApplyHeadingStyle { range: 1..3 },
            BatchOperation::InsertImage {
                at: 5,
                asset_url: "https://drive.google.com/uc?id=x".into(),
                size: ImageSize::square(300),
            },
        ];
        client(&server).apply_batch("doc-1", &ops).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        let requests = body["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].get("insertText").is_some());
        assert!(requests[1].get("updateParagraphStyle").is_some());
        assert!(requests[2].get("insertInlineImage").is_some());
    }

    #[tokio::test]
    async fn empty_batch_is_not_sent() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::any())
            .respond_with(wiremock::ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        client(&server).apply_batch("doc-1", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn path_escaping_document_id_sends_nothing() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::any())
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let docs = client(&server);
        let ops = vec![BatchOperation::InsertText {
            at: 1,
            text: "x".into(),
        }];
        for id in ["../../drive/v3/files", "doc-1?fields=body", "a/b"] {
            let err = docs.end_index(id).await.unwrap_err();
            assert!(matches!(err, HarvestError::Validation { .. }), "{id}");
            let err = docs.apply_batch(id, &ops).await.unwrap_err();
            assert!(matches!(err, HarvestError::Validation { .. }), "{id}");
        }
    }

    #[tokio::test]
    async fn rejected_credential_is_an_auth_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(401).set_body_string("invalid token"))
            .mount(&server)
            .await;

        let err = client(&server).end_index("doc-1").await.unwrap_err();
        assert!(matches!(err, HarvestError::Auth { .. }));
    }

    #[tokio::test]
    async fn rejected_batch_is_upstream_fatal() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                wiremock::ResponseTemplate::new(400).set_body_string("Index 99 out of bounds"),
            )
            .mount(&server)
            .await;

        let ops = vec![BatchOperation::InsertText {
            at: 99,
            text: "x".into(),
        }];
        let err = client(&server).apply_batch("doc-1", &ops).await.unwrap_err();

        assert!(matches!(err, HarvestError::Upstream(_)));
        assert!(err.aborts_request());
        assert!(err.to_string().contains("out of bounds"));
    }

    #[test]
    fn document_link_format() {
        let token = BearerToken::from_header(Some("Bearer t")).unwrap();
        let docs = DocsClient::new(token, &GoogleConfig::default()).unwrap();
        assert_eq!(
            docs.document_link("abc"),
            "https://docs.google.com/document/d/abc/edit"
        );
    }
}
