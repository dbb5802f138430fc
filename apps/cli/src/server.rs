//! HTTP request boundary: `GET /ping` and `POST /process`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use color_eyre::eyre::Result;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use postharvest_core::{
    CollaboratorFactory, HarvestRequest, PipelineOptions, SilentProgress, process_request,
};
use postharvest_shared::{DocumentTarget, HarvestError};

#[derive(Clone)]
pub(crate) struct AppState {
    pub factory: Arc<dyn CollaboratorFactory>,
    pub options: Arc<PipelineOptions>,
    /// Title for documents created without an explicit one.
    pub default_title: String,
}

/// `POST /process` body. `linkedin_urls` is accepted as an alias of `urls`.
#[derive(Debug, Deserialize)]
pub(crate) struct ProcessBody {
    #[serde(default, alias = "linkedin_urls")]
    urls: Vec<String>,
    #[serde(default)]
    google_doc_id: Option<String>,
    #[serde(default)]
    create_new: bool,
    #[serde(default)]
    title: Option<String>,
}

impl ProcessBody {
    fn target(&self, default_title: &str) -> Option<DocumentTarget> {
        if self.create_new {
            Some(DocumentTarget::CreateNew {
                title: self
                    .title
                    .clone()
                    .unwrap_or_else(|| default_title.to_string()),
            })
        } else {
            self.google_doc_id.clone().map(DocumentTarget::Existing)
        }
    }
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/process", post(process))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub(crate) async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn process(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ProcessBody>,
) -> Response {
    let request = HarvestRequest {
        target: body.target(&state.default_title),
        urls: body.urls,
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    };

    match process_request(
        &request,
        state.factory.as_ref(),
        &state.options,
        &SilentProgress,
    )
    .await
    {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "message": "Posts inserted successfully",
                "doc_link": report.document_link,
                "posts_inserted": report.posts_inserted,
                "failures": report.failures,
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(e: &HarvestError) -> Response {
    let status = match e {
        HarvestError::Auth { .. } => StatusCode::UNAUTHORIZED,
        HarvestError::Validation { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(status = status.as_u16(), error = %e, "request failed");

    (
        status,
        Json(json!({ "status": "error", "message": e.to_string() })),
    )
        .into_response()
}
