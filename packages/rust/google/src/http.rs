//! HTTP plumbing shared by the Docs and Drive clients.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

use postharvest_shared::{HarvestError, Result, is_resource_id};

/// User-Agent string for Google API requests.
const USER_AGENT: &str = concat!("postharvest/", env!("CARGO_PKG_VERSION"));

/// Longest error body echoed back into an error message.
const MAX_ERROR_BODY: usize = 300;

pub(crate) fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))
}

/// Pass successful responses through; map rejections to the error taxonomy.
///
/// 401/403 mean the caller's credential was refused and surface as
/// [`HarvestError::Auth`]. Every other failure is [`HarvestError::Upstream`].
pub(crate) async fn check(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = truncate(body.trim(), MAX_ERROR_BODY);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HarvestError::auth(format!(
            "{action} rejected with {status}: {detail}"
        ))),
        _ => Err(HarvestError::Upstream(format!(
            "{action} failed with {status}: {detail}"
        ))),
    }
}

/// Reject ids that would escape their path segment.
pub(crate) fn resource_id<'a>(kind: &str, id: &'a str) -> Result<&'a str> {
    if is_resource_id(id) {
        Ok(id)
    } else {
        Err(HarvestError::validation(format!("invalid {kind} id {id:?}")))
    }
}

pub(crate) fn transport(action: &str, e: reqwest::Error) -> HarvestError {
    HarvestError::Upstream(format!("{action} request failed: {e}"))
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 50), "short");
    }
}
