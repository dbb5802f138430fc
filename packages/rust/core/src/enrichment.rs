//! LLM text enrichment.
//!
//! [`LlmEnricher`] implements [`TextEnricher`] against an OpenAI-compatible
//! `/chat/completions` endpoint: one call to clean the scraped text into the
//! post body, then one for the heading and one for the insight lines.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use postharvest_shared::{EnrichedText, HarvestError, LlmConfig, Result, TextEnricher};

/// Engagement metadata the cleaner is told to ignore.
const UNWANTED_METADATA: &[&str] = &[
    "followers",
    "reactions",
    "comments",
    "reply",
    "student at",
    "like",
    "1h",
    "2h",
    "3h",
    "minutes ago",
    "contact us",
];

/// Leading list markers: `-`, `*`, `•`, `1.`, `1)`.
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s*").expect("valid list marker regex")
});

/// Leading `Title:` / `Heading:` label.
static HEADING_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:title|heading)\s*:\s*").expect("valid heading label regex")
});

// ---------------------------------------------------------------------------
// Chat completion wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

/// One prompt per enrichment step.
#[derive(Debug, Clone, Copy)]
enum Step {
    Clean,
    Heading,
    Insights,
}

impl Step {
    fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Heading => "heading",
            Self::Insights => "insights",
        }
    }

    fn temperature(self) -> f32 {
        match self {
            Self::Clean => 0.3,
            Self::Heading => 0.4,
            Self::Insights => 0.5,
        }
    }

    fn prompt(self, text: &str) -> String {
        match self {
            Self::Clean => format!(
                "You are a content cleaner. Given the following LinkedIn post content, \
                 return only the main body of the post. Leave out comments on the post \
                 and profile bios. Ignore these keywords and metadata: {}.\n\n\
                 --- Raw Text ---\n{text}\n\n--- Cleaned Content ---\n",
                UNWANTED_METADATA.join(", ")
            ),
            Self::Heading => format!(
                "You generate engaging, professional titles for LinkedIn posts. \
                 Based on the following post content, write one short and relevant heading.\n\n\
                 --- Post Content ---\n{text}\n\n--- Title ---\n"
            ),
            Self::Insights => format!(
                "Analyze the following LinkedIn post and extract its key takeaways. \
                 Respond with 3 to 5 clear, concise one-line insights, one per line, \
                 without repeating the post verbatim.\n\n\
                 --- LinkedIn Post ---\n{text}\n\n--- Insights ---\n"
            ),
        }
    }
}

/// OpenAI-compatible chat completion enricher.
pub struct LlmEnricher {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_input_chars: usize,
}

impl LlmEnricher {
    pub fn new(api_key: impl Into<String>, config: &LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_input_chars: config.max_input_chars,
        })
    }

    async fn complete(&self, step: Step, text: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: step.prompt(text),
            }],
            temperature: step.temperature(),
        };

        debug!(step = step.as_str(), model = %self.model, "chat completion request");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| HarvestError::Enrichment(format!("{} request failed: {e}", step.as_str())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarvestError::Enrichment(format!(
                "{} failed with {status}: {}",
                step.as_str(),
                truncate_chars(body.trim(), 300)
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            HarvestError::Enrichment(format!("{} returned an unexpected body: {e}", step.as_str()))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| HarvestError::Enrichment(format!("{} returned no content", step.as_str())))
    }
}

#[async_trait]
impl TextEnricher for LlmEnricher {
    #[instrument(skip_all, fields(chars = raw_text.chars().count()))]
    async fn enrich(&self, raw_text: &str) -> Result<EnrichedText> {
        let input = truncate_chars(raw_text, self.max_input_chars);

        let body = self.complete(Step::Clean, input).await?;
        let heading = normalize_heading(&self.complete(Step::Heading, &body).await?);
        let insights = parse_insights(&self.complete(Step::Insights, &body).await?);

        debug!(heading = %heading, insights = insights.len(), "post enriched");

        Ok(EnrichedText {
            body,
            heading,
            insights,
        })
    }
}

// ---------------------------------------------------------------------------
// Response normalisation
// ---------------------------------------------------------------------------

/// First non-empty line, without a `Title:` label or surrounding quotes.
pub fn normalize_heading(raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    let line = HEADING_LABEL.replace(line, "");
    line.trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c.is_whitespace())
        .to_string()
}

/// One insight per non-empty line, list markers removed.
pub fn parse_insights(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|l| LIST_MARKER.replace(l, "").trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Truncate to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
