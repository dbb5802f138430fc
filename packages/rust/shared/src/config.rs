//! Application configuration for postharvest.
//!
//! User config lives at `~/.postharvest/postharvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "postharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".postharvest";

// ---------------------------------------------------------------------------
// Config structs (matching postharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Headless browser behaviour.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Image candidate filtering.
    #[serde(default)]
    pub images: ImageFilterConfig,

    /// Text enrichment endpoint.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Google Docs / Drive endpoints and document layout.
    #[serde(default)]
    pub google: GoogleConfig,

    /// Orchestrator settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// HTTP request boundary.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Explicit Chromium executable; auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,

    /// Navigation budget per page. The Chromium driver clamps it to 30s,
    /// the longest its frame lifecycle wait allows.
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_ms: u64,

    /// How long to wait for the primary content region before falling back to the body.
    #[serde(default = "default_selector_timeout")]
    pub selector_timeout_ms: u64,

    /// Pause after first render, before the first height measurement.
    #[serde(default = "default_initial_settle")]
    pub initial_settle_ms: u64,

    /// Pause after each scroll-to-bottom.
    #[serde(default = "default_scroll_settle")]
    pub scroll_settle_ms: u64,

    /// Upper bound on scroll stabilization passes.
    #[serde(default = "default_max_scroll_passes")]
    pub max_scroll_passes: u32,

    /// CSS selector of the primary content region.
    #[serde(default = "default_content_selector")]
    pub content_selector: String,

    /// Small wheel scrolls before image collection, to trigger lazy images.
    #[serde(default = "default_image_nudges")]
    pub image_nudges: u32,

    #[serde(default = "default_image_nudge_px")]
    pub image_nudge_px: i64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            navigation_timeout_ms: default_navigation_timeout(),
            selector_timeout_ms: default_selector_timeout(),
            initial_settle_ms: default_initial_settle(),
            scroll_settle_ms: default_scroll_settle(),
            max_scroll_passes: default_max_scroll_passes(),
            content_selector: default_content_selector(),
            image_nudges: default_image_nudges(),
            image_nudge_px: default_image_nudge_px(),
        }
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

fn default_true() -> bool {
    true
}
fn default_navigation_timeout() -> u64 {
    60_000
}
fn default_selector_timeout() -> u64 {
    15_000
}
fn default_initial_settle() -> u64 {
    3_000
}
fn default_scroll_settle() -> u64 {
    1_000
}
fn default_max_scroll_passes() -> u32 {
    25
}
fn default_content_selector() -> String {
    "article".into()
}
fn default_image_nudges() -> u32 {
    3
}
fn default_image_nudge_px() -> i64 {
    500
}

/// `[images]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFilterConfig {
    /// Only images served from this host (or a subdomain) are kept.
    #[serde(default = "default_content_domain")]
    pub content_domain: String,

    /// Case-insensitive substrings that mark decorative images.
    #[serde(default = "default_blocked_keywords")]
    pub blocked_keywords: Vec<String>,
}

impl Default for ImageFilterConfig {
    fn default() -> Self {
        Self {
            content_domain: default_content_domain(),
            blocked_keywords: default_blocked_keywords(),
        }
    }
}

fn default_content_domain() -> String {
    "media.licdn.com".into()
}
fn default_blocked_keywords() -> Vec<String> {
    ["profile", "avatar", "banner", "emoji", "icon", "logo"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// OpenAI-compatible API root.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Raw text longer than this is truncated before prompting.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_llm_base_url(),
            model: default_model(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4".into()
}
fn default_max_input_chars() -> usize {
    12_000
}

/// `[google]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "default_docs_base_url")]
    pub docs_base_url: String,

    #[serde(default = "default_drive_base_url")]
    pub drive_base_url: String,

    #[serde(default = "default_drive_upload_url")]
    pub drive_upload_url: String,

    /// Title used when a new document is created.
    #[serde(default = "default_title")]
    pub default_title: String,

    /// Named paragraph style applied to post headings.
    #[serde(default = "default_heading_style")]
    pub heading_style: String,

    /// Width and height of embedded images, in points.
    #[serde(default = "default_image_size_pt")]
    pub image_size_pt: u32,

    /// Where downloaded images are staged; the system temp dir when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<String>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            docs_base_url: default_docs_base_url(),
            drive_base_url: default_drive_base_url(),
            drive_upload_url: default_drive_upload_url(),
            default_title: default_title(),
            heading_style: default_heading_style(),
            image_size_pt: default_image_size_pt(),
            staging_dir: None,
        }
    }
}

fn default_docs_base_url() -> String {
    "https://docs.googleapis.com".into()
}
fn default_drive_base_url() -> String {
    "https://www.googleapis.com".into()
}
fn default_drive_upload_url() -> String {
    "https://www.googleapis.com/upload".into()
}
fn default_title() -> String {
    "Scraped LinkedIn Posts".into()
}
fn default_heading_style() -> String {
    "HEADING_1".into()
}
fn default_image_size_pt() -> u32 {
    300
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// URLs in flight at once. 1 processes strictly one URL at a time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.postharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.postharvest/postharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the LLM API key from the env var named in the config.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(HarvestError::config(format!(
            "LLM API key not found. Set the {var_name} environment variable."
        ))),
    }
}
