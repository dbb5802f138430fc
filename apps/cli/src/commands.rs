//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use postharvest_core::{
    HarvestReport, HarvestRequest, LiveFactory, PipelineOptions, ProgressReporter,
    process_request,
};
use postharvest_shared::{
    AppConfig, BearerToken, DocumentTarget, HarvestError, init_config, load_config,
};

use crate::server::{self, AppState};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// postharvest — collect post text and images into a Google Doc.
#[derive(Parser)]
#[command(
    name = "postharvest",
    version,
    about = "Harvest LinkedIn posts (text, headings, insights, images) into a Google Doc.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Harvest one or more post URLs into a document.
    Process {
        /// Post URLs, in the order their sections should appear.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Append to this existing document.
        #[arg(long, conflicts_with = "create_new")]
        doc_id: Option<String>,

        /// Create a new document instead.
        #[arg(long)]
        create_new: bool,

        /// Title for a new document (defaults to the configured title).
        #[arg(long, requires = "create_new")]
        title: Option<String>,

        /// Google OAuth access token.
        #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// URLs processed at once (overrides config).
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Serve the HTTP API.
    Serve {
        /// Bind address (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides config).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "postharvest=info",
        1 => "postharvest=debug",
        _ => "postharvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Process {
            urls,
            doc_id,
            create_new,
            title,
            token,
            concurrency,
        } => {
            let target = if create_new {
                Some(DocumentTarget::CreateNew {
                    title: title.unwrap_or_default(),
                })
            } else {
                doc_id.map(DocumentTarget::Existing)
            };
            cmd_process(urls, target, token, concurrency).await
        }
        Command::Serve { host, port } => cmd_serve(host, port).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_process(
    urls: Vec<String>,
    target: Option<DocumentTarget>,
    token: Option<String>,
    concurrency: Option<usize>,
) -> Result<()> {
    let mut config = load_config()?;
    if let Some(n) = concurrency {
        config.pipeline.concurrency = n;
    }

    let request = build_request(urls, target, token, &config.google.default_title)?;

    let factory = LiveFactory::launch(&config).await?;
    let options = PipelineOptions::from(&config);
    let reporter = CliProgress::new();

    let outcome = process_request(&request, &factory, &options, &reporter).await;
    factory.shutdown().await;
    let report = outcome.map_err(|e| {
        reporter.spinner.finish_and_clear();
        eyre!(e)
    })?;

    println!();
    println!("  Posts inserted successfully!");
    println!("  Document: {}", report.document_link);
    println!("  Posts:    {}", report.posts_inserted);
    println!("  Ops:      {}", report.operations);
    if !report.failures.is_empty() {
        println!("  Skipped:  {}", report.failures.len());
        for failure in &report.failures {
            println!("    {}  ({})", failure.url, failure.reason);
        }
    }
    println!();

    Ok(())
}

/// Assemble the request and reject a bad token before anything is launched.
fn build_request(
    urls: Vec<String>,
    target: Option<DocumentTarget>,
    token: Option<String>,
    default_title: &str,
) -> std::result::Result<HarvestRequest, HarvestError> {
    let target = target.map(|t| match t {
        DocumentTarget::CreateNew { title } if title.is_empty() => DocumentTarget::CreateNew {
            title: default_title.to_string(),
        },
        other => other,
    });

    let authorization = token.map(|t| format!("Bearer {t}"));
    BearerToken::from_header(authorization.as_deref())?;

    Ok(HarvestRequest {
        urls,
        target,
        authorization,
    })
}

async fn cmd_serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config: AppConfig = load_config()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let factory = Arc::new(LiveFactory::launch(&config).await?);
    let state = AppState {
        factory: factory.clone(),
        options: Arc::new(PipelineOptions::from(&config)),
        default_title: config.google.default_title.clone(),
    };

    info!(host = %config.server.host, port = config.server.port, "starting server");
    let served = server::serve(state, &config.server.host, config.server.port).await;
    factory.shutdown().await;
    served
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress display
// ---------------------------------------------------------------------------

struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn url_started(&self, url: &str, index: usize, total: usize) {
        self.spinner
            .set_message(format!("Harvesting [{}/{total}] {url}", index + 1));
    }

    fn url_finished(&self, url: &str, ok: bool) {
        if !ok {
            self.spinner.println(format!("  skipped {url}"));
        }
    }

    fn done(&self, _report: &HarvestReport) {
        self.spinner.finish_and_clear();
    }
}
