//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use siteprofiler_core::pipeline::{PipelineConfig, ProfileResult, build_profile};
use siteprofiler_crawler::EventSink;
use siteprofiler_shared::types::CrawlEvent;
use siteprofiler_shared::{AppConfig, CrawlConfig, init_config, load_config, validate_api_key};
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SiteProfiler — turn a business website into a structured profile.
#[derive(Parser)]
#[command(
    name = "siteprofiler",
    version,
    about = "Crawl a business website and produce a structured knowledge profile.",
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
    /// Crawl a website and build its business profile.
    Profile {
        /// Start URL of the business website.
        url: String,

        /// Maximum crawl depth from the start URL.
        #[arg(long)]
        depth: Option<u32>,

        /// Maximum number of pages to collect.
        #[arg(long)]
        max_pages: Option<usize>,

        /// Write the profile JSON to a file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Skip the LLM extraction pass (pattern-only profile).
        #[arg(long)]
        no_llm: bool,
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
        0 => "siteprofiler=info",
        1 => "siteprofiler=debug",
        _ => "siteprofiler=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Profile {
            url,
            depth,
            max_pages,
            out,
            no_llm,
        } => cmd_profile(&url, depth, max_pages, out.as_deref(), no_llm).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

async fn cmd_profile(
    url: &str,
    depth: Option<u32>,
    max_pages: Option<usize>,
    out: Option<&std::path::Path>,
    no_llm: bool,
) -> Result<()> {
    let config = load_config()?;
    if !no_llm {
        validate_api_key(&config)?;
    }

    let start_url = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;

    // File config, env overrides, then CLI flags, in increasing precedence.
    let mut crawl = CrawlConfig::from(&config).apply_env_overrides();
    if let Some(depth) = depth {
        crawl.max_depth = depth;
    }
    if let Some(max_pages) = max_pages {
        crawl.max_pages = max_pages;
    }

    let pipeline_config = PipelineConfig {
        start_url,
        crawl,
        openrouter: config.openrouter.clone(),
        use_llm: !no_llm,
    };

    info!(url, no_llm, "profiling website");

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let progress = tokio::spawn(drive_progress(rx));

    let result = build_profile(&pipeline_config, EventSink::new(tx)).await;
    // Every sender clone is gone once build_profile returns, which closes
    // the channel and lets the progress task finish.
    let _ = progress.await;

    let result = result?;
    print_summary(&result);

    let json = serde_json::to_string_pretty(&result)?;
    match out {
        Some(path) => {
            std::fs::write(path, &json)?;
            println!("  Profile written to {}", path.display());
            println!();
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn print_summary(result: &ProfileResult) {
    println!();
    println!("  Profile built!");
    println!("  Crawl:    {}", result.crawl_id);
    println!("  Pages:    {}", result.pages_crawled);
    println!("  Failures: {}", result.failures);
    println!("  Services: {}", result.profile.services.len());
    println!("  Time:     {:.1}s", result.duration_ms as f64 / 1000.0);
    println!();
}

// ---------------------------------------------------------------------------
// Progress spinner
// ---------------------------------------------------------------------------

/// Consume crawl events and render them as a spinner until the channel
/// closes.
async fn drive_progress(mut rx: tokio::sync::mpsc::UnboundedReceiver<CrawlEvent>) {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("static template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    while let Some(event) = rx.recv().await {
        match event {
            CrawlEvent::Start { url, .. } => {
                spinner.set_message(format!("Discovering {url}"));
            }
            CrawlEvent::Depth { depth, queued } => {
                spinner.set_message(format!("Depth {depth}: {queued} pages queued"));
            }
            CrawlEvent::Scraping {
                url,
                collected,
                budget,
            } => {
                spinner.set_message(format!("Rendering [{collected}/{budget}] {url}"));
            }
            CrawlEvent::PageDone { collected, .. } => {
                spinner.set_message(format!("Collected {collected} pages"));
            }
            CrawlEvent::PageError { url, reason } => {
                spinner.println(format!("  ! {url}: {reason}"));
            }
            CrawlEvent::ScrapeComplete {
                pages,
                failures,
                duration_ms,
            } => {
                spinner.set_message(format!(
                    "Crawl done: {pages} pages, {failures} failures in {:.1}s — extracting profile",
                    duration_ms as f64 / 1000.0
                ));
            }
        }
    }
    spinner.finish_and_clear();
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
