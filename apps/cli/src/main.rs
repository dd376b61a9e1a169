//! SiteProfiler CLI — business-website profiling tool.
//!
//! Crawls a business website, renders pages through a headless browser,
//! and produces a merged business knowledge profile as JSON.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
