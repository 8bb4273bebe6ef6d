mod cli;
mod commands;
mod config;
mod engine;
mod errors;
mod llm_client;
mod models;
mod pipeline;
mod routes;
mod state;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;
use crate::config::Config;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("skillmap error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(data_dir) = cli.data_dir.clone() {
        config.data_dir = data_dir;
    }

    init_tracing(&config, cli.quiet, cli.verbose);
    info!(
        data_dir = %config.data_dir.display(),
        "Starting skillmap v{}",
        env!("CARGO_PKG_VERSION")
    );

    commands::dispatch(cli.command, &config).await
}

/// Logs go to stderr; stdout carries command output.
fn init_tracing(config: &Config, quiet: bool, verbose: bool) {
    let crate_filter = |level: &str| EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), level));
    let filter = if quiet {
        crate_filter("error")
    } else if verbose {
        crate_filter("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| crate_filter(&config.rust_log))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
