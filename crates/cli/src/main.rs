//! fsreport - report settled filesystem changes to an HTTP endpoint
//!
//! Watches a directory tree, debounces writes, and POSTs each write, remove,
//! and move to the configured endpoint.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::Parser;
use fsreport_core::config::Config;
use fsreport_watcher::{Dispatcher, ExclusionMatcher, FileWatcher, HttpSink, WatcherConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fsreport")]
#[command(about = "Watch a directory tree and report settled changes over HTTP")]
#[command(version)]
struct Cli {
    /// Directory to watch
    #[arg(short = 'p', long = "path", value_name = "DIR")]
    path: Option<PathBuf>,

    /// Endpoint events are POSTed to
    #[arg(short = 's', long = "server", value_name = "URL")]
    server: Option<String>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let config = load_config(&cli)?;
    run(config).await
}

/// Initialize logging system
///
/// `RUST_LOG` takes precedence over the `--verbose` default.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "fsreport={level},fsreport_core={level},fsreport_watcher={level}"
        ))
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = Config::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(cli.path.clone(), cli.server.clone());
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(config: Config) -> Result<()> {
    let matcher = ExclusionMatcher::load(
        &config.exclusions.prefix_file,
        &config.exclusions.suffix_file,
        &config.exclusions.regex_file,
    )
    .context("Failed to load exclusion rules")?;

    let sink = HttpSink::new(
        config.delivery.endpoint.clone(),
        Duration::from_secs(config.delivery.timeout_secs),
        config.delivery.accept_invalid_certs,
    )?;
    let (dispatcher, _worker) = Dispatcher::spawn(
        Arc::new(sink),
        config.delivery.queue_capacity,
        config.delivery.max_concurrent,
    );

    let mut watcher = FileWatcher::new(
        WatcherConfig::from(&config),
        Arc::new(matcher),
        dispatcher,
    );
    watcher
        .watch(&config.watch.root)
        .await
        .with_context(|| format!("Failed to watch {}", config.watch.root.display()))?;

    info!(
        "fsreport {} watching {}, reporting to {}",
        fsreport_core::VERSION,
        config.watch.root.display(),
        config.delivery.endpoint
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");
    watcher.stop().await?;

    Ok(())
}
