use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use multilookup_core::config::LoggingConfig;
use multilookup_core::{
    load_config, load_default_config, open_sources, validate_config, Config, LogFormat,
    Orchestrator, OutputSink, Resolver, RunReport, SystemResolver,
};

/// Resolve hostnames read from input files and write "<name>, <address>" lines.
#[derive(Debug, Parser)]
#[command(name = "multi-lookup", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "MULTILOOKUP_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// One or more input files followed by the output file
    #[arg(required = true, num_args = 2.., value_name = "PATH")]
    paths: Vec<PathBuf>,
}

impl Cli {
    /// Input paths and the output path. Clap guarantees at least two paths.
    fn split_paths(&self) -> (&[PathBuf], &Path) {
        match self.paths.split_last() {
            Some((output, inputs)) => (inputs, output.as_path()),
            None => (&[], Path::new("")),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_settings(cli.config.as_deref());
    let fallback = LoggingConfig::default();
    init_logging(config.as_ref().map_or(&fallback, |c| &c.logging));
    let config = config?;
    // Reject bad settings before the output file is truncated
    validate_config(&config).context("Configuration validation failed")?;

    let (inputs, output) = cli.split_paths();

    let opened = open_sources(inputs, config.input.on_unreadable)
        .context("Failed to open input files")?;
    if !opened.skipped.is_empty() {
        warn!(
            "Skipped {} of {} input files",
            opened.skipped.len(),
            inputs.len()
        );
    }

    let sink = OutputSink::create(output)
        .with_context(|| format!("Failed to create output file {:?}", output))?;

    let resolver: Arc<dyn Resolver> = Arc::new(SystemResolver::new(config.resolver.family));
    info!("Using resolver: {} ({})", resolver.name(), config.resolver.family);

    let orchestrator =
        Orchestrator::new(config, resolver).context("Failed to set up lookup run")?;
    let report = orchestrator
        .run(opened.sources, sink)
        .context("Lookup run failed")?;

    summarize(&report)
}

fn load_settings(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None => load_default_config().context("Failed to load default configuration"),
    }
}

/// Log to stderr; stdout is left alone. `RUST_LOG` overrides the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn summarize(report: &RunReport) -> Result<()> {
    info!(
        "Wrote {} records ({} without address) from {} sources",
        report.records_written(),
        report.lookups_failed,
        report.sources
    );

    if report.is_complete() {
        return Ok(());
    }

    warn!(
        "Run degraded: {} producers failed, {} resolvers failed, {} items abandoned, cancelled: {}",
        report.producers_failed,
        report.consumers_failed,
        report.items_abandoned + report.items_unwritten,
        report.cancelled
    );

    if report.records_written() == 0 && report.items_enqueued > 0 {
        bail!(
            "no records written for {} queued hostnames",
            report.items_enqueued
        );
    }
    Ok(())
}
