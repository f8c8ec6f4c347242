//! secretlens - JavaScript credential scanner
//!
//! Scans JavaScript for accidentally embedded credentials (private keys,
//! API tokens, passwords) and tracks findings per browsing tab. This binary
//! drives the engine over local files and remote script URLs; browser-side
//! observers feed the same ingestion path through the library modules.

mod app;
mod error;
mod filter;
mod ingest;
mod instrument;
mod scanner;
mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::app::Config;
use crate::ingest::{Ingestor, ScriptEvent, ScriptSource};
use crate::scanner::Scanner;
use crate::store::{JsonFileBackend, MemoryBackend, StorageBackend, TabStore};

/// JavaScript credential scanner
#[derive(Parser, Debug)]
#[command(name = "secretlens")]
#[command(author, version, about = "Scans JavaScript for embedded credentials", long_about = None)]
struct Cli {
    /// JavaScript files to scan
    files: Vec<PathBuf>,

    /// Remote script URLs to fetch and scan
    #[arg(short, long)]
    url: Vec<String>,

    /// Configuration file path
    #[arg(short, long, env = "SECRETLENS_CONFIG")]
    config: Option<String>,

    /// Tab id to record findings under
    #[arg(long, default_value = "1", env = "SECRETLENS_TAB")]
    tab: u32,

    /// Keep state in memory instead of the durable state file
    #[arg(long)]
    ephemeral: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "SECRETLENS_LOG_LEVEL")]
    log_level: String,

    /// Log file path (enables file logging)
    #[arg(long, env = "SECRETLENS_LOG_FILE")]
    log_file: Option<String>,

    /// Generate default configuration and exit
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.generate_config {
        print!("{}", Config::default_toml());
        return Ok(());
    }

    init_logging(&cli)?;

    let config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("Loading config {path}"))?,
        None => Config::default(),
    };

    if cli.files.is_empty() && cli.url.is_empty() {
        anyhow::bail!("Nothing to scan: pass at least one file or --url");
    }

    let scanner = Arc::new(
        Scanner::new()
            .with_max_scan_bytes(config.scanner.max_scan_bytes)
            .with_extra_ignores(&config.scanner.extra_ignore_patterns),
    );

    let backend: Arc<dyn StorageBackend> = if cli.ephemeral {
        Arc::new(MemoryBackend::new())
    } else {
        let path = config.state_file().context("Resolving state file path")?;
        tracing::info!(path = %path.display(), "Using durable tab state");
        Arc::new(JsonFileBackend::new(path))
    };
    let store = Arc::new(TabStore::new(backend));
    let ingestor = Ingestor::new(
        scanner,
        store.clone(),
        Duration::from_secs(config.fetch.timeout_secs),
    )
    .context("Building HTTP client")?;

    for path in &cli.files {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Reading {}", path.display()))?;
        ingestor
            .ingest(cli.tab, &content, &path.display().to_string())
            .await
            .with_context(|| format!("Scanning {}", path.display()))?;
    }

    for url in &cli.url {
        ingestor
            .handle_script_event(ScriptEvent {
                tab_id: Some(cli.tab),
                document_url: url.clone(),
                source: ScriptSource::External { url: url.clone() },
            })
            .await
            .with_context(|| format!("Scanning {url}"))?;
    }

    let record = store
        .read(cli.tab)
        .await
        .context("Reading tab state")?
        .unwrap_or_default();
    print_report(cli.tab, &record);

    if record.findings.iter().any(|f| filter::false_positive_reason(f).is_none()) {
        std::process::exit(1);
    }
    Ok(())
}

/// Initialize the tracing subscriber
fn init_logging(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("secretlens={}", cli.log_level)));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    if let Some(path) = &cli.log_file {
        let path = PathBuf::from(path);
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let name = path.file_name().unwrap_or_else(|| "secretlens.log".as_ref());
        let appender = tracing_appender::rolling::never(dir, name);
        let file_layer = fmt::layer().with_writer(appender).with_ansi(false);
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer.and_then(file_layer))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
    }
    Ok(())
}

/// Print a tab's accumulated findings and fetch errors
fn print_report(tab_id: u32, record: &scanner::TabRecord) {
    if record.findings.is_empty() && record.errors.is_empty() {
        println!("tab {tab_id}: no secrets found");
        return;
    }

    if !record.findings.is_empty() {
        println!("tab {tab_id}: {} finding(s)", record.findings.len());
        for finding in &record.findings {
            let annotation = match filter::false_positive_reason(finding) {
                Some(reason) => format!(" [likely false positive: {reason}]"),
                None => String::new(),
            };
            println!(
                "  [{}] {} in {}{}",
                finding.severity.name(),
                finding.secret_type.name(),
                finding.source_locator,
                annotation
            );
            println!("      {}", finding.matched_text.lines().next().unwrap_or(""));
        }
    }

    if !record.errors.is_empty() {
        println!("tab {tab_id}: {} script(s) could not be checked", record.errors.len());
        for error in &record.errors {
            println!("  {} ({})", error.script_url, error.error);
        }
    }
}
