use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use kindle_notes::catalog::BookCatalog;
use kindle_notes::config::{ArchivePolicy, IngestConfig};
use kindle_notes::ingest::{IngestionPipeline, PipelineContext};
use kindle_notes::mail::{GmailClient, GmailConfig};

#[derive(Parser, Debug)]
#[command(
    name = "kindle-notes",
    about = "Collect Kindle highlights mailed as clippings exports into a JSON catalog"
)]
struct Args {
    /// Mail label the Kindle exports are filed under.
    #[arg(long)]
    label: Option<String>,

    /// Path of the JSON catalog file.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// When to trash processed mail (`on_discovery` or `on_completion`).
    #[arg(long)]
    archive_policy: Option<ArchivePolicy>,

    /// Milliseconds between discovery passes.
    #[arg(long)]
    discovery_interval_ms: Option<u64>,

    /// Milliseconds between parse passes.
    #[arg(long)]
    parse_interval_ms: Option<u64>,

    /// Directory receiving exports that fail to parse.
    #[arg(long)]
    quarantine_dir: Option<PathBuf>,

    /// Run a single discovery and parse pass, then exit.
    #[arg(long)]
    once: bool,
}

impl Args {
    fn apply(self, mut config: IngestConfig) -> IngestConfig {
        if let Some(label) = self.label {
            config.label = label;
        }
        if let Some(catalog) = self.catalog {
            config.catalog_path = catalog;
        }
        if let Some(policy) = self.archive_policy {
            config.archive_policy = policy;
        }
        if let Some(ms) = self.discovery_interval_ms.filter(|ms| *ms > 0) {
            config.discovery_interval = std::time::Duration::from_millis(ms);
        }
        if let Some(ms) = self.parse_interval_ms.filter(|ms| *ms > 0) {
            config.parse_interval = std::time::Duration::from_millis(ms);
        }
        if self.quarantine_dir.is_some() {
            config.quarantine_dir = self.quarantine_dir;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    kindle_notes::init_logger();

    let args = Args::parse();
    let once = args.once;
    let config = args.apply(IngestConfig::from_env());

    let catalog = BookCatalog::load(&config.catalog_path)?;
    log::info!(
        "starting kindle-notes: label `{}`, catalog {} ({} book(s)), archive {}",
        config.label,
        catalog.path().display(),
        catalog.len(),
        config.archive_policy
    );

    // Missing credentials are retried by every discovery pass
    let mail = GmailClient::new(GmailConfig::from_env())?;
    if !mail.is_connected().await {
        log::warn!("no gmail access token yet, discovery will keep retrying");
    }

    let pipeline = IngestionPipeline::new(PipelineContext::new(config, Arc::new(mail), catalog));

    if once {
        let stats = pipeline.run_once().await;
        println!(
            "processed {} export(s), {} failed, {} new book(s), {} new note(s)",
            stats.processed, stats.failed, stats.books_created, stats.notes_added
        );
        return Ok(());
    }

    let mut changes = pipeline.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    log::info!("{}", serde_json::to_string(&change).unwrap_or_default())
                }
                Err(RecvError::Lagged(missed)) => {
                    log::warn!("missed {} catalog change notification(s)", missed)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let cancel = CancellationToken::new();
    let handle = pipeline.spawn(cancel.clone());

    tokio::signal::ctrl_c().await?;
    log::info!("shutting down");
    handle.shutdown().await;

    Ok(())
}
