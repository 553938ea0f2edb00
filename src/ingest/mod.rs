//! Mailbox-to-catalog ingestion.
//!
//! # Architecture Overview
//!
//! Two periodic tasks share one FIFO queue:
//!
//! - **`discovery`**: resolves the label, lists its messages, fetches the new
//!   ones and queues them. With [`ArchivePolicy::OnDiscovery`] each message is
//!   trashed right after it is queued.
//! - **`processor`**: drains the queue. For each message it finds the
//!   `text/csv` part, fetches and decodes the attachment, parses the export
//!   and merges it into the catalog, which persists itself. With
//!   [`ArchivePolicy::OnCompletion`] the message is trashed only then.
//!
//! The tasks run independently so a slow parse never delays discovery. Each
//! task carries a busy flag so two passes of the same task never overlap,
//! and a pass always runs to completion once started.
//!
//! ## Failure handling
//!
//! - A failing message never stops the drain; the remaining entries are
//!   still processed.
//! - Format problems (no attachment, bad payload, unparseable export) drop
//!   the message for the rest of the process lifetime.
//! - Mail service and persistence failures release the message so the next
//!   discovery pass picks it up again. Mail service failures also
//!   reinitialize the client before the next discovery pass.
//!
//! [`ArchivePolicy::OnDiscovery`]: crate::config::ArchivePolicy::OnDiscovery
//! [`ArchivePolicy::OnCompletion`]: crate::config::ArchivePolicy::OnCompletion

pub mod discovery;
pub mod error;
pub mod processor;
pub mod queue;
pub mod stats;
pub mod status;

pub use discovery::DiscoveryTask;
pub use error::IngestError;
pub use processor::ParseTask;
pub use queue::MailQueue;
pub use stats::DrainStats;
pub use status::{PipelineState, PipelineStatus, StatusTracker};

use crate::catalog::{BookCatalog, CatalogChange};
use crate::config::IngestConfig;
use crate::mail::MailClient;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Everything the pipeline tasks share: configuration, the mail client, the
/// queue, the catalog and the status snapshot.
pub struct PipelineContext {
    pub config: IngestConfig,
    pub mail: Arc<dyn MailClient>,
    pub queue: MailQueue,
    pub catalog: Mutex<BookCatalog>,
    pub status: StatusTracker,
    changes: broadcast::Sender<CatalogChange>,
    reinit_requested: AtomicBool,
}

impl PipelineContext {
    pub fn new(config: IngestConfig, mail: Arc<dyn MailClient>, catalog: BookCatalog) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            config,
            mail,
            queue: MailQueue::new(),
            catalog: Mutex::new(catalog),
            status: StatusTracker::new(),
            changes,
            reinit_requested: AtomicBool::new(false),
        }
    }

    /// Receive every catalog change made by the pipeline from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogChange> {
        self.changes.subscribe()
    }

    /// Ask discovery to reinitialize the mail client before its next pass.
    pub fn request_reinit(&self) {
        self.reinit_requested.store(true, Ordering::Release);
    }

    pub(crate) fn take_reinit_request(&self) -> bool {
        self.reinit_requested.swap(false, Ordering::AcqRel)
    }
}

/// Prevents overlapping passes of the same task.
#[derive(Default)]
pub(crate) struct BusyFlag(AtomicBool);

pub(crate) struct BusyGuard<'a>(&'a AtomicBool);

impl BusyFlag {
    pub(crate) fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        match self
            .0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Some(BusyGuard(&self.0)),
            Err(_) => {
                log::debug!("previous pass still running, skipping tick");
                None
            }
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The discovery and parse tasks wired to one shared context.
pub struct IngestionPipeline {
    ctx: Arc<PipelineContext>,
    discovery: Arc<DiscoveryTask>,
    parser: Arc<ParseTask>,
}

impl IngestionPipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        let ctx = Arc::new(ctx);
        Self {
            discovery: Arc::new(DiscoveryTask::new(ctx.clone())),
            parser: Arc::new(ParseTask::new(ctx.clone())),
            ctx,
        }
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.ctx
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogChange> {
        self.ctx.subscribe()
    }

    pub async fn status(&self) -> PipelineStatus {
        self.ctx.status.snapshot().await
    }

    /// Run one discovery pass.
    pub async fn discover_once(&self) -> Option<usize> {
        self.discovery.tick().await
    }

    /// Run one parse pass.
    pub async fn drain_once(&self) -> Option<DrainStats> {
        self.parser.tick().await
    }

    /// One discovery pass followed by one parse pass.
    pub async fn run_once(&self) -> DrainStats {
        self.discover_once().await;
        self.drain_once().await.unwrap_or_default()
    }

    /// Start both periodic tasks on the tokio runtime.
    ///
    /// Cancelling `cancel` stops the tasks at their next tick boundary; a
    /// pass that is running finishes first.
    pub fn spawn(&self, cancel: CancellationToken) -> PipelineHandle {
        let discovery = self.discovery.clone();
        let discovery_handle = tokio::spawn(run_periodic(
            "discovery",
            self.ctx.config.discovery_interval,
            cancel.clone(),
            move || {
                let task = discovery.clone();
                async move {
                    task.tick().await;
                }
            },
        ));

        let parser = self.parser.clone();
        let parse_handle = tokio::spawn(run_periodic(
            "parsing",
            self.ctx.config.parse_interval,
            cancel.clone(),
            move || {
                let task = parser.clone();
                async move {
                    task.tick().await;
                }
            },
        ));

        PipelineHandle {
            cancel,
            discovery: discovery_handle,
            parsing: parse_handle,
        }
    }
}

async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    log::info!("{} task started (every {:?})", name, period);

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        tick().await;
    }

    log::info!("{} task stopped", name);
}

/// Handles to the running pipeline tasks.
pub struct PipelineHandle {
    cancel: CancellationToken,
    discovery: JoinHandle<()>,
    parsing: JoinHandle<()>,
}

impl PipelineHandle {
    /// Stop both tasks and wait for them to finish their current pass.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        if let Err(e) = self.discovery.await {
            log::error!("discovery task ended abnormally: {}", e);
        }
        if let Err(e) = self.parsing.await {
            log::error!("parsing task ended abnormally: {}", e);
        }
    }
}
