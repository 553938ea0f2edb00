//! Parse pass: drain the queue into the catalog.

use super::error::IngestError;
use super::stats::DrainStats;
use super::status::PipelineState;
use super::{BusyFlag, PipelineContext};
use crate::catalog::CatalogChange;
use crate::clippings::parse_document;
use crate::config::ArchivePolicy;
use crate::mail::{CSV_MIME_TYPE, Message, decode_attachment};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

pub struct ParseTask {
    ctx: Arc<PipelineContext>,
    busy: BusyFlag,
}

impl ParseTask {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            busy: BusyFlag::default(),
        }
    }

    /// Run one parse pass, or return `None` when one is already running.
    pub async fn tick(&self) -> Option<DrainStats> {
        let _guard = self.busy.try_acquire()?;

        let stats = self.drain().await;
        if !stats.is_empty() {
            log::info!(
                "drain complete: {} ok, {} failed, {} new book(s), {} new note(s)",
                stats.processed,
                stats.failed,
                stats.books_created,
                stats.notes_added
            );
        }
        self.ctx.status.record_drain(&stats).await;

        Some(stats)
    }

    /// Process every queued message in FIFO order.
    ///
    /// A failing message is logged and skipped; the remaining entries are
    /// still processed.
    async fn drain(&self) -> DrainStats {
        let ctx = &self.ctx;
        let mut stats = DrainStats::default();

        while let Some(message) = ctx.queue.pop().await {
            ctx.status.set_parse_state(PipelineState::ParsingQueue).await;

            match self.process(&message).await {
                Ok(change) => {
                    stats.record_change(&change);
                    self.complete(&message.id).await;
                    // Only fails when nobody is subscribed
                    ctx.changes.send(change).ok();
                }
                Err(e) => {
                    stats.record_failure();
                    self.fail(&message.id, e).await;
                }
            }
        }

        ctx.status.set_parse_state(PipelineState::Idle).await;
        stats
    }

    async fn complete(&self, message_id: &str) {
        let ctx = &self.ctx;

        if ctx.config.archive_policy == ArchivePolicy::OnCompletion {
            match ctx.mail.archive(message_id).await {
                Ok(()) => log::info!("archived processed email {}", message_id),
                Err(e) => {
                    // Left under the label; reprocessing it adds nothing
                    log::error!("failed to archive processed email {}: {}", message_id, e);
                    if e.is_capability_failure() {
                        ctx.request_reinit();
                    }
                }
            }
        }

        ctx.queue.release(message_id).await;
    }

    async fn fail(&self, message_id: &str, error: IngestError) {
        let ctx = &self.ctx;

        if error.is_mail_failure() {
            log::error!("email {}: {}", message_id, error);
            ctx.request_reinit();
        } else if error.is_retryable() {
            log::error!("email {}: {}", message_id, error);
        }
        ctx.status.record_error(error.to_string()).await;

        let can_retry =
            error.is_retryable() && ctx.config.archive_policy == ArchivePolicy::OnCompletion;
        if can_retry {
            ctx.queue.release(message_id).await;
            return;
        }

        if error.is_retryable() {
            log::error!(
                "email {} was already archived on discovery, its export is lost",
                message_id
            );
        }
        ctx.queue.reject(message_id).await;
        log::warn!(
            "email {} dropped ({} dropped so far): {}",
            message_id,
            ctx.queue.rejected_count().await,
            error
        );
    }

    /// Fetch, decode, parse and merge the export attached to one message.
    pub async fn process(&self, message: &Message) -> Result<CatalogChange, IngestError> {
        let ctx = &self.ctx;
        let message_id = message.id.clone();

        let part = message
            .find_part(CSV_MIME_TYPE)
            .ok_or_else(|| IngestError::AttachmentNotFound {
                message_id: message_id.clone(),
                mime_type: CSV_MIME_TYPE.to_string(),
            })?;

        let data = match (&part.body.attachment_id, &part.body.data) {
            (Some(attachment_id), _) => ctx.mail.get_attachment(&message_id, attachment_id).await?,
            (None, Some(data)) => data.clone(),
            (None, None) => String::new(),
        };

        if data.trim().is_empty() {
            return Err(IngestError::EmptyAttachment { message_id });
        }

        let text = decode_attachment(&data).map_err(|source| IngestError::Payload {
            message_id: message_id.clone(),
            source,
        })?;

        let document = match parse_document(&text) {
            Ok(document) => document,
            Err(source) => {
                self.quarantine(&message_id, &text);
                return Err(IngestError::Clippings { message_id, source });
            }
        };

        log::info!(
            "email {}: `{}` by {} with {} highlight(s)",
            message_id,
            document.title,
            document.author,
            document.highlights.len()
        );

        let change = ctx.catalog.lock().await.upsert(&document)?;
        Ok(change)
    }

    /// Keep a copy of an export the parser could not handle.
    fn quarantine(&self, message_id: &str, text: &str) {
        let Some(dir) = self.ctx.config.quarantine_dir.as_ref() else {
            return;
        };

        let path = quarantine_path(dir, message_id);
        let result = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, text));

        match result {
            Ok(()) => log::warn!("saved unparseable export to {}", path.display()),
            Err(e) => log::warn!(
                "failed to save unparseable export to {}: {}",
                path.display(),
                e
            ),
        }
    }
}

fn quarantine_path(dir: &std::path::Path, message_id: &str) -> PathBuf {
    let safe_id: String = message_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let timestamp = Utc::now().format("%Y%m%d%H%M%S%3f");
    dir.join(format!("{safe_id}-{timestamp}.csv"))
}
