//! Discovery pass: find labelled mail and queue it.

use super::status::PipelineState;
use super::{BusyFlag, PipelineContext};
use crate::config::ArchivePolicy;
use crate::mail::{MailError, resolve_label_id};
use std::sync::Arc;

pub struct DiscoveryTask {
    ctx: Arc<PipelineContext>,
    busy: BusyFlag,
}

impl DiscoveryTask {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            busy: BusyFlag::default(),
        }
    }

    /// Run one discovery pass.
    ///
    /// Returns the number of messages queued, or `None` when a previous pass
    /// is still running. Failures are logged and end the pass; a mail
    /// service failure reinitializes the client before the next pass.
    pub async fn tick(&self) -> Option<usize> {
        let _guard = self.busy.try_acquire()?;
        let ctx = &self.ctx;

        if ctx.take_reinit_request() && !self.reinitialize().await {
            ctx.status.set_discovery_state(PipelineState::Idle).await;
            return Some(0);
        }

        let queued = match self.discover().await {
            Ok(queued) => {
                ctx.status.record_discovery(queued).await;
                queued
            }
            Err(e) => {
                ctx.status.set_discovery_state(PipelineState::Error).await;
                log::error!("discovery failed: {}", e);
                ctx.status.record_error(e.to_string()).await;

                if e.is_capability_failure() {
                    self.reinitialize().await;
                }
                0
            }
        };

        ctx.status.set_discovery_state(PipelineState::Idle).await;
        Some(queued)
    }

    async fn reinitialize(&self) -> bool {
        log::warn!("reinitializing mail client");
        match self.ctx.mail.reinitialize().await {
            Ok(()) => true,
            Err(e) => {
                log::error!("mail client reinitialization failed: {}", e);
                self.ctx.request_reinit();
                false
            }
        }
    }

    async fn discover(&self) -> Result<usize, MailError> {
        let ctx = &self.ctx;

        ctx.status.set_discovery_state(PipelineState::FetchingLabel).await;
        let label_id = resolve_label_id(ctx.mail.as_ref(), &ctx.config.label).await?;

        ctx.status.set_discovery_state(PipelineState::ListingMessages).await;
        let listed = ctx.mail.list_messages(&label_id).await?;

        if listed.is_empty() {
            ctx.status.set_discovery_state(PipelineState::NoNewMail).await;
            log::debug!("no new emails received under label {}", ctx.config.label);
            return Ok(0);
        }

        let mut fresh = Vec::with_capacity(listed.len());
        for id in listed {
            if !ctx.queue.is_known(&id).await {
                fresh.push(id);
            }
        }

        if fresh.is_empty() {
            ctx.status.set_discovery_state(PipelineState::NoNewMail).await;
            log::debug!("all messages under label {} are already queued", ctx.config.label);
            return Ok(0);
        }

        ctx.status.set_discovery_state(PipelineState::QueuingMessages).await;

        let total = fresh.len();
        let mut queued = 0;
        for (index, id) in fresh.iter().enumerate() {
            let message = ctx.mail.get_message(id).await?;
            if ctx.queue.enqueue(message).await {
                queued += 1;
                log::info!("adding emails to queue [ {} / {} ]", index + 1, total);
            }

            if ctx.config.archive_policy == ArchivePolicy::OnDiscovery {
                ctx.mail.archive(id).await?;
                log::info!("archived email [ {} / {} ]", index + 1, total);
            }
        }

        Ok(queued)
    }
}
