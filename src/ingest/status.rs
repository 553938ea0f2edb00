use super::stats::DrainStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Idle,
    FetchingLabel,
    ListingMessages,
    NoNewMail,
    QueuingMessages,
    ParsingQueue,
    Error,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::FetchingLabel => "fetching_label",
            PipelineState::ListingMessages => "listing_messages",
            PipelineState::NoNewMail => "no_new_mail",
            PipelineState::QueuingMessages => "queuing_messages",
            PipelineState::ParsingQueue => "parsing_queue",
            PipelineState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Snapshot of the pipeline for observers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub discovery_state: PipelineState,
    pub parse_state: PipelineState,
    pub last_discovery_at: Option<DateTime<Utc>>,
    pub last_parse_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub messages_discovered: usize,
    /// Sum of every drain since start
    pub totals: DrainStats,
}

/// Shared, lock-protected [`PipelineStatus`].
#[derive(Default)]
pub struct StatusTracker {
    state: Mutex<PipelineStatus>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> PipelineStatus {
        self.state.lock().await.clone()
    }

    pub async fn set_discovery_state(&self, next: PipelineState) {
        let mut status = self.state.lock().await;
        if status.discovery_state != next {
            log::trace!("discovery: {} -> {}", status.discovery_state, next);
            status.discovery_state = next;
        }
    }

    pub async fn set_parse_state(&self, next: PipelineState) {
        let mut status = self.state.lock().await;
        if status.parse_state != next {
            log::trace!("parsing: {} -> {}", status.parse_state, next);
            status.parse_state = next;
        }
    }

    pub async fn record_discovery(&self, discovered: usize) {
        let mut status = self.state.lock().await;
        status.last_discovery_at = Some(Utc::now());
        status.messages_discovered += discovered;
    }

    pub async fn record_drain(&self, stats: &DrainStats) {
        let mut status = self.state.lock().await;
        status.last_parse_at = Some(Utc::now());
        status.totals.merge(stats);
    }

    pub async fn record_error(&self, error: String) {
        self.state.lock().await.last_error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracker_accumulates() {
        let tracker = StatusTracker::new();
        tracker.set_discovery_state(PipelineState::ListingMessages).await;
        tracker.record_discovery(2).await;
        tracker
            .record_drain(&DrainStats {
                processed: 1,
                failed: 1,
                books_created: 1,
                notes_added: 4,
            })
            .await;
        tracker
            .record_drain(&DrainStats {
                processed: 2,
                ..Default::default()
            })
            .await;
        tracker.record_error("boom".to_string()).await;

        let status = tracker.snapshot().await;
        assert_eq!(status.discovery_state, PipelineState::ListingMessages);
        assert_eq!(status.parse_state, PipelineState::Idle);
        assert_eq!(status.messages_discovered, 2);
        assert_eq!(
            status.totals,
            DrainStats {
                processed: 3,
                failed: 1,
                books_created: 1,
                notes_added: 4,
            }
        );
        assert!(status.last_discovery_at.is_some());
        assert_eq!(status.last_error.as_deref(), Some("boom"));
    }
}
