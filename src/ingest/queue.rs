//! FIFO of fetched messages waiting to be parsed.
//!
//! Discovery pushes, the parse task pops. Besides the entries themselves the
//! queue remembers which message ids are queued, in flight or rejected so a
//! message still sitting under the label is not queued twice.

use crate::mail::Message;
use std::collections::{HashSet, VecDeque};
use tokio::sync::Mutex;

#[derive(Default)]
struct QueueState {
    entries: VecDeque<Message>,
    /// Queued or currently being processed
    tracked: HashSet<String>,
    /// Failed permanently; never queued again in this process
    rejected: HashSet<String>,
}

#[derive(Default)]
pub struct MailQueue {
    state: Mutex<QueueState>,
}

impl MailQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the message is queued, in flight or rejected.
    pub async fn is_known(&self, message_id: &str) -> bool {
        let state = self.state.lock().await;
        state.tracked.contains(message_id) || state.rejected.contains(message_id)
    }

    /// Queue a message. Returns false when it was already known.
    pub async fn enqueue(&self, message: Message) -> bool {
        let mut state = self.state.lock().await;
        if state.tracked.contains(&message.id) || state.rejected.contains(&message.id) {
            return false;
        }
        state.tracked.insert(message.id.clone());
        state.entries.push_back(message);
        true
    }

    /// Take the oldest entry. It stays known until released or rejected.
    pub async fn pop(&self) -> Option<Message> {
        self.state.lock().await.entries.pop_front()
    }

    /// Forget a message after success or a retryable failure.
    pub async fn release(&self, message_id: &str) {
        self.state.lock().await.tracked.remove(message_id);
    }

    /// Mark a message as permanently failed.
    pub async fn reject(&self, message_id: &str) {
        let mut state = self.state.lock().await;
        state.tracked.remove(message_id);
        state.rejected.insert(message_id.to_string());
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    pub async fn rejected_count(&self) -> usize {
        self.state.lock().await.rejected.len()
    }
}
