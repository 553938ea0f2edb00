//! Mailbox access.
//!
//! The ingestion pipeline only needs a handful of mailbox operations, which
//! are captured by the [`MailClient`] trait. [`gmail::GmailClient`] talks to
//! the Gmail REST API; tests drive the pipeline with scripted fakes.

pub mod decode;
pub mod gmail;

pub use decode::{PayloadError, decode_attachment};
pub use gmail::{GmailClient, GmailConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MIME type of the clippings attachment.
pub const CSV_MIME_TYPE: &str = "text/csv";

/// Errors from the mailbox.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("label `{label}` not found, labels found: {}", .available.join(", "))]
    LabelNotFound {
        label: String,
        available: Vec<String>,
    },
    #[error("mail HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mail service returned status {status}: {body}")]
    Service { status: u16, body: String },
    #[error("failed to decode mail response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("mail credentials unavailable: {0}")]
    Credentials(String),
}

impl MailError {
    /// True for failures of the mail service itself (auth, network, bad
    /// responses) as opposed to a missing label.
    pub fn is_capability_failure(&self) -> bool {
        !matches!(self, MailError::LabelNotFound { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Body of a message part: either a reference to a separately fetched
/// attachment or inline data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// A fully fetched message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub payload: MessagePart,
}

impl Message {
    /// First part (depth-first) whose MIME type matches, ignoring case.
    pub fn find_part(&self, mime_type: &str) -> Option<&MessagePart> {
        fn walk<'a>(part: &'a MessagePart, mime_type: &str) -> Option<&'a MessagePart> {
            if part.mime_type.eq_ignore_ascii_case(mime_type) {
                return Some(part);
            }
            part.parts.iter().find_map(|child| walk(child, mime_type))
        }

        walk(&self.payload, mime_type)
    }
}

/// Mailbox operations used by the ingestion pipeline.
#[async_trait]
pub trait MailClient: Send + Sync {
    async fn list_labels(&self) -> Result<Vec<Label>, MailError>;

    /// Ids of non-trashed messages under a label, in listing order.
    async fn list_messages(&self, label_id: &str) -> Result<Vec<String>, MailError>;

    async fn get_message(&self, message_id: &str) -> Result<Message, MailError>;

    /// Raw (URL-safe Base64) payload of an attachment.
    async fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<String, MailError>;

    async fn archive(&self, message_id: &str) -> Result<(), MailError>;

    /// Rebuild the connection after a failure.
    async fn reinitialize(&self) -> Result<(), MailError>;
}

/// Resolve a label name (case-insensitive) to its id.
pub async fn resolve_label_id(client: &dyn MailClient, label_name: &str) -> Result<String, MailError> {
    let labels = client.list_labels().await?;

    match labels
        .iter()
        .find(|label| label.name.eq_ignore_ascii_case(label_name))
    {
        Some(label) => {
            log::debug!("label id {} found for label name {}", label.id, label_name);
            Ok(label.id.clone())
        }
        None => Err(MailError::LabelNotFound {
            label: label_name.to_string(),
            available: labels.into_iter().map(|label| label.name).collect(),
        }),
    }
}
