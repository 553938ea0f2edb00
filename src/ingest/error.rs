use crate::catalog::CatalogError;
use crate::clippings::ClippingsError;
use crate::mail::{MailError, PayloadError};
use thiserror::Error;

/// Errors that can end the processing of a single queued message.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no {mime_type} attachment found in message {message_id}")]
    AttachmentNotFound {
        message_id: String,
        mime_type: String,
    },
    #[error("there was no data for the attachment in message {message_id}")]
    EmptyAttachment { message_id: String },
    #[error("failed to decode attachment of message {message_id}: {source}")]
    Payload {
        message_id: String,
        #[source]
        source: PayloadError,
    },
    #[error("failed to parse export from message {message_id}: {source}")]
    Clippings {
        message_id: String,
        #[source]
        source: ClippingsError,
    },
    #[error("failed to persist catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Mail(#[from] MailError),
}

impl IngestError {
    /// True when the mail service itself failed and the client should be
    /// reinitialized.
    pub fn is_mail_failure(&self) -> bool {
        matches!(self, IngestError::Mail(err) if err.is_capability_failure())
    }

    /// True when trying the same message again later may succeed.
    ///
    /// Format problems with the message itself never fix themselves, so
    /// those are not retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestError::Catalog(_) | IngestError::Mail(_))
    }
}
