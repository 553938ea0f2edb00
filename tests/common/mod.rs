#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use kindle_notes::catalog::BookCatalog;
use kindle_notes::config::{ArchivePolicy, IngestConfig};
use kindle_notes::ingest::{IngestionPipeline, PipelineContext};
use kindle_notes::mail::{Label, MailClient, MailError, Message, MessagePart, PartBody};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const LABEL_ID: &str = "Label_42";

/// Build a clippings export with the fixed eight-line preamble.
pub fn clippings_export(title: &str, author: &str, highlights: &[(&str, &str)]) -> String {
    let mut lines = vec![
        "Your Kindle Notes For:".to_string(),
        format!("\"{title}\",,,"),
        format!("\"{author}\",,,"),
        "\"Free Kindle instant preview:\",,,".to_string(),
        "\"https://amzn.eu/d/example\",,,".to_string(),
        "----------------------------------------------,,,".to_string(),
        String::new(),
        "\"Annotation Type\",\"Location\",\"Starred?\",\"Annotation\"".to_string(),
    ];
    for (location, text) in highlights {
        lines.push(format!(
            "\"Highlight (Yellow)\",\"Location {location}\",\"\",\"{text}\""
        ));
    }
    lines.push(String::new());
    lines.join("\r\n")
}

pub fn encode(text: &str) -> String {
    URL_SAFE_NO_PAD.encode(text)
}

pub fn config(catalog_path: &Path, archive_policy: ArchivePolicy) -> IngestConfig {
    IngestConfig {
        label: "Kindle".to_string(),
        discovery_interval: Duration::from_millis(20),
        parse_interval: Duration::from_millis(20),
        catalog_path: catalog_path.to_path_buf(),
        archive_policy,
        quarantine_dir: None,
    }
}

pub fn pipeline(mail: Arc<FakeMail>, config: IngestConfig) -> IngestionPipeline {
    let catalog = BookCatalog::load(&config.catalog_path).expect("catalog should load");
    IngestionPipeline::new(PipelineContext::new(config, mail, catalog))
}

pub fn catalog_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("books.json")
}

#[derive(Default)]
struct FakeState {
    labels: Vec<Label>,
    listed: Vec<String>,
    messages: HashMap<String, Message>,
    attachments: HashMap<String, String>,
    archived: Vec<String>,
    failing_attachments: HashSet<String>,
    failing_label_calls: usize,
    reinitializations: usize,
}

/// Scripted in-memory mailbox.
#[derive(Default)]
pub struct FakeMail {
    state: Mutex<FakeState>,
}

impl FakeMail {
    pub fn with_kindle_label() -> Arc<Self> {
        let mail = Self::default();
        mail.state.lock().unwrap().labels = vec![
            Label {
                id: "INBOX".to_string(),
                name: "INBOX".to_string(),
            },
            Label {
                id: LABEL_ID.to_string(),
                name: "kindle".to_string(),
            },
        ];
        Arc::new(mail)
    }

    pub fn without_labels() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver a message carrying `export` as a `text/csv` attachment.
    pub fn deliver_export(&self, message_id: &str, export: &str) {
        let attachment_id = format!("att-{message_id}");
        let message = Message {
            id: message_id.to_string(),
            payload: MessagePart {
                mime_type: "multipart/mixed".to_string(),
                parts: vec![
                    MessagePart {
                        mime_type: "text/plain".to_string(),
                        body: PartBody {
                            attachment_id: None,
                            data: Some(encode("see attachment")),
                        },
                        ..Default::default()
                    },
                    MessagePart {
                        mime_type: "text/csv".to_string(),
                        filename: Some("notes.csv".to_string()),
                        body: PartBody {
                            attachment_id: Some(attachment_id.clone()),
                            data: None,
                        },
                        ..Default::default()
                    },
                ],
                ..Default::default()
            },
        };

        let mut state = self.state.lock().unwrap();
        state.attachments.insert(attachment_id, encode(export));
        state.messages.insert(message_id.to_string(), message);
        state.listed.push(message_id.to_string());
    }

    /// Deliver a message without any CSV part.
    pub fn deliver_without_attachment(&self, message_id: &str) {
        let message = Message {
            id: message_id.to_string(),
            payload: MessagePart {
                mime_type: "text/plain".to_string(),
                body: PartBody {
                    attachment_id: None,
                    data: Some(encode("hello")),
                },
                ..Default::default()
            },
        };

        let mut state = self.state.lock().unwrap();
        state.messages.insert(message_id.to_string(), message);
        state.listed.push(message_id.to_string());
    }

    pub fn fail_attachment(&self, message_id: &str, failing: bool) {
        let mut state = self.state.lock().unwrap();
        if failing {
            state.failing_attachments.insert(message_id.to_string());
        } else {
            state.failing_attachments.remove(message_id);
        }
    }

    pub fn fail_next_label_calls(&self, count: usize) {
        self.state.lock().unwrap().failing_label_calls = count;
    }

    pub fn archived(&self) -> Vec<String> {
        self.state.lock().unwrap().archived.clone()
    }

    pub fn listed(&self) -> Vec<String> {
        self.state.lock().unwrap().listed.clone()
    }

    pub fn reinitializations(&self) -> usize {
        self.state.lock().unwrap().reinitializations
    }
}

fn service_error() -> MailError {
    MailError::Service {
        status: 503,
        body: "backend unavailable".to_string(),
    }
}

#[async_trait]
impl MailClient for FakeMail {
    async fn list_labels(&self) -> Result<Vec<Label>, MailError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_label_calls > 0 {
            state.failing_label_calls -= 1;
            return Err(service_error());
        }
        Ok(state.labels.clone())
    }

    async fn list_messages(&self, label_id: &str) -> Result<Vec<String>, MailError> {
        assert_eq!(label_id, LABEL_ID);
        Ok(self.state.lock().unwrap().listed.clone())
    }

    async fn get_message(&self, message_id: &str) -> Result<Message, MailError> {
        self.state
            .lock()
            .unwrap()
            .messages
            .get(message_id)
            .cloned()
            .ok_or(MailError::Service {
                status: 404,
                body: format!("no message {message_id}"),
            })
    }

    async fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<String, MailError> {
        let state = self.state.lock().unwrap();
        if state.failing_attachments.contains(message_id) {
            return Err(service_error());
        }
        state
            .attachments
            .get(attachment_id)
            .cloned()
            .ok_or_else(service_error)
    }

    async fn archive(&self, message_id: &str) -> Result<(), MailError> {
        let mut state = self.state.lock().unwrap();
        state.listed.retain(|id| id != message_id);
        state.archived.push(message_id.to_string());
        Ok(())
    }

    async fn reinitialize(&self) -> Result<(), MailError> {
        self.state.lock().unwrap().reinitializations += 1;
        Ok(())
    }
}
