use super::{Label, MailClient, MailError, Message};
use async_trait::async_trait;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;

/// Configuration for the Gmail REST client.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub base_url: String,
    pub user_id: String,
    pub token_path: PathBuf,
    pub request_timeout: Duration,
}

impl GmailConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("GMAIL_API_URL")
                .unwrap_or_else(|_| "https://gmail.googleapis.com/gmail/v1".to_string()),
            user_id: env::var("GMAIL_USER_ID").unwrap_or_else(|_| "me".to_string()),
            token_path: env::var("GMAIL_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./token.json")),
            request_timeout: env::var("GMAIL_TIMEOUT_MS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or_else(|| Duration::from_secs(30)),
        }
    }
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

struct Session {
    http: reqwest::Client,
    access_token: String,
}

/// Gmail-backed [`MailClient`].
///
/// Authenticates with a bearer token read from `GMAIL_ACCESS_TOKEN` or the
/// configured token file. Obtaining and refreshing that token is left to an
/// external tool.
///
/// A client without a usable token still constructs; every call then fails
/// with [`MailError::Credentials`] until [`MailClient::reinitialize`]
/// succeeds.
pub struct GmailClient {
    config: GmailConfig,
    session: RwLock<Option<Session>>,
}

#[derive(Debug, Deserialize)]
struct TokenFile {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct LabelsResponse {
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttachmentResponse {
    #[serde(default)]
    data: Option<String>,
}

impl GmailClient {
    pub fn new(config: GmailConfig) -> Result<Self, MailError> {
        let session = match Self::connect(&config) {
            Ok(session) => Some(session),
            Err(MailError::Credentials(reason)) => {
                log::warn!("gmail client not connected yet: {}", reason);
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            config,
            session: RwLock::new(session),
        })
    }

    pub async fn is_connected(&self) -> bool {
        self.session.read().await.is_some()
    }

    fn load_access_token(config: &GmailConfig) -> Result<String, MailError> {
        if let Ok(token) = env::var("GMAIL_ACCESS_TOKEN") {
            if !token.trim().is_empty() {
                return Ok(token.trim().to_string());
            }
        }

        let content = std::fs::read_to_string(&config.token_path).map_err(|e| {
            MailError::Credentials(format!(
                "failed to read token file {}: {}",
                config.token_path.display(),
                e
            ))
        })?;
        let token: TokenFile = serde_json::from_str(&content).map_err(|e| {
            MailError::Credentials(format!(
                "invalid token file {}: {}",
                config.token_path.display(),
                e
            ))
        })?;
        Ok(token.access_token)
    }

    fn connect(config: &GmailConfig) -> Result<Session, MailError> {
        let access_token = Self::load_access_token(config)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("kindle-notes/0.1")
            .build()?;

        log::info!("created gmail client for user {}", config.user_id);
        Ok(Session { http, access_token })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/users/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.user_id,
            path
        )
    }

    fn disconnected() -> MailError {
        MailError::Credentials("no access token loaded".to_string())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, MailError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(MailError::Service { status, body })
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MailError> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or_else(Self::disconnected)?;
        let response = session
            .http
            .get(self.endpoint(path))
            .bearer_auth(&session.access_token)
            .query(query)
            .send()
            .await?;

        let body = Self::check(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl MailClient for GmailClient {
    async fn list_labels(&self) -> Result<Vec<Label>, MailError> {
        let response: LabelsResponse = self.get_json("labels", &[]).await?;
        Ok(response.labels)
    }

    async fn list_messages(&self, label_id: &str) -> Result<Vec<String>, MailError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("labelIds", label_id), ("includeSpamTrash", "false")];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let page: MessagesResponse = self.get_json("messages", &query).await?;
            ids.extend(page.messages.into_iter().map(|m| m.id));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(ids)
    }

    async fn get_message(&self, message_id: &str) -> Result<Message, MailError> {
        self.get_json(&format!("messages/{message_id}"), &[]).await
    }

    async fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<String, MailError> {
        let response: AttachmentResponse = self
            .get_json(
                &format!("messages/{message_id}/attachments/{attachment_id}"),
                &[],
            )
            .await?;
        Ok(response.data.unwrap_or_default())
    }

    async fn archive(&self, message_id: &str) -> Result<(), MailError> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or_else(Self::disconnected)?;
        let response = session
            .http
            .post(self.endpoint(&format!("messages/{message_id}/trash")))
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn reinitialize(&self) -> Result<(), MailError> {
        let fresh = Self::connect(&self.config)?;
        *self.session.write().await = Some(fresh);
        log::info!("gmail client reinitialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token_path: PathBuf) -> GmailConfig {
        GmailConfig {
            base_url: "https://gmail.example/gmail/v1/".to_string(),
            user_id: "me".to_string(),
            token_path,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_endpoint_and_token_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let token_path = dir.path().join("token.json");
        std::fs::write(&token_path, r#"{"access_token":"abc","expires_in":3599}"#).unwrap();

        let cfg = config(token_path);
        // Skip when the environment supplies a token, it takes precedence
        if env::var("GMAIL_ACCESS_TOKEN").is_err() {
            assert_eq!(GmailClient::load_access_token(&cfg).unwrap(), "abc");
        }

        let client = GmailClient::new(cfg).unwrap();
        assert_eq!(
            client.endpoint("messages/1/trash"),
            "https://gmail.example/gmail/v1/users/me/messages/1/trash"
        );
    }

    #[tokio::test]
    async fn test_token_file_appearing_later() {
        if env::var("GMAIL_ACCESS_TOKEN").is_ok() {
            return;
        }
        let dir = tempfile::TempDir::new().unwrap();
        let token_path = dir.path().join("token.json");

        let client = GmailClient::new(config(token_path.clone())).unwrap();
        assert!(!client.is_connected().await);

        let err = client.list_labels().await.unwrap_err();
        assert!(matches!(err, MailError::Credentials(_)));
        assert!(err.is_capability_failure());
        assert!(matches!(
            client.archive("m1").await.unwrap_err(),
            MailError::Credentials(_)
        ));

        let err = client.reinitialize().await.unwrap_err();
        assert!(matches!(err, MailError::Credentials(_)));
        assert!(!client.is_connected().await);

        std::fs::write(&token_path, r#"{"access_token":"late"}"#).unwrap();
        client.reinitialize().await.unwrap();
        assert!(client.is_connected().await);
    }

    #[test]
    fn test_unreadable_token_file() {
        if env::var("GMAIL_ACCESS_TOKEN").is_ok() {
            return;
        }
        let dir = tempfile::TempDir::new().unwrap();
        let token_path = dir.path().join("token.json");
        std::fs::write(&token_path, "not json").unwrap();

        let err = GmailClient::load_access_token(&config(token_path)).unwrap_err();
        assert!(matches!(err, MailError::Credentials(_)));
    }

    #[test]
    fn test_messages_response_shape() {
        let page: MessagesResponse = serde_json::from_str(
            r#"{"messages":[{"id":"a","threadId":"a"},{"id":"b","threadId":"b"}],"nextPageToken":"n1","resultSizeEstimate":2}"#,
        )
        .unwrap();
        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.next_page_token.as_deref(), Some("n1"));

        let empty: MessagesResponse = serde_json::from_str(r#"{"resultSizeEstimate":0}"#).unwrap();
        assert!(empty.messages.is_empty());
    }
}
