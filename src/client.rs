//! Backend REST calls used by the action coordinator.
//!
//! [`Backend`] is the seam the coordinator talks to; [`HttpBackend`] is the
//! `reqwest` implementation. Request bodies are plain serde types so the
//! wire format can be tested without a server.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::ActionType;
use crate::auth::ApiKey;
use crate::error::BackendError;
use crate::template::DocumentRequest;
use crate::transaction::{Status, Transaction, TransactionId};

/// Body of the state-change `PUT`.
///
/// `date_issued` is always present on the wire, `null` unless the request
/// completes the transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: Status,
    pub date_issued: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    /// Build the update for moving to `status`, stamping `now` on completion.
    pub fn to(status: Status, now: DateTime<Utc>) -> Self {
        let date_issued = (status == Status::Completed).then_some(now);
        Self {
            status,
            date_issued,
        }
    }
}

/// Body of the resident notification `POST`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub email: String,
    #[serde(rename = "requestId")]
    pub request_id: TransactionId,
    pub status: String,
    pub message: String,
}

impl NotificationRequest {
    /// The email sent to the resident after an approval or rejection.
    ///
    /// Returns `None` for actions that do not notify and for records without
    /// an email address. An approval tells the
    /// resident to expect the document, so it carries the `Ready To Claim`
    /// label.
    pub fn for_action(record: &Transaction, action: ActionType) -> Option<Self> {
        let certificate = &record.certificate_type;
        let (status, message) = match action {
            ActionType::Approve => (
                Status::ReadyToClaim,
                format!(
                    "We would like to inform you that your {certificate} has been approved. \
                     Please wait for further updates on your request."
                ),
            ),
            ActionType::Reject => (
                Status::Rejected,
                format!(
                    "We regret to inform you that your {certificate} request has been rejected. \
                     Please contact the admin for more information why your request has been \
                     rejected."
                ),
            ),
            _ => return None,
        };
        if record.resident_email.is_empty() {
            return None;
        }
        Some(Self {
            email: record.resident_email.clone(),
            request_id: record.transaction_id,
            status: status.label().to_string(),
            message,
        })
    }
}

/// A generated certificate file.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Backend operations the coordinator depends on.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Set a transaction's status.
    async fn update_status(
        &self,
        id: TransactionId,
        update: &StatusUpdate,
    ) -> Result<(), BackendError>;

    /// Send an email to the resident.
    async fn send_notification(&self, request: &NotificationRequest) -> Result<(), BackendError>;

    /// Produce a certificate document.
    async fn generate_document(&self, request: &DocumentRequest) -> Result<Document, BackendError>;
}

/// Endpoint layout and HTTP tuning for [`HttpBackend`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use barangay_sync::BackendConfig;
///
/// let config = BackendConfig {
///     base_url: "https://hall.example.gov".into(),
///     ..BackendConfig::default()
/// };
/// assert_eq!(config.request_timeout, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Scheme and host, without a trailing path.
    pub base_url: String,
    /// Prefix of the state-change path; the transaction id is appended.
    pub status_path: String,
    pub notification_path: String,
    pub generate_path: String,
    /// Applied to every request.
    ///
    /// Default: 30 seconds.
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            status_path: "/api/transaction/certificate_transaction".to_string(),
            notification_path: "/api/transaction/send-notification".to_string(),
            generate_path: "/api/generate-certificate".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// [`Backend`] over HTTP.
///
/// `Clone` is cheap: the inner `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    config: BackendConfig,
    api_key: ApiKey,
}

impl HttpBackend {
    /// Build a backend client.
    ///
    /// # Errors
    ///
    /// [`BackendError::Transport`] if the HTTP client cannot be initialized
    /// (for example, the TLS backend fails to load).
    pub fn new(config: BackendConfig, api_key: ApiKey) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key.current() {
            Some((name, value)) => request.header(name, value),
            None => request,
        }
    }
}

/// Turn a non-success response into [`BackendError::Status`].
async fn check(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn update_status(
        &self,
        id: TransactionId,
        update: &StatusUpdate,
    ) -> Result<(), BackendError> {
        let url = self.url(&format!("{}/{id}", self.config.status_path));
        tracing::debug!(transaction_id = id, status = %update.status, "PUT status");
        let response = self
            .authorized(self.http.put(url))
            .json(update)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn send_notification(&self, request: &NotificationRequest) -> Result<(), BackendError> {
        let url = self.url(&self.config.notification_path);
        tracing::debug!(transaction_id = request.request_id, "POST notification");
        let response = self
            .authorized(self.http.post(url))
            .json(request)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn generate_document(&self, request: &DocumentRequest) -> Result<Document, BackendError> {
        let url = self.url(&self.config.generate_path);
        tracing::debug!(template = %request.template_name, "POST generate certificate");
        let response = self
            .authorized(self.http.post(url))
            .json(&request.to_body())
            .send()
            .await?;
        let response = check(response).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        Ok(Document {
            file_name: request.file_name.clone(),
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}
