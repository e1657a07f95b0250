//! Crate-level error types for actions, backend calls, and the event stream.

use crate::lifecycle::IllegalTransition;
use crate::template::TemplateError;
use crate::transaction::TransactionId;

/// Error returned by a backend HTTP call.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend answered with a non-success status.
    ///
    /// Carries the response body text, which the backend uses for its
    /// error message.
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never completed (DNS, TLS, connection reset, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Error returned when a staff action is refused or fails.
///
/// Every variant except [`RequestFailed`](ActionError::RequestFailed) is
/// raised before any network call is made.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// No record with this id is in the live store.
    #[error("transaction {0} not found")]
    NotFound(TransactionId),

    /// The network-availability signal reports offline.
    #[error("offline: action not sent")]
    Offline,

    /// The action is not legal from the record's current status.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    /// Another action on the same record has not resolved yet.
    #[error("an action on transaction {0} is already in progress")]
    AlreadyInProgress(TransactionId),

    /// The record's details cannot feed a document template.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The backend rejected or failed the state-change request.
    ///
    /// The store is left unchanged; retrying is up to the user.
    #[error("state change request failed: {0}")]
    RequestFailed(#[source] BackendError),
}

/// Error returned when opening the event stream fails.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The WebSocket handshake failed.
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),

    /// The auth header name or value is not a valid HTTP header.
    #[error("invalid auth header: {0}")]
    InvalidHeader(String),

    /// An outbound frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// The socket failed after the handshake.
    #[error("websocket send failed: {0}")]
    Send(#[source] tokio_tungstenite::tungstenite::Error),
}

/// Error returned by [`SessionBuilder::open`](crate::SessionBuilder::open).
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The HTTP client could not be built.
    #[error("backend client setup failed: {0}")]
    Backend(#[from] BackendError),
}

/// Error returned when configuration from the environment is invalid.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
