//! Real-time synchronization of certificate requests for the barangay
//! admin console.
//!
//! A [`Session`] keeps a [`TransactionStore`] in step with the backend over
//! a WebSocket event stream and routes staff actions through an
//! [`ActionCoordinator`], which validates every state change against the
//! request lifecycle before it reaches the network.

mod action;
mod auth;
mod client;
mod config;
mod coordinator;
mod dispatch;
mod error;
mod lifecycle;
mod live;
mod notice;
mod session;
mod store;
mod template;
mod transaction;
mod view;

pub use action::{ActionContext, ActionType, UnknownAction};
pub use auth::{ApiKey, DEFAULT_API_KEY_HEADER};
pub use client::{Backend, BackendConfig, Document, HttpBackend, NotificationRequest, StatusUpdate};
pub use config::{
    API_KEY_HEADER_VAR, API_KEY_VAR, API_URL_VAR, HTTP_TIMEOUT_VAR, SyncConfig, WS_URL_VAR,
};
pub use coordinator::{ActionCoordinator, ActionOutcome};
pub use dispatch::{
    Dispatched, EventDispatcher, EventFrame, NEW_TRANSACTION_EVENT, REGISTER_EVENT,
    REMOVE_TRANSACTION_EVENT, REQUEST_SNAPSHOT_EVENT, SNAPSHOT_EVENT, TRANSACTION_UPDATED_EVENT,
};
pub use error::{ActionError, BackendError, ConfigError, ConnectError, OpenError};
pub use lifecycle::{IllegalTransition, Step, TRANSITIONS, transition};
pub use live::{ConnectionConfig, ConnectionHandle, connect};
pub use notice::{
    AutoConfirm, ChannelNotifier, Confirm, ConfirmPrompt, NetworkStatus, Notice, Notifier,
    OnlineFlag, Severity, TracingNotifier,
};
pub use session::{Session, SessionBuilder};
pub use store::TransactionStore;
pub use template::{DocumentRequest, TemplateError, TemplateTable};
pub use transaction::{Status, Transaction, TransactionId, TransactionPatch};
pub use view::{TransactionFilter, TransactionStats};
