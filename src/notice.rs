//! Seams to the surrounding UI: notices, confirmation prompts, and the
//! network-availability signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::action::ActionType;
use crate::transaction::TransactionId;

/// How a notice should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Blocking dialog the user must acknowledge.
    Dialog,
    /// Transient toast.
    Toast,
}

/// A user-visible message raised by the sync core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The event stream dropped unexpectedly.
    ConnectionLost,
    /// An action was attempted without network access.
    Offline,
    /// The action is not valid for the record's current status.
    IllegalTransition {
        transaction_id: TransactionId,
        message: String,
    },
    /// The backend rejected or failed the state change.
    RequestFailed {
        transaction_id: TransactionId,
        message: String,
    },
    /// The status changed but the document could not be produced.
    DocumentFailed {
        transaction_id: TransactionId,
        message: String,
    },
    /// The action went through.
    Succeeded {
        transaction_id: TransactionId,
        action: ActionType,
    },
}

impl Notice {
    pub fn severity(&self) -> Severity {
        match self {
            Notice::Offline | Notice::Succeeded { .. } => Severity::Toast,
            _ => Severity::Dialog,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Notice::ConnectionLost => "Network Issue",
            Notice::Offline => "No Internet",
            Notice::IllegalTransition { .. } => "Notice",
            Notice::RequestFailed { .. } | Notice::DocumentFailed { .. } => "Error!",
            Notice::Succeeded { .. } => "Success!",
        }
    }

    pub fn text(&self) -> String {
        match self {
            Notice::ConnectionLost => "Connection lost. Please check your network.".to_string(),
            Notice::Offline => {
                "You are currently offline. Please check your connection.".to_string()
            }
            Notice::IllegalTransition { message, .. } => message.clone(),
            Notice::RequestFailed { message, .. } => {
                format!("Failed to update request. Please try again. ({message})")
            }
            Notice::DocumentFailed { message, .. } => {
                format!("Failed to generate the certificate. ({message})")
            }
            Notice::Succeeded { action, .. } => format!("Request has been updated: {action}."),
        }
    }
}

/// Receives notices for display.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log instead of a UI.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.severity() {
            Severity::Dialog => tracing::warn!(title = notice.title(), "{}", notice.text()),
            Severity::Toast => tracing::info!(title = notice.title(), "{}", notice.text()),
        }
    }
}

/// Forwards notices over an unbounded channel to whoever renders them.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver its notices arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        // A dropped receiver means the view is gone; nothing to show.
        let _ = self.tx.send(notice);
    }
}

/// A yes/no question put to the user before an action is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub transaction_id: TransactionId,
    pub action: ActionType,
    /// Set when the prompt is for re-issuing an existing document.
    pub regenerate: bool,
}

impl ConfirmPrompt {
    pub fn text(&self) -> String {
        if self.regenerate {
            "The document has already been generated. Generate it again?".to_string()
        } else {
            format!("Are you sure you want to {} this request?", self.action.verb())
        }
    }
}

/// Asks the user to confirm an action.
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Returns `true` if the user agreed.
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

/// Confirms every prompt. For headless operation and scripted use.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, _prompt: &ConfirmPrompt) -> bool {
        true
    }
}

/// Synchronous online/offline check.
pub trait NetworkStatus: Send + Sync {
    fn is_online(&self) -> bool;
}

/// A shared flag the host flips when connectivity changes.
///
/// `Clone` is cheap: clones observe the same flag.
#[derive(Debug, Clone)]
pub struct OnlineFlag {
    online: Arc<AtomicBool>,
}

impl OnlineFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }
}

impl Default for OnlineFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkStatus for OnlineFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}
