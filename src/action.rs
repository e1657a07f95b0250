//! Staff actions and the context that travels with them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transaction::Status;

/// A state change a staff member can request on a certificate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    /// `Pending -> Approved`.
    Approve,
    /// `Pending -> Rejected`.
    Reject,
    /// `Approved -> On Process`, producing the certificate document.
    /// On a record already `On Process` this regenerates the document.
    Generate,
    /// `On Process -> Ready To Claim`.
    MarkReady,
    /// `Ready To Claim -> Completed`.
    Complete,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::Approve,
        ActionType::Reject,
        ActionType::Generate,
        ActionType::MarkReady,
        ActionType::Complete,
    ];

    /// The status this action asks the backend to set.
    pub fn target_status(self) -> Status {
        match self {
            ActionType::Approve => Status::Approved,
            ActionType::Reject => Status::Rejected,
            ActionType::Generate => Status::OnProcess,
            ActionType::MarkReady => Status::ReadyToClaim,
            ActionType::Complete => Status::Completed,
        }
    }

    /// Verb used in confirmation prompts and success notices.
    pub fn verb(self) -> &'static str {
        match self {
            ActionType::Approve => "approve",
            ActionType::Reject => "reject",
            ActionType::Generate => "generate the certificate for",
            ActionType::MarkReady => "mark as ready to claim",
            ActionType::Complete => "complete",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionType::Approve => "Approve",
            ActionType::Reject => "Reject",
            ActionType::Generate => "Generate",
            ActionType::MarkReady => "Ready To Claim",
            ActionType::Complete => "Complete",
        };
        f.write_str(label)
    }
}

/// Returned when an action label is not part of the console vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0:?}")]
pub struct UnknownAction(pub String);

impl FromStr for ActionType {
    type Err = UnknownAction;

    /// Parses the labels the console buttons send.
    ///
    /// Rejection has several spellings (`Reject`, `Rejected`, `Cancelled`,
    /// `cancel`); all of them map to [`ActionType::Reject`], whose terminal
    /// status is always [`Status::Rejected`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "approve" | "approved" => Ok(ActionType::Approve),
            "reject" | "rejected" | "cancel" | "cancelled" | "canceled" => Ok(ActionType::Reject),
            "generate" | "on process" => Ok(ActionType::Generate),
            "ready to claim" | "ready" => Ok(ActionType::MarkReady),
            "complete" | "completed" => Ok(ActionType::Complete),
            _ => Err(UnknownAction(s.to_string())),
        }
    }
}

/// Cross-cutting metadata attached to an action.
///
/// Carried into the tracing span of the action so a single request can be
/// followed from click to backend response.
///
/// # Examples
///
/// ```
/// use barangay_sync::ActionContext;
///
/// let ctx = ActionContext::default().with_actor("clerk-7");
/// assert_eq!(ctx.actor.as_deref(), Some("clerk-7"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionContext {
    /// Staff member issuing the action.
    pub actor: Option<String>,
    /// Correlation ID for log tracing.
    pub correlation_id: Uuid,
}

impl Default for ActionContext {
    fn default() -> Self {
        Self {
            actor: None,
            correlation_id: Uuid::new_v4(),
        }
    }
}

impl ActionContext {
    /// Set the actor identity.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Override the generated correlation ID.
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = id;
        self
    }
}
