//! The certificate request state machine.
//!
//! One table decides which staff actions are legal from which status. The
//! coordinator consults it before any network call, and the store uses the
//! same ordering to discard stale status pushes.

use crate::action::ActionType;
use crate::transaction::Status;

/// What a legal action does to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Move the record to a new status.
    Advance(Status),
    /// Re-issue the document without touching the status.
    Regenerate,
}

/// Legal `(current status, action)` pairs and their effect.
pub const TRANSITIONS: &[(Status, ActionType, Step)] = &[
    (
        Status::Pending,
        ActionType::Approve,
        Step::Advance(Status::Approved),
    ),
    (
        Status::Pending,
        ActionType::Reject,
        Step::Advance(Status::Rejected),
    ),
    (
        Status::Approved,
        ActionType::Generate,
        Step::Advance(Status::OnProcess),
    ),
    (Status::OnProcess, ActionType::Generate, Step::Regenerate),
    (
        Status::OnProcess,
        ActionType::MarkReady,
        Step::Advance(Status::ReadyToClaim),
    ),
    (
        Status::ReadyToClaim,
        ActionType::Complete,
        Step::Advance(Status::Completed),
    ),
];

/// An action that the table does not allow from the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {} a request that is {from}", .action.verb())]
pub struct IllegalTransition {
    pub from: Status,
    pub action: ActionType,
}

impl IllegalTransition {
    /// Staff-facing explanation, phrased after the console's notices.
    pub fn notice_text(&self) -> String {
        match (self.from, self.action) {
            (Status::Pending, ActionType::Complete) => {
                "This request is not ready to claim yet.".to_string()
            }
            (_, ActionType::MarkReady) => {
                "Only requests that have been processed can be marked as ready to claim."
                    .to_string()
            }
            (Status::OnProcess, _) => "This request is already On Process.".to_string(),
            (Status::ReadyToClaim, _) => "This request is already Ready To Claim.".to_string(),
            (from, _) if from.is_terminal() => format!("This request is already {from}."),
            (from, action) => format!("Cannot {} a request that is {from}.", action.verb()),
        }
    }
}

/// Look up the effect of `action` on a record currently in `from`.
///
/// # Errors
///
/// Returns [`IllegalTransition`] for every pair not listed in
/// [`TRANSITIONS`].
pub fn transition(from: Status, action: ActionType) -> Result<Step, IllegalTransition> {
    TRANSITIONS
        .iter()
        .find(|(status, act, _)| *status == from && *act == action)
        .map(|(_, _, step)| *step)
        .ok_or(IllegalTransition { from, action })
}

/// Whether a pushed status may replace the current one.
///
/// Equal statuses are accepted as no-ops. Nothing replaces a terminal status
/// and nothing moves backward along the pipeline. Pushes may skip forward
/// through the pipeline, but a request can only end as `Rejected` or
/// `Cancelled` while it is still `Pending` or `Approved`.
pub(crate) fn accepts_push(current: Status, incoming: Status) -> bool {
    if current == incoming {
        return true;
    }
    if current.is_terminal() {
        return false;
    }
    match incoming {
        Status::Rejected | Status::Cancelled => {
            matches!(current, Status::Pending | Status::Approved)
        }
        _ => incoming.rank() > current.rank(),
    }
}
