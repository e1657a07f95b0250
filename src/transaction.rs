//! Certificate request records and their status vocabulary.
//!
//! These are the wire types exchanged with the backend over both the event
//! stream and the REST endpoints. No I/O occurs here.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Primary key of a certificate request.
pub type TransactionId = u64;

/// Lifecycle state of a certificate request.
///
/// Serialized as the display labels the console and backend share
/// (`"On Process"`, `"Ready To Claim"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Submitted by a resident, awaiting review.
    Pending,
    /// Accepted by staff, document not yet produced.
    Approved,
    /// Document generated, being prepared for release.
    #[serde(rename = "On Process")]
    OnProcess,
    /// Document waiting at the office for pickup.
    #[serde(rename = "Ready To Claim")]
    ReadyToClaim,
    /// Document released to the resident.
    Completed,
    /// Declined by staff.
    Rejected,
    /// Withdrawn before processing.
    Cancelled,
}

impl Status {
    /// Every status, in pipeline order.
    pub const ALL: [Status; 7] = [
        Status::Pending,
        Status::Approved,
        Status::OnProcess,
        Status::ReadyToClaim,
        Status::Completed,
        Status::Rejected,
        Status::Cancelled,
    ];

    /// The label used on the wire and in the console.
    pub fn label(self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::Approved => "Approved",
            Status::OnProcess => "On Process",
            Status::ReadyToClaim => "Ready To Claim",
            Status::Completed => "Completed",
            Status::Rejected => "Rejected",
            Status::Cancelled => "Cancelled",
        }
    }

    /// Returns `true` for states that drop the record from the live view.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Completed | Status::Rejected | Status::Cancelled
        )
    }

    /// Position along the pipeline. All terminal states share the last rank,
    /// so no status can follow a terminal one.
    pub(crate) fn rank(self) -> u8 {
        match self {
            Status::Pending => 0,
            Status::Approved => 1,
            Status::OnProcess => 2,
            Status::ReadyToClaim => 3,
            Status::Completed | Status::Rejected | Status::Cancelled => 4,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A resident's request for a certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub resident_id: u64,
    /// Empty for walk-in requests without an address.
    #[serde(default, deserialize_with = "null_as_default")]
    pub resident_email: String,
    pub certificate_type: String,
    /// Template inputs keyed by field name. Which keys are required depends
    /// on the template, see [`TemplateTable`](crate::TemplateTable).
    #[serde(default, deserialize_with = "null_as_default")]
    pub certificate_details: Map<String, Value>,
    pub status: Status,
    pub date_requested: DateTime<Utc>,
    #[serde(default)]
    pub date_issued: Option<DateTime<Utc>>,
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A partial update applied through [`TransactionStore::patch`](crate::TransactionStore::patch).
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionPatch {
    pub status: Option<Status>,
    pub date_issued: Option<DateTime<Utc>>,
}

impl TransactionPatch {
    /// A patch that only moves the status.
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Also stamp the issuance time.
    pub fn with_date_issued(mut self, at: DateTime<Utc>) -> Self {
        self.date_issued = Some(at);
        self
    }
}
