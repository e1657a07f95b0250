//! Maps named push events from the backend onto store mutations.
//!
//! Each inbound event produces at most one [`TransactionStore`] mutation,
//! applied immediately and in arrival order. The mapping is a static table
//! so it can be exercised without a socket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::TransactionStore;
use crate::transaction::{Status, Transaction, TransactionId, TransactionPatch};

/// Full list of active requests.
pub const SNAPSHOT_EVENT: &str = "transactions";
/// A single new request.
pub const NEW_TRANSACTION_EVENT: &str = "new_transaction";
/// A request left the live view.
pub const REMOVE_TRANSACTION_EVENT: &str = "remove_transaction";
/// A request changed status.
pub const TRANSACTION_UPDATED_EVENT: &str = "transaction_updated";

/// Outbound: announce the client role after connecting.
pub const REGISTER_EVENT: &str = "register";
/// Outbound: ask the server for a snapshot.
pub const REQUEST_SNAPSHOT_EVENT: &str = "getAllTransactions";

/// One JSON text frame on the event stream, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// The store mutation an event name maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    ReplaceAll,
    InsertFront,
    Remove,
    PatchStatus,
}

const EVENT_TABLE: &[(&str, Mutation)] = &[
    (SNAPSHOT_EVENT, Mutation::ReplaceAll),
    (NEW_TRANSACTION_EVENT, Mutation::InsertFront),
    (REMOVE_TRANSACTION_EVENT, Mutation::Remove),
    (TRANSACTION_UPDATED_EVENT, Mutation::PatchStatus),
];

/// Snapshots arrive either as a bare array or wrapped like the REST listing.
///
/// Entries stay raw so one bad record cannot discard the rest.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotPayload {
    List(Vec<Value>),
    Wrapped { transactions: Vec<Value> },
}

impl SnapshotPayload {
    fn into_entries(self) -> Vec<Value> {
        match self {
            SnapshotPayload::List(entries) => entries,
            SnapshotPayload::Wrapped { transactions } => transactions,
        }
    }
}

#[derive(Deserialize)]
struct RemovePayload {
    transaction_id: TransactionId,
}

#[derive(Deserialize)]
struct UpdatePayload {
    transaction_id: TransactionId,
    status: Status,
}

/// What a call to [`EventDispatcher::dispatch`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// The store was replaced with `count` records; `skipped` entries did
    /// not decode and were left out.
    Snapshot { count: usize, skipped: usize },
    /// A record was inserted or replaced in place; `changed` is `false` for
    /// identical repeats and stale duplicates.
    Inserted {
        transaction_id: TransactionId,
        changed: bool,
    },
    /// A removal was applied; `present` is `false` for unknown ids.
    Removed {
        transaction_id: TransactionId,
        present: bool,
    },
    /// A status patch was applied; `changed` is `false` for unknown ids,
    /// repeats, and stale statuses.
    Updated {
        transaction_id: TransactionId,
        changed: bool,
    },
    /// The event name is not one this client handles.
    Unknown,
    /// The payload did not decode; the store was not touched.
    Malformed,
}

/// Applies push events to a [`TransactionStore`].
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    store: TransactionStore,
}

impl EventDispatcher {
    pub fn new(store: TransactionStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    /// Apply one inbound event.
    pub fn dispatch(&self, event: &str, payload: Value) -> Dispatched {
        let Some(mutation) = EVENT_TABLE
            .iter()
            .find(|(name, _)| *name == event)
            .map(|(_, m)| *m)
        else {
            tracing::trace!(event, "dispatch: unknown event ignored");
            return Dispatched::Unknown;
        };

        let result = match mutation {
            Mutation::ReplaceAll => {
                serde_json::from_value::<SnapshotPayload>(payload).map(|snapshot| {
                    let entries = snapshot.into_entries();
                    let total = entries.len();
                    let records: Vec<Transaction> = entries
                        .into_iter()
                        .filter_map(|entry| match serde_json::from_value(entry) {
                            Ok(record) => Some(record),
                            Err(e) => {
                                tracing::warn!(event, error = %e, "dispatch: snapshot entry skipped");
                                None
                            }
                        })
                        .collect();
                    let count = records.len();
                    self.store.replace_all(records);
                    Dispatched::Snapshot {
                        count,
                        skipped: total - count,
                    }
                })
            }
            Mutation::InsertFront => {
                serde_json::from_value::<Transaction>(payload).map(|record| {
                    let transaction_id = record.transaction_id;
                    Dispatched::Inserted {
                        transaction_id,
                        changed: self.store.insert_front(record),
                    }
                })
            }
            Mutation::Remove => serde_json::from_value::<RemovePayload>(payload).map(|p| {
                Dispatched::Removed {
                    transaction_id: p.transaction_id,
                    present: self.store.remove(p.transaction_id),
                }
            }),
            Mutation::PatchStatus => serde_json::from_value::<UpdatePayload>(payload).map(|p| {
                Dispatched::Updated {
                    transaction_id: p.transaction_id,
                    changed: self
                        .store
                        .patch(p.transaction_id, TransactionPatch::status(p.status)),
                }
            }),
        };

        match result {
            Ok(applied) => {
                tracing::debug!(event, ?applied, "dispatch: event applied");
                applied
            }
            Err(e) => {
                tracing::warn!(event, error = %e, "dispatch: malformed payload dropped");
                Dispatched::Malformed
            }
        }
    }

    /// Decode a text frame and apply it.
    pub fn dispatch_frame(&self, text: &str) -> Dispatched {
        match serde_json::from_str::<EventFrame>(text) {
            Ok(frame) => self.dispatch(&frame.event, frame.data),
            Err(e) => {
                tracing::warn!(error = %e, "dispatch: undecodable frame dropped");
                Dispatched::Malformed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::transaction::test_fixtures::transaction;

    fn dispatcher_with(records: Vec<Transaction>) -> EventDispatcher {
        let store = TransactionStore::new();
        store.replace_all(records);
        EventDispatcher::new(store)
    }

    fn record_json(id: TransactionId, status: Status) -> Value {
        serde_json::to_value(transaction(id, status)).expect("fixture should serialize")
    }

    #[test]
    fn update_event_patches_status() {
        let dispatcher = dispatcher_with(vec![transaction(1, Status::Pending)]);

        let applied = dispatcher.dispatch(
            TRANSACTION_UPDATED_EVENT,
            json!({"transaction_id": 1, "status": "Approved"}),
        );

        assert_eq!(
            applied,
            Dispatched::Updated {
                transaction_id: 1,
                changed: true
            }
        );
        let records = dispatcher.store().snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].transaction_id, 1);
        assert_eq!(records[0].status, Status::Approved);
    }

    #[test]
    fn snapshot_event_replaces_everything() {
        let dispatcher = dispatcher_with(vec![transaction(1, Status::Pending)]);

        let applied = dispatcher.dispatch(
            SNAPSHOT_EVENT,
            json!([record_json(2, Status::Pending), record_json(3, Status::Approved)]),
        );

        assert_eq!(
            applied,
            Dispatched::Snapshot {
                count: 2,
                skipped: 0
            }
        );
        let ids: Vec<_> = dispatcher
            .store()
            .snapshot()
            .iter()
            .map(|r| r.transaction_id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn wrapped_snapshot_is_accepted() {
        let dispatcher = dispatcher_with(vec![]);
        let applied = dispatcher.dispatch(
            SNAPSHOT_EVENT,
            json!({"transactions": [record_json(4, Status::Pending)]}),
        );
        assert_eq!(
            applied,
            Dispatched::Snapshot {
                count: 1,
                skipped: 0
            }
        );
    }

    #[test]
    fn null_email_record_does_not_sink_snapshot() {
        let dispatcher = dispatcher_with(vec![]);
        let mut walk_in = record_json(7, Status::Pending);
        walk_in["resident_email"] = Value::Null;
        walk_in["certificate_details"] = Value::Null;

        let applied = dispatcher.dispatch(
            SNAPSHOT_EVENT,
            json!([record_json(6, Status::Pending), walk_in]),
        );

        assert_eq!(
            applied,
            Dispatched::Snapshot {
                count: 2,
                skipped: 0
            }
        );
        let stored = dispatcher.store().get(7).expect("record 7 should load");
        assert_eq!(stored.resident_email, "");
        assert!(stored.certificate_details.is_empty());
    }

    #[test]
    fn undecodable_snapshot_entry_is_skipped() {
        let dispatcher = dispatcher_with(vec![transaction(1, Status::Pending)]);
        let mut broken = record_json(9, Status::Pending);
        broken["status"] = json!("Archived");

        let applied = dispatcher.dispatch(
            SNAPSHOT_EVENT,
            json!([broken, record_json(8, Status::Approved)]),
        );

        assert_eq!(
            applied,
            Dispatched::Snapshot {
                count: 1,
                skipped: 1
            }
        );
        let ids: Vec<_> = dispatcher
            .store()
            .snapshot()
            .iter()
            .map(|r| r.transaction_id)
            .collect();
        assert_eq!(ids, vec![8]);
    }

    #[test]
    fn new_transaction_goes_to_front() {
        let dispatcher = dispatcher_with(vec![transaction(1, Status::Pending)]);
        let applied = dispatcher.dispatch(NEW_TRANSACTION_EVENT, record_json(2, Status::Pending));
        assert_eq!(
            applied,
            Dispatched::Inserted {
                transaction_id: 2,
                changed: true
            }
        );
        assert_eq!(dispatcher.store().snapshot()[0].transaction_id, 2);
    }

    #[test]
    fn stale_duplicate_insert_is_reported_unchanged() {
        let dispatcher = dispatcher_with(vec![transaction(2, Status::OnProcess)]);
        let applied = dispatcher.dispatch(NEW_TRANSACTION_EVENT, record_json(2, Status::Pending));
        assert_eq!(
            applied,
            Dispatched::Inserted {
                transaction_id: 2,
                changed: false
            }
        );
        assert_eq!(
            dispatcher.store().get(2).map(|r| r.status),
            Some(Status::OnProcess)
        );
    }

    #[test]
    fn remove_event_drops_record() {
        let dispatcher = dispatcher_with(vec![
            transaction(1, Status::Pending),
            transaction(2, Status::Pending),
        ]);
        let applied = dispatcher.dispatch(REMOVE_TRANSACTION_EVENT, json!({"transaction_id": 1}));
        assert_eq!(
            applied,
            Dispatched::Removed {
                transaction_id: 1,
                present: true
            }
        );
        assert!(dispatcher.store().get(1).is_none());
    }

    #[test]
    fn out_of_order_deltas_are_tolerated() {
        let dispatcher = dispatcher_with(vec![]);

        // Update and removal arrive for a record the client never saw.
        let updated = dispatcher.dispatch(
            TRANSACTION_UPDATED_EVENT,
            json!({"transaction_id": 5, "status": "Approved"}),
        );
        let removed = dispatcher.dispatch(REMOVE_TRANSACTION_EVENT, json!({"transaction_id": 5}));

        assert_eq!(
            updated,
            Dispatched::Updated {
                transaction_id: 5,
                changed: false
            }
        );
        assert_eq!(
            removed,
            Dispatched::Removed {
                transaction_id: 5,
                present: false
            }
        );
        assert!(dispatcher.store().is_empty());
    }

    #[test]
    fn unknown_event_is_ignored() {
        let dispatcher = dispatcher_with(vec![transaction(1, Status::Pending)]);
        let before = dispatcher.store().snapshot();
        assert_eq!(
            dispatcher.dispatch("status_updated", json!({"status": "Open"})),
            Dispatched::Unknown
        );
        assert_eq!(dispatcher.store().snapshot(), before);
    }

    #[test]
    fn malformed_payload_leaves_store_untouched() {
        let dispatcher = dispatcher_with(vec![transaction(1, Status::Pending)]);
        let before = dispatcher.store().snapshot();

        assert_eq!(
            dispatcher.dispatch(TRANSACTION_UPDATED_EVENT, json!({"status": "Approved"})),
            Dispatched::Malformed
        );
        assert_eq!(
            dispatcher.dispatch(SNAPSHOT_EVENT, json!("not a list")),
            Dispatched::Malformed
        );
        assert_eq!(dispatcher.store().snapshot(), before);
    }

    #[test]
    fn frames_are_decoded_then_dispatched() {
        let dispatcher = dispatcher_with(vec![transaction(1, Status::Pending)]);
        let applied = dispatcher.dispatch_frame(
            r#"{"event":"transaction_updated","data":{"transaction_id":1,"status":"Approved"}}"#,
        );
        assert_eq!(
            applied,
            Dispatched::Updated {
                transaction_id: 1,
                changed: true
            }
        );
        assert_eq!(dispatcher.dispatch_frame("{not json"), Dispatched::Malformed);
    }

    #[test]
    fn events_apply_in_arrival_order() {
        let dispatcher = dispatcher_with(vec![]);
        dispatcher.dispatch(NEW_TRANSACTION_EVENT, record_json(1, Status::Pending));
        dispatcher.dispatch(
            TRANSACTION_UPDATED_EVENT,
            json!({"transaction_id": 1, "status": "Approved"}),
        );
        dispatcher.dispatch(
            TRANSACTION_UPDATED_EVENT,
            json!({"transaction_id": 1, "status": "On Process"}),
        );
        assert_eq!(
            dispatcher.store().get(1).map(|r| r.status),
            Some(Status::OnProcess)
        );
        dispatcher.dispatch(REMOVE_TRANSACTION_EVENT, json!({"transaction_id": 1}));
        assert!(dispatcher.store().is_empty());
    }
}
