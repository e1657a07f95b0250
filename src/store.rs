//! The live, ordered collection of certificate requests shared by all views.
//!
//! [`TransactionStore`] is the single source of truth: push events and
//! confirmed actions mutate it, views read owned snapshots from it and
//! subscribe to change notifications.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;

use crate::lifecycle::accepts_push;
use crate::transaction::{Transaction, TransactionId, TransactionPatch};

/// In-memory request list with id-keyed mutators.
///
/// Records are kept newest-first for pushed inserts; a snapshot load keeps
/// the server's order. Every mutator is synchronous and total: unknown ids
/// are ignored so that duplicated or reordered deliveries cannot corrupt
/// state. No two records ever share a `transaction_id`.
///
/// `Clone` is cheap: clones share the same underlying list.
#[derive(Clone)]
pub struct TransactionStore {
    records: Arc<watch::Sender<Vec<Transaction>>>,
}

impl std::fmt::Debug for TransactionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionStore")
            .field("len", &self.len())
            .finish()
    }
}

impl Default for TransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            records: Arc::new(tx),
        }
    }

    /// Replace the whole list with a snapshot from the server.
    ///
    /// If the snapshot repeats an id, the first occurrence wins.
    pub fn replace_all(&self, records: Vec<Transaction>) {
        let mut seen = HashSet::with_capacity(records.len());
        let deduped: Vec<Transaction> = records
            .into_iter()
            .filter(|r| seen.insert(r.transaction_id))
            .collect();

        tracing::debug!(count = deduped.len(), "store: snapshot replaced");
        self.records.send_replace(deduped);
    }

    /// Add a newly observed record at the front.
    ///
    /// A record whose id is already present replaces the existing entry in
    /// place instead of being added twice, unless it would move the status
    /// backward, in which case it is dropped.
    ///
    /// Returns `true` if the list changed.
    pub fn insert_front(&self, record: Transaction) -> bool {
        self.records.send_if_modified(|records| {
            match records
                .iter_mut()
                .find(|r| r.transaction_id == record.transaction_id)
            {
                Some(existing) if !accepts_push(existing.status, record.status) => {
                    tracing::debug!(
                        transaction_id = record.transaction_id,
                        "store: stale duplicate insert ignored"
                    );
                    false
                }
                Some(existing) => {
                    tracing::debug!(
                        transaction_id = record.transaction_id,
                        "store: duplicate insert, replacing in place"
                    );
                    let changed = *existing != record;
                    *existing = record;
                    changed
                }
                None => {
                    records.insert(0, record);
                    true
                }
            }
        })
    }

    /// Apply a partial update to one record.
    ///
    /// Returns `true` if the record changed. Unknown ids and stale status
    /// pushes (moving backward, or leaving a terminal state) are ignored.
    pub fn patch(&self, id: TransactionId, patch: TransactionPatch) -> bool {
        self.records.send_if_modified(|records| {
            let Some(record) = records.iter_mut().find(|r| r.transaction_id == id) else {
                tracing::debug!(transaction_id = id, "store: patch for unknown id ignored");
                return false;
            };

            let mut changed = false;
            if let Some(status) = patch.status {
                if !accepts_push(record.status, status) {
                    tracing::debug!(
                        transaction_id = id,
                        current = %record.status,
                        incoming = %status,
                        "store: stale status ignored"
                    );
                    return false;
                }
                if record.status != status {
                    record.status = status;
                    changed = true;
                }
            }
            if let Some(at) = patch.date_issued
                && record.date_issued != Some(at)
            {
                record.date_issued = Some(at);
                changed = true;
            }
            changed
        })
    }

    /// Drop a record from the live list. Returns `true` if it was present.
    pub fn remove(&self, id: TransactionId) -> bool {
        self.records.send_if_modified(|records| {
            let before = records.len();
            records.retain(|r| r.transaction_id != id);
            records.len() != before
        })
    }

    /// An owned copy of the current ordered list.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.records.borrow().clone()
    }

    /// An owned copy of one record.
    pub fn get(&self, id: TransactionId) -> Option<Transaction> {
        self.records
            .borrow()
            .iter()
            .find(|r| r.transaction_id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Subscribe to changes.
    ///
    /// The receiver is marked changed after every mutation that altered the
    /// list; no-op patches and removals do not wake it.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Transaction>> {
        self.records.subscribe()
    }
}
