//! Read models over a store snapshot: dashboard counts and list search.

use crate::transaction::{Status, Transaction};

/// Counts of live requests per status.
///
/// Terminal records are counted in `total` only; they normally leave the
/// live store on `remove_transaction`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub on_process: usize,
    pub ready_to_claim: usize,
}

impl TransactionStats {
    pub fn from_records(records: &[Transaction]) -> Self {
        records.iter().fold(Self::default(), |mut stats, record| {
            stats.total += 1;
            match record.status {
                Status::Pending => stats.pending += 1,
                Status::Approved => stats.approved += 1,
                Status::OnProcess => stats.on_process += 1,
                Status::ReadyToClaim => stats.ready_to_claim += 1,
                Status::Completed | Status::Rejected | Status::Cancelled => {}
            }
            stats
        })
    }
}

/// Case-insensitive search, optionally limited to some statuses.
///
/// # Examples
///
/// ```
/// use barangay_sync::{Status, TransactionFilter};
///
/// let filter = TransactionFilter::request_desk().with_query("indigency");
/// assert!(filter.statuses().contains(&Status::Pending));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    query: String,
    statuses: Vec<Status>,
}

impl TransactionFilter {
    /// Matches every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests awaiting a decision or pickup.
    pub fn request_desk() -> Self {
        Self::new().with_statuses([Status::Pending, Status::ReadyToClaim])
    }

    /// Requests whose document is being produced.
    pub fn generator_desk() -> Self {
        Self::new().with_statuses([Status::Approved, Status::OnProcess])
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into().trim().to_lowercase();
        self
    }

    /// Restrict to these statuses. An empty set means any status.
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = Status>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn statuses(&self) -> &[Status] {
        &self.statuses
    }

    pub fn matches(&self, record: &Transaction) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&record.status) {
            return false;
        }
        if self.query.is_empty() {
            return true;
        }
        let q = self.query.as_str();
        record.transaction_id.to_string().contains(q)
            || record.resident_id.to_string().contains(q)
            || record.resident_email.to_lowercase().contains(q)
            || record.certificate_type.to_lowercase().contains(q)
            || record.status.label().to_lowercase().contains(q)
    }

    /// Matching records in store order.
    pub fn apply<'a>(&self, records: &'a [Transaction]) -> Vec<&'a Transaction> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::test_fixtures::transaction;

    fn sample() -> Vec<Transaction> {
        let mut clearance = transaction(14, Status::Approved);
        clearance.certificate_type = "Barangay Clearance".into();
        vec![
            transaction(11, Status::Pending),
            transaction(12, Status::Pending),
            transaction(13, Status::ReadyToClaim),
            clearance,
            transaction(15, Status::OnProcess),
        ]
    }

    #[test]
    fn stats_count_each_status() {
        let stats = TransactionStats::from_records(&sample());
        assert_eq!(
            stats,
            TransactionStats {
                total: 5,
                pending: 2,
                approved: 1,
                on_process: 1,
                ready_to_claim: 1,
            }
        );
    }

    #[test]
    fn stats_of_empty_store() {
        assert_eq!(
            TransactionStats::from_records(&[]),
            TransactionStats::default()
        );
    }

    #[test]
    fn desks_split_by_status() {
        let records = sample();
        let requests: Vec<_> = TransactionFilter::request_desk()
            .apply(&records)
            .iter()
            .map(|r| r.transaction_id)
            .collect();
        assert_eq!(requests, vec![11, 12, 13]);

        let generator: Vec<_> = TransactionFilter::generator_desk()
            .apply(&records)
            .iter()
            .map(|r| r.transaction_id)
            .collect();
        assert_eq!(generator, vec![14, 15]);
    }

    #[test]
    fn query_is_case_insensitive() {
        let records = sample();
        let hits = TransactionFilter::new()
            .with_query("  CLEARANCE ")
            .apply(&records);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].transaction_id, 14);
    }

    #[test]
    fn query_matches_status_label_and_email() {
        let records = sample();
        assert_eq!(
            TransactionFilter::new()
                .with_query("ready to")
                .apply(&records)
                .len(),
            1
        );
        assert_eq!(
            TransactionFilter::new()
                .with_query("resident12@")
                .apply(&records)
                .len(),
            1
        );
    }

    #[test]
    fn query_and_status_combine() {
        let records = sample();
        let hits = TransactionFilter::generator_desk()
            .with_query("indigency")
            .apply(&records);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].transaction_id, 15);
    }
}
