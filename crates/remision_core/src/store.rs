//! The record collection.

use crate::error::{CoreError, CoreResult};
use crate::ledger::{contains, LedgerAdapter};
use crate::record::Record;
use crate::retry::{CancellationToken, RetryConfig};
use crate::types::{SequenceNumber, SortOrder};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;

/// Selects records for [`RecordStore::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Include soft-deleted records.
    pub include_deleted: bool,
    /// Result order.
    pub order: SortOrder,
    /// Case-insensitive substring of the customer name.
    pub customer: Option<String>,
    /// Earliest date, inclusive.
    pub from: Option<NaiveDate>,
    /// Latest date, inclusive.
    pub to: Option<NaiveDate>,
}

impl RecordFilter {
    /// Active records, newest first.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether deleted records are included.
    #[must_use]
    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    /// Sets the order.
    #[must_use]
    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Restricts to customers whose name contains `needle`.
    #[must_use]
    pub fn customer(mut self, needle: impl Into<String>) -> Self {
        self.customer = Some(needle.into());
        self
    }

    /// Restricts to dates in `[from, to]`.
    #[must_use]
    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Returns true if `record` passes the filter.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        if record.deleted && !self.include_deleted {
            return false;
        }
        if self.from.is_some_and(|from| record.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| record.date > to) {
            return false;
        }
        match &self.customer {
            Some(needle) => record
                .customer_name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

/// A known customer, for autocompletion.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Customer {
    /// Customer name.
    #[serde(rename = "nombre")]
    pub name: String,
    /// Customer city.
    #[serde(rename = "ciudad")]
    pub city: String,
}

/// Sorts records by number in the given order.
pub fn sort_records(records: &mut [Record], order: SortOrder) {
    match order {
        SortOrder::Descending => records.sort_by(|a, b| b.number.cmp(&a.number)),
        SortOrder::Ascending => records.sort_by(|a, b| a.number.cmp(&b.number)),
    }
}

/// Distinct `(name, city)` pairs of active records, ordered by name.
pub fn customers_of(records: &[Record]) -> Vec<Customer> {
    records
        .iter()
        .filter(|r| !r.deleted && !r.customer_name.trim().is_empty())
        .map(|r| Customer {
            name: r.customer_name.trim().to_string(),
            city: r.city.trim().to_string(),
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Appends, lists and soft-deletes records.
///
/// Every mutation is a read-modify-write of the whole collection guarded by
/// the collection's token; conflicts are retried from a fresh read.
#[derive(Debug)]
pub struct RecordStore<A> {
    adapter: A,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl<A: LedgerAdapter> RecordStore<A> {
    /// Creates a store with the default retry policy.
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            retry: RetryConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the conflict retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the cancellation token observed between retries.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Appends a record under its own number.
    ///
    /// The counter is not touched; issuing new documents goes through
    /// [`crate::Issuer`]. The stored record is never marked deleted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the number is already taken or
    /// a required field is missing.
    pub fn append(&self, record: Record) -> CoreResult<Record> {
        let mut record = record;
        record.deleted = false;
        record.validate()?;

        self.retry.run(&self.cancel, "append", |_| {
            let current = self.adapter.read_records()?;
            if contains(&current.value, record.number) {
                return Err(CoreError::validation(format!(
                    "document {} already exists",
                    record.number
                )));
            }
            let mut records = current.value;
            records.push(record.clone());
            self.adapter.write_records(&records, &current.token)?;
            Ok(())
        })?;

        tracing::debug!(number = %record.number, "record appended");
        Ok(record)
    }

    /// Lists every record, deleted ones included.
    pub fn list_all(&self, order: SortOrder) -> CoreResult<Vec<Record>> {
        let mut records = self.adapter.read_records()?.value;
        sort_records(&mut records, order);
        Ok(records)
    }

    /// Lists records passing `filter`.
    pub fn list(&self, filter: &RecordFilter) -> CoreResult<Vec<Record>> {
        let mut records: Vec<Record> = self
            .adapter
            .read_records()?
            .value
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        sort_records(&mut records, filter.order);
        Ok(records)
    }

    /// Returns one record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown number.
    pub fn get(&self, number: SequenceNumber) -> CoreResult<Record> {
        self.adapter
            .read_records()?
            .value
            .into_iter()
            .find(|r| r.number == number)
            .ok_or(CoreError::NotFound { number })
    }

    /// Marks a record deleted or restores it.
    ///
    /// Setting the flag to its current value succeeds without writing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown number; the store is
    /// left unchanged.
    pub fn set_deleted(&self, number: SequenceNumber, deleted: bool) -> CoreResult<Record> {
        self.retry.run(&self.cancel, "set_deleted", |_| {
            let current = self.adapter.read_records()?;
            let mut records = current.value;
            let record = records
                .iter_mut()
                .find(|r| r.number == number)
                .ok_or(CoreError::NotFound { number })?;

            if record.deleted == deleted {
                return Ok(record.clone());
            }
            record.deleted = deleted;
            let updated = record.clone();
            self.adapter.write_records(&records, &current.token)?;
            tracing::info!(%number, deleted, "record flag updated");
            Ok(updated)
        })
    }

    /// Distinct customers of active records, ordered by name.
    pub fn customers(&self) -> CoreResult<Vec<Customer>> {
        Ok(customers_of(&self.adapter.read_records()?.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DocumentLedger;
    use crate::record::RecordDraft;
    use remision_storage::{DocumentBackend, InMemoryBackend};

    fn store() -> RecordStore<DocumentLedger<InMemoryBackend>> {
        RecordStore::new(DocumentLedger::split(InMemoryBackend::new()))
            .with_retry(RetryConfig::immediate(5))
    }

    fn record(n: u64, customer: &str, day: u32) -> Record {
        RecordDraft::new(NaiveDate::from_ymd_opt(2024, 6, day).unwrap(), customer)
            .with_city("León")
            .with_item(1.0, "Pieza", 100.0)
            .to_record(SequenceNumber::new(n).unwrap(), 0.16)
    }

    fn num(n: u64) -> SequenceNumber {
        SequenceNumber::new(n).unwrap()
    }

    #[test]
    fn append_then_list() {
        let store = store();
        let stored = store.append(record(1, "Ana", 1)).unwrap();
        assert!(!stored.deleted);

        let all = store.list_all(SortOrder::Descending).unwrap();
        assert_eq!(all, vec![stored]);
    }

    #[test]
    fn append_rejects_duplicates() {
        let store = store();
        store.append(record(1, "Ana", 1)).unwrap();
        let err = store.append(record(1, "Beto", 2)).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert_eq!(store.list_all(SortOrder::Ascending).unwrap().len(), 1);
    }

    #[test]
    fn append_rejects_missing_fields() {
        let store = store();
        let mut bad = record(1, "Ana", 1);
        bad.customer_name.clear();
        assert!(matches!(
            store.append(bad),
            Err(CoreError::Validation { .. })
        ));
        assert!(store.list_all(SortOrder::Ascending).unwrap().is_empty());
    }

    #[test]
    fn list_all_orders_by_number() {
        let store = store();
        for n in [3, 10, 1] {
            store.append(record(n, "Ana", 1)).unwrap();
        }
        let desc: Vec<u64> = store
            .list_all(SortOrder::Descending)
            .unwrap()
            .iter()
            .map(|r| r.number.as_u64())
            .collect();
        assert_eq!(desc, vec![10, 3, 1]);

        let asc: Vec<u64> = store
            .list_all(SortOrder::Ascending)
            .unwrap()
            .iter()
            .map(|r| r.number.as_u64())
            .collect();
        assert_eq!(asc, vec![1, 3, 10]);
    }

    #[test]
    fn set_deleted_is_idempotent() {
        let store = store();
        store.append(record(1, "Ana", 1)).unwrap();

        let first = store.set_deleted(num(1), true).unwrap();
        assert!(first.deleted);
        let version = store
            .adapter()
            .backend()
            .get("historial.json")
            .unwrap()
            .unwrap()
            .version;

        let second = store.set_deleted(num(1), true).unwrap();
        assert_eq!(first, second);
        let after = store
            .adapter()
            .backend()
            .get("historial.json")
            .unwrap()
            .unwrap()
            .version;
        assert_eq!(version, after);

        let restored = store.set_deleted(num(1), false).unwrap();
        assert!(!restored.deleted);
    }

    #[test]
    fn set_deleted_unknown_number() {
        let store = store();
        store.append(record(1, "Ana", 1)).unwrap();
        let before = store.list_all(SortOrder::Descending).unwrap();

        assert!(matches!(
            store.set_deleted(num(2), true),
            Err(CoreError::NotFound { .. })
        ));
        assert_eq!(store.list_all(SortOrder::Descending).unwrap(), before);
    }

    #[test]
    fn get_and_not_found() {
        let store = store();
        store.append(record(4, "Ana", 1)).unwrap();
        assert_eq!(store.get(num(4)).unwrap().customer_name, "Ana");
        assert!(matches!(store.get(num(5)), Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn filter() {
        let store = store();
        store.append(record(1, "Ana López", 1)).unwrap();
        store.append(record(2, "Beto", 10)).unwrap();
        store.append(record(3, "ana maría", 20)).unwrap();
        store.set_deleted(num(3), true).unwrap();

        let active = store.list(&RecordFilter::new()).unwrap();
        assert_eq!(active.len(), 2);

        let anas = store
            .list(&RecordFilter::new().customer("ANA").include_deleted(true))
            .unwrap();
        assert_eq!(anas.len(), 2);

        let june = store
            .list(
                &RecordFilter::new()
                    .between(
                        NaiveDate::from_ymd_opt(2024, 6, 5).unwrap(),
                        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
                    )
                    .include_deleted(true)
                    .order(SortOrder::Ascending),
            )
            .unwrap();
        let numbers: Vec<u64> = june.iter().map(|r| r.number.as_u64()).collect();
        assert_eq!(numbers, vec![2, 3]);
    }

    #[test]
    fn customers_are_distinct_and_sorted() {
        let store = store();
        store.append(record(1, "Zeta", 1)).unwrap();
        store.append(record(2, "Alfa", 1)).unwrap();
        store.append(record(3, "Zeta", 2)).unwrap();
        store.append(record(4, "Borrado", 2)).unwrap();
        store.set_deleted(num(4), true).unwrap();

        let names: Vec<String> = store
            .customers()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Alfa", "Zeta"]);
    }
}
