//! Allocate-and-append as one operation.

use crate::config::LedgerConfig;
use crate::error::{CoreError, CoreResult};
use crate::ledger::{contains, LedgerAdapter, TransactionalLedger};
use crate::record::{Record, RecordDraft};
use crate::retry::CancellationToken;
use crate::types::SequenceNumber;
use std::collections::BTreeSet;

/// Most gaps listed individually in a [`ReconcileReport`].
pub const MAX_LISTED_GAPS: usize = 1_000;

/// Result of [`Issuer::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    /// Counter value as read.
    pub counter: SequenceNumber,
    /// Highest record number, if any record exists.
    pub highest_record: Option<SequenceNumber>,
    /// Lowest numbers up to the counter that have no record, at most
    /// [`MAX_LISTED_GAPS`] of them.
    pub gaps: Vec<SequenceNumber>,
    /// How many numbers up to the counter have no record.
    pub gap_count: u64,
    /// New counter value if the counter lagged the records and was moved.
    pub advanced_to: Option<SequenceNumber>,
}

impl ReconcileReport {
    /// Returns true if counter and records agree.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.gap_count == 0 && self.advanced_to.is_none()
    }

    /// Returns true if more gaps exist than are listed.
    #[must_use]
    pub fn gaps_truncated(&self) -> bool {
        self.gap_count > self.gaps.len() as u64
    }
}

/// Issues documents: validates a draft, takes the next number and stores
/// the record under it.
///
/// With a transactional adapter the counter and the record are committed
/// in one write. Otherwise the counter is advanced first, which reserves
/// the number for this caller, and the record is appended afterwards. If
/// that append cannot complete the number stays reserved and
/// [`CoreError::OrphanedNumber`] is returned; numbers are never handed out
/// twice.
#[derive(Debug)]
pub struct Issuer<A> {
    adapter: A,
    config: LedgerConfig,
    cancel: CancellationToken,
}

impl<A: LedgerAdapter> Issuer<A> {
    /// Creates an issuer with default configuration.
    pub fn new(adapter: A) -> Self {
        Self::with_config(adapter, LedgerConfig::default())
    }

    /// Creates an issuer with explicit configuration.
    pub fn with_config(adapter: A, config: LedgerConfig) -> Self {
        Self {
            adapter,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the cancellation token observed between attempts.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Returns the configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Issues `draft` under the next free number.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] for a bad draft; nothing is read or written
    /// - [`CoreError::ConcurrencyExhausted`] if every attempt conflicted
    /// - [`CoreError::Inconsistent`] if a record already uses the next number
    /// - [`CoreError::OrphanedNumber`] if the counter moved but the record
    ///   could not be appended
    /// - [`CoreError::Cancelled`] if cancelled before the number was taken
    pub fn issue(&self, draft: &RecordDraft) -> CoreResult<Record> {
        draft.validate()?;

        let record = match self.adapter.as_transactional() {
            Some(ledger) => self.issue_atomic(ledger, draft)?,
            None => self.issue_split(draft)?,
        };

        tracing::info!(number = %record.number, customer = %record.customer_name, "document issued");
        Ok(record)
    }

    fn build(&self, draft: &RecordDraft, number: SequenceNumber) -> CoreResult<Record> {
        let record = draft.to_record(number, self.config.tax_rate);
        record.validate()?;
        Ok(record)
    }

    fn issue_atomic(&self, ledger: &dyn TransactionalLedger, draft: &RecordDraft) -> CoreResult<Record> {
        self.config.retry.run(&self.cancel, "issue", |_| {
            let current = ledger.read_ledger()?;
            let number = current.value.counter.next()?;
            if current.value.contains(number) {
                return Err(lagging_counter(number));
            }

            let record = self.build(draft, number)?;
            let mut next = current.value;
            next.counter = number;
            next.records.push(record.clone());
            ledger.write_ledger(&next, &current.token)?;
            Ok(record)
        })
    }

    fn issue_split(&self, draft: &RecordDraft) -> CoreResult<Record> {
        let record = self.config.retry.run(&self.cancel, "reserve", |_| {
            let counter = self.adapter.read_counter()?;
            let records = self.adapter.read_records()?;
            let number = counter.value.next()?;
            if contains(&records.value, number) {
                return Err(lagging_counter(number));
            }

            let record = self.build(draft, number)?;
            self.adapter.write_counter(number, &counter.token)?;
            tracing::debug!(%number, "number reserved");
            Ok(record)
        })?;

        // The number is spent from here on, so cancellation no longer
        // applies: finishing the append is the only way to avoid a gap.
        let append = self
            .config
            .append_retry
            .run(&CancellationToken::new(), "append", |_| {
                let current = self.adapter.read_records()?;
                if contains(&current.value, record.number) {
                    return Err(CoreError::inconsistent(format!(
                        "document {} appeared while reserved",
                        record.number
                    )));
                }
                let mut records = current.value;
                records.push(record.clone());
                self.adapter.write_records(&records, &current.token)?;
                Ok(())
            });

        match append {
            Ok(()) => Ok(record),
            Err(err) => {
                tracing::warn!(number = %record.number, error = %err, "number reserved without record");
                Err(CoreError::OrphanedNumber {
                    number: record.number,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Compares counter and records, and moves a lagging counter forward.
    ///
    /// Gaps (numbers up to the counter without a record) are reported but
    /// never filled. A counter behind the highest record is advanced to it
    /// so the next issue does not collide.
    pub fn reconcile(&self) -> CoreResult<ReconcileReport> {
        self.config.retry.run(&self.cancel, "reconcile", |_| {
            let counter = self.adapter.read_counter()?;
            let records = self.adapter.read_records()?;

            let highest_record = records.value.iter().map(|r| r.number).max();
            let (gap_count, gaps) = find_gaps(counter.value, &records.value)?;

            let mut report = ReconcileReport {
                counter: counter.value,
                highest_record,
                gaps,
                gap_count,
                advanced_to: None,
            };

            if let Some(highest) = highest_record.filter(|h| *h > counter.value) {
                self.adapter.write_counter(highest, &counter.token)?;
                tracing::warn!(from = %counter.value, to = %highest, "lagging counter advanced");
                report.advanced_to = Some(highest);
            }
            if report.gap_count > 0 {
                tracing::warn!(gaps = report.gap_count, "numbers issued without records");
            }
            Ok(report)
        })
    }
}

/// Counts the numbers in `1..=counter` without a record and lists the
/// lowest of them. Work is bounded by the record count, not the counter.
fn find_gaps(counter: SequenceNumber, records: &[Record]) -> CoreResult<(u64, Vec<SequenceNumber>)> {
    let last = counter.as_u64();
    let present: BTreeSet<u64> = records
        .iter()
        .map(|r| r.number.as_u64())
        .filter(|n| (1..=last).contains(n))
        .collect();
    let gap_count = last - present.len() as u64;

    let mut listed = Vec::new();
    let mut next = 1;
    for bound in present.iter().copied().chain(std::iter::once(last + 1)) {
        while next < bound && listed.len() < MAX_LISTED_GAPS {
            listed.push(SequenceNumber::new(next)?);
            next += 1;
        }
        if listed.len() == MAX_LISTED_GAPS {
            break;
        }
        next = bound + 1;
    }
    Ok((gap_count, listed))
}

fn lagging_counter(number: SequenceNumber) -> CoreError {
    tracing::warn!(%number, "counter lags history");
    CoreError::inconsistent(format!(
        "document {number} already exists but the counter has not reached it; run reconcile"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{DocumentLedger, Token};
    use crate::retry::RetryConfig;
    use crate::store::RecordStore;
    use crate::types::SortOrder;
    use chrono::NaiveDate;
    use remision_storage::InMemoryBackend;

    fn config() -> LedgerConfig {
        LedgerConfig::new()
            .retry(RetryConfig::immediate(5))
            .append_retry(RetryConfig::immediate(5))
    }

    fn draft(customer: &str) -> RecordDraft {
        RecordDraft::new(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(), customer)
            .with_item(1.0, "Servicio", 500.0)
    }

    fn num(n: u64) -> SequenceNumber {
        SequenceNumber::new(n).unwrap()
    }

    #[test]
    fn sequential_issues_are_contiguous_split() {
        let issuer = Issuer::with_config(DocumentLedger::split(InMemoryBackend::new()), config());
        for expected in 1..=5 {
            let record = issuer.issue(&draft("Ana")).unwrap();
            assert_eq!(record.number, num(expected));
        }
        assert_eq!(issuer.adapter().read_counter().unwrap().value, num(5));
    }

    #[test]
    fn sequential_issues_are_contiguous_combined() {
        let issuer = Issuer::with_config(DocumentLedger::combined(InMemoryBackend::new()), config());
        for expected in 1..=5 {
            assert_eq!(issuer.issue(&draft("Ana")).unwrap().number, num(expected));
        }
        let store = RecordStore::new(issuer.adapter());
        assert_eq!(store.list_all(SortOrder::Ascending).unwrap().len(), 5);
    }

    #[test]
    fn invalid_draft_touches_nothing() {
        let issuer = Issuer::with_config(DocumentLedger::split(InMemoryBackend::new()), config());
        let bad = RecordDraft::new(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(), "");
        assert!(matches!(issuer.issue(&bad), Err(CoreError::Validation { .. })));
        assert!(issuer.adapter().backend().names().is_empty());
    }

    #[test]
    fn lagging_counter_is_inconsistent() {
        let ledger = DocumentLedger::split(InMemoryBackend::new());
        let store = RecordStore::new(&ledger);
        store
            .append(draft("Ana").to_record(num(1), 0.16))
            .unwrap();

        let issuer = Issuer::with_config(&ledger, config());
        assert!(matches!(
            issuer.issue(&draft("Beto")),
            Err(CoreError::Inconsistent { .. })
        ));
        assert_eq!(ledger.read_counter().unwrap().value, SequenceNumber::ZERO);

        let report = issuer.reconcile().unwrap();
        assert_eq!(report.advanced_to, Some(num(1)));
        assert_eq!(issuer.issue(&draft("Beto")).unwrap().number, num(2));
    }

    #[test]
    fn reconcile_reports_gaps() {
        let ledger = DocumentLedger::split(InMemoryBackend::new());
        ledger.write_counter(num(3), &Token::absent()).unwrap();
        RecordStore::new(&ledger)
            .append(draft("Ana").to_record(num(2), 0.16))
            .unwrap();

        let report = Issuer::with_config(&ledger, config()).reconcile().unwrap();
        assert_eq!(report.gaps, vec![num(1), num(3)]);
        assert_eq!(report.gap_count, 2);
        assert!(!report.gaps_truncated());
        assert_eq!(report.highest_record, Some(num(2)));
        assert!(report.advanced_to.is_none());
        assert!(!report.is_clean());
    }

    #[test]
    fn reconcile_near_the_top_of_the_range_lists_a_bounded_prefix() {
        let ledger = DocumentLedger::split(InMemoryBackend::new());
        let top = num(crate::types::SEQUENCE_MAX);
        ledger.write_counter(top, &Token::absent()).unwrap();
        let store = RecordStore::new(&ledger);
        for n in [3, 50, crate::types::SEQUENCE_MAX] {
            store.append(draft("Ana").to_record(num(n), 0.16)).unwrap();
        }

        let report = Issuer::with_config(&ledger, config()).reconcile().unwrap();
        assert_eq!(report.gap_count, crate::types::SEQUENCE_MAX - 3);
        assert_eq!(report.gaps.len(), MAX_LISTED_GAPS);
        assert!(report.gaps_truncated());
        assert_eq!(&report.gaps[..3], &[num(1), num(2), num(4)]);
        assert_eq!(report.gaps[47], num(49));
        assert_eq!(report.gaps[48], num(51));
        assert_eq!(report.highest_record, Some(top));
        assert!(!report.is_clean());
    }

    #[test]
    fn clean_ledger_reconciles_clean() {
        let issuer = Issuer::with_config(DocumentLedger::split(InMemoryBackend::new()), config());
        issuer.issue(&draft("Ana")).unwrap();
        assert!(issuer.reconcile().unwrap().is_clean());
    }

    #[test]
    fn cancelled_issue_reserves_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let issuer = Issuer::with_config(DocumentLedger::split(InMemoryBackend::new()), config())
            .with_cancellation(cancel);
        assert!(matches!(issuer.issue(&draft("Ana")), Err(CoreError::Cancelled)));
        assert_eq!(issuer.adapter().read_counter().unwrap().value, SequenceNumber::ZERO);
    }

    #[test]
    fn default_tax_rate_applies() {
        let issuer = Issuer::with_config(
            DocumentLedger::combined(InMemoryBackend::new()),
            config().tax_rate(0.08),
        );
        let record = issuer.issue(&draft("Ana")).unwrap();
        assert!((record.tax_rate - 0.08).abs() < f64::EPSILON);

        let explicit = issuer.issue(&draft("Ana").with_tax_rate(0.0)).unwrap();
        assert!(explicit.tax_rate.abs() < f64::EPSILON);
    }
}
