//! End-to-end checks of the numbering protocol across adapters.

use chrono::NaiveDate;
use remision_core::{
    CoreError, DocumentLedger, Issuer, LedgerAdapter, LedgerConfig, RecordDraft, RecordStore,
    RetryConfig, SequenceAllocator, SequenceNumber, SortOrder, Token,
};
use remision_storage::{FileBackend, InMemoryBackend};
use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;

fn draft(customer: &str) -> RecordDraft {
    RecordDraft::new(NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(), customer)
        .with_city("Querétaro")
        .with_item(3.0, "Refacción", 120.0)
}

fn num(n: u64) -> SequenceNumber {
    SequenceNumber::new(n).unwrap()
}

fn contended() -> LedgerConfig {
    LedgerConfig::new()
        .retry(RetryConfig::immediate(64))
        .append_retry(RetryConfig::immediate(64))
}

fn numbers<A: LedgerAdapter>(adapter: &A) -> Vec<u64> {
    RecordStore::new(adapter)
        .list_all(SortOrder::Ascending)
        .unwrap()
        .iter()
        .map(|r| r.number.as_u64())
        .collect()
}

fn issue_concurrently<A: LedgerAdapter + 'static>(adapter: Arc<A>, k: usize) -> Vec<u64> {
    let barrier = Arc::new(Barrier::new(k));
    let handles: Vec<_> = (0..k)
        .map(|i| {
            let adapter = Arc::clone(&adapter);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let issuer = Issuer::with_config(adapter, contended());
                barrier.wait();
                issuer
                    .issue(&draft(&format!("Cliente {i}")))
                    .unwrap()
                    .number
                    .as_u64()
            })
        })
        .collect();
    let mut issued: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    issued.sort_unstable();
    issued
}

#[test]
fn sequential_issues_from_existing_counter() {
    let ledger = DocumentLedger::split(InMemoryBackend::new());
    ledger.write_counter(num(41), &Token::absent()).unwrap();

    let issuer = Issuer::new(&ledger);
    for _ in 0..10 {
        issuer.issue(&draft("Ana")).unwrap();
    }
    assert_eq!(numbers(&ledger), (42..=51).collect::<Vec<_>>());
    assert_eq!(ledger.read_counter().unwrap().value, num(51));
}

#[test]
fn concurrent_issues_split_layout() {
    let ledger = Arc::new(DocumentLedger::split(InMemoryBackend::new()));
    let issued = issue_concurrently(Arc::clone(&ledger), 8);
    assert_eq!(issued, (1..=8).collect::<Vec<_>>());
    assert_eq!(numbers(&ledger), issued);
}

#[test]
fn concurrent_issues_combined_layout() {
    let ledger = Arc::new(DocumentLedger::combined(InMemoryBackend::new()));
    let issued = issue_concurrently(Arc::clone(&ledger), 8);
    assert_eq!(issued, (1..=8).collect::<Vec<_>>());
}

#[test]
fn concurrent_issues_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(DocumentLedger::split(FileBackend::open(dir.path()).unwrap()));
    let issued = issue_concurrently(Arc::clone(&ledger), 6);
    assert_eq!(issued, (1..=6).collect::<Vec<_>>());

    // A second handle on the same directory sees the same ledger.
    let reopened = DocumentLedger::split(FileBackend::open(dir.path()).unwrap());
    assert_eq!(numbers(&reopened), issued);
}

#[cfg(feature = "sqlite")]
#[test]
fn concurrent_issues_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("remisiones.db");

    let k = 6;
    let barrier = Arc::new(Barrier::new(k));
    let handles: Vec<_> = (0..k)
        .map(|i| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // One connection per thread, as separate processes would.
                let ledger = remision_core::SqliteLedger::open(&path).unwrap();
                let issuer = Issuer::with_config(ledger, contended());
                barrier.wait();
                issuer.issue(&draft(&format!("C{i}"))).unwrap().number.as_u64()
            })
        })
        .collect();
    let mut issued: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    issued.sort_unstable();
    assert_eq!(issued, (1..=6).collect::<Vec<_>>());

    let ledger = remision_core::SqliteLedger::open(&path).unwrap();
    assert_eq!(numbers(&ledger), issued);
}

#[test]
fn allocate_without_commit_repeats() {
    let ledger = DocumentLedger::split(InMemoryBackend::new());
    ledger.write_counter(num(5), &Token::absent()).unwrap();
    let allocator = SequenceAllocator::new(&ledger);
    let store = RecordStore::new(&ledger);

    let allocation = allocator.allocate().unwrap();
    assert_eq!(allocation.number.to_string(), "00000006");

    store
        .append(draft("Ana").to_record(allocation.number, 0.16))
        .unwrap();
    assert_eq!(allocator.allocate().unwrap().number.to_string(), "00000006");

    allocator.commit(&allocation).unwrap();
    assert_eq!(allocator.allocate().unwrap().number.to_string(), "00000007");
}

#[test]
fn racing_submissions_on_stale_counter() {
    let ledger = DocumentLedger::split(InMemoryBackend::new());
    ledger.write_counter(num(10), &Token::absent()).unwrap();
    let allocator = SequenceAllocator::new(&ledger);

    // Both submissions read 00000010.
    let first = allocator.allocate().unwrap();
    let second = allocator.allocate().unwrap();
    assert_eq!(first.number, second.number);

    allocator.commit(&first).unwrap();
    assert!(matches!(
        allocator.commit(&second),
        Err(CoreError::Conflict { .. })
    ));

    let retried = allocator.allocate().unwrap();
    assert_eq!(retried.number.to_string(), "00000012");
    allocator.commit(&retried).unwrap();
}

#[test]
fn soft_delete_persists_through_adapter() {
    let dir = tempfile::tempdir().unwrap();
    let number = {
        let ledger = DocumentLedger::split(FileBackend::open(dir.path()).unwrap());
        let record = Issuer::new(&ledger).issue(&draft("Ana")).unwrap();
        RecordStore::new(&ledger)
            .set_deleted(record.number, true)
            .unwrap();
        record.number
    };

    let ledger = DocumentLedger::split(FileBackend::open(dir.path()).unwrap());
    assert!(RecordStore::new(&ledger).get(number).unwrap().deleted);
}
