//! Test fixtures and ledger helpers.
//!
//! Provides ready-to-use ledgers over every adapter and layout, and
//! helpers to seed them with a counter and history.

use remision_core::{
    DocumentLedger, Issuer, LedgerAdapter, LedgerConfig, Record, RecordStore, RetryConfig,
    SequenceAllocator, SequenceNumber, SortOrder, SqliteLedger,
};
use remision_storage::{FileBackend, InMemoryBackend};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Shared adapter handle used by the fixtures.
pub type SharedLedger = Arc<dyn LedgerAdapter>;

/// Adapter and layout of a [`TestLedger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerKind {
    /// In-memory documents, `secuencia.json` + `historial.json`.
    MemorySplit,
    /// In-memory documents, one `ledger.json`.
    MemoryCombined,
    /// Files in a temp directory, split layout.
    FileSplit,
    /// Files in a temp directory, combined layout.
    FileCombined,
    /// SQLite database in a temp directory.
    Sqlite,
}

impl LedgerKind {
    /// Every kind, split layouts first.
    pub const ALL: [LedgerKind; 5] = [
        LedgerKind::MemorySplit,
        LedgerKind::FileSplit,
        LedgerKind::MemoryCombined,
        LedgerKind::FileCombined,
        LedgerKind::Sqlite,
    ];

    /// Returns true if counter and records are committed together.
    pub fn is_transactional(self) -> bool {
        !matches!(self, LedgerKind::MemorySplit | LedgerKind::FileSplit)
    }
}

/// A test ledger with automatic cleanup.
pub struct TestLedger {
    kind: LedgerKind,
    ledger: SharedLedger,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestLedger {
    /// Creates an empty ledger of the given kind.
    pub fn new(kind: LedgerKind) -> Self {
        match kind {
            LedgerKind::MemorySplit => Self::wrap(kind, DocumentLedger::split(InMemoryBackend::new()), None),
            LedgerKind::MemoryCombined => {
                Self::wrap(kind, DocumentLedger::combined(InMemoryBackend::new()), None)
            }
            LedgerKind::FileSplit | LedgerKind::FileCombined => {
                let temp_dir = TempDir::new().expect("Failed to create temp directory");
                let backend = FileBackend::open(temp_dir.path()).expect("Failed to open file backend");
                let ledger = if kind == LedgerKind::FileSplit {
                    DocumentLedger::split(backend)
                } else {
                    DocumentLedger::combined(backend)
                };
                Self::wrap(kind, ledger, Some(temp_dir))
            }
            LedgerKind::Sqlite => {
                let temp_dir = TempDir::new().expect("Failed to create temp directory");
                let ledger = SqliteLedger::open(&temp_dir.path().join("ledger.db"))
                    .expect("Failed to open sqlite ledger");
                Self::wrap(kind, ledger, Some(temp_dir))
            }
        }
    }

    fn wrap<A: LedgerAdapter + 'static>(kind: LedgerKind, ledger: A, temp_dir: Option<TempDir>) -> Self {
        Self {
            kind,
            ledger: Arc::new(ledger),
            temp_dir,
        }
    }

    /// Creates a ledger whose counter is `counter` and whose history is `records`.
    pub fn seeded(kind: LedgerKind, counter: u64, records: &[Record]) -> Self {
        let ledger = Self::new(kind);
        ledger.seed(counter, records);
        ledger
    }

    /// Overwrites counter and history.
    pub fn seed(&self, counter: u64, records: &[Record]) {
        let value = SequenceNumber::new(counter).expect("Counter out of range");
        let current = self.ledger.read_counter().expect("Failed to read counter");
        self.ledger
            .write_counter(value, &current.token)
            .expect("Failed to seed counter");
        let current = self.ledger.read_records().expect("Failed to read records");
        self.ledger
            .write_records(records, &current.token)
            .expect("Failed to seed records");
    }

    /// Returns the kind of this ledger.
    pub fn kind(&self) -> LedgerKind {
        self.kind
    }

    /// Returns a shared handle to the adapter.
    pub fn adapter(&self) -> SharedLedger {
        Arc::clone(&self.ledger)
    }

    /// Returns the directory backing the ledger, if on disk.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// An issuer with [`fast_config`].
    pub fn issuer(&self) -> Issuer<SharedLedger> {
        Issuer::with_config(self.adapter(), fast_config())
    }

    /// A record store with immediate retries.
    pub fn store(&self) -> RecordStore<SharedLedger> {
        RecordStore::new(self.adapter()).with_retry(RetryConfig::immediate(32))
    }

    /// An allocator.
    pub fn allocator(&self) -> SequenceAllocator<SharedLedger> {
        SequenceAllocator::new(self.adapter())
    }

    /// Current counter value.
    pub fn counter(&self) -> SequenceNumber {
        self.ledger.read_counter().expect("Failed to read counter").value
    }

    /// All records, oldest first.
    pub fn records(&self) -> Vec<Record> {
        let mut records = self.ledger.read_records().expect("Failed to read records").value;
        remision_core::sort_records(&mut records, SortOrder::Ascending);
        records
    }
}

impl std::ops::Deref for TestLedger {
    type Target = dyn LedgerAdapter;

    fn deref(&self) -> &Self::Target {
        self.ledger.as_ref()
    }
}

/// Ledger configuration with immediate, generous retries for tests.
pub fn fast_config() -> LedgerConfig {
    LedgerConfig::new()
        .retry(RetryConfig::immediate(64))
        .append_retry(RetryConfig::immediate(64))
}

/// Runs a test against one empty ledger of every kind.
pub fn with_each_ledger<F>(mut f: F)
where
    F: FnMut(&TestLedger),
{
    for kind in LedgerKind::ALL {
        let ledger = TestLedger::new(kind);
        f(&ledger);
    }
}

/// Runs a test with a temporary in-memory split ledger.
pub fn with_temp_ledger<F, R>(f: F) -> R
where
    F: FnOnce(&TestLedger) -> R,
{
    let ledger = TestLedger::new(LedgerKind::MemorySplit);
    f(&ledger)
}

/// Test scenario helpers.
pub mod scenarios {
    use chrono::NaiveDate;
    use remision_core::{LineItem, Record, RecordDraft, SequenceNumber};

    /// A fixed date used by the sample data.
    pub fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date")
    }

    /// A valid draft with one billable row.
    pub fn draft(customer: &str) -> RecordDraft {
        RecordDraft::new(sample_date(), customer)
            .with_city("Monterrey")
            .with_item(2.0, "Balata", 100.0)
    }

    /// A stored record under `number`.
    pub fn record(number: u64, customer: &str) -> Record {
        draft(customer).to_record(
            SequenceNumber::new(number).expect("number in range"),
            remision_core::DEFAULT_TAX_RATE,
        )
    }

    /// Records `1..=count`, one customer each.
    pub fn history(count: u64) -> Vec<Record> {
        (1..=count)
            .map(|n| record(n, &format!("Cliente {n}")))
            .collect()
    }

    /// A record with several rows, for report tests.
    pub fn record_with_items(number: u64, customer: &str, date: NaiveDate, items: &[(f64, &str, f64)]) -> Record {
        let mut draft = RecordDraft::new(date, customer);
        draft.line_items = items
            .iter()
            .map(|(qty, desc, price)| LineItem::new(*qty, *desc, *price))
            .collect();
        draft.to_record(
            SequenceNumber::new(number).expect("number in range"),
            remision_core::DEFAULT_TAX_RATE,
        )
    }
}
