//! # Remision Core
//!
//! Numbering and record keeping for remisión documents.
//!
//! This crate provides:
//! - [`SequenceAllocator`] for zero-padded, strictly increasing numbers
//! - [`RecordStore`] for appending, listing and soft-deleting records
//! - [`LedgerAdapter`] implementations over versioned documents and SQLite
//! - [`Issuer`], which allocates and appends as one operation, retrying
//!   optimistic-concurrency conflicts with backoff
//! - [`RelayIssuer`] for ledgers written by an external workflow
//! - [`HistoryCache`], [`Report`] and the delivery seams
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use remision_core::{DocumentLedger, Issuer, RecordDraft};
//! use remision_storage::InMemoryBackend;
//!
//! let issuer = Issuer::new(DocumentLedger::combined(InMemoryBackend::new()));
//! let draft = RecordDraft::new(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(), "Taller Ruiz")
//!     .with_item(2.0, "Balata", 100.0);
//!
//! let record = issuer.issue(&draft).unwrap();
//! assert_eq!(record.number.to_string(), "00000001");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod allocator;
mod cache;
mod config;
mod delivery;
mod error;
mod issuer;
pub mod ledger;
mod record;
mod relay;
mod report;
mod retry;
mod store;
mod types;

pub use allocator::{Allocation, SequenceAllocator, SequenceStatus};
pub use cache::HistoryCache;
pub use config::{LedgerConfig, RelayConfig, DEFAULT_TAX_RATE};
pub use delivery::{deliver, EmailRelay, PdfRenderer};
pub use error::{CoreError, CoreResult};
pub use issuer::{Issuer, ReconcileReport, MAX_LISTED_GAPS};
#[cfg(feature = "sqlite")]
pub use ledger::SqliteLedger;
pub use ledger::{
    DocumentLayout, DocumentLedger, Ledger, LedgerAdapter, Token, TransactionalLedger, Versioned,
};
pub use record::{LineItem, Record, RecordDraft};
pub use relay::{RelayIssuer, WorkflowRelay};
pub use report::{CustomerRevenue, ProductQuantity, Report, TOP_N};
pub use retry::{CancellationToken, RetryConfig};
pub use store::{customers_of, sort_records, Customer, RecordFilter, RecordStore};
pub use types::{SequenceNumber, SortOrder, SEQUENCE_MAX, SEQUENCE_WIDTH};
