//! Ledger adapters.
//!
//! A ledger is a counter (`last_issued`) plus the record collection. Both
//! are read together with an opaque [`Token`]; writes carry the token they
//! were derived from and fail with [`CoreError::Conflict`] if it moved.
//!
//! Adapters that keep counter and records in one resource also implement
//! [`TransactionalLedger`], which lets the issuer commit both in a single
//! write.
//!
//! [`CoreError::Conflict`]: crate::CoreError::Conflict

mod document;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use document::{
    DocumentLayout, DocumentLedger, COUNTER_DOCUMENT, HISTORY_DOCUMENT, LEDGER_DOCUMENT,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLedger;

use crate::error::CoreResult;
use crate::record::Record;
use crate::types::SequenceNumber;
use std::fmt;
use std::sync::Arc;

/// An optimistic-concurrency token.
///
/// The absent token stands for "resource does not exist yet"; writing
/// against it only succeeds if nobody created the resource meanwhile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Token(Option<String>);

impl Token {
    /// Token of a resource that does not exist.
    #[must_use]
    pub const fn absent() -> Self {
        Self(None)
    }

    /// Wraps a backend version string.
    pub fn new(version: impl Into<String>) -> Self {
        Self(Some(version.into()))
    }

    /// Returns true for the absent token.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    /// Returns the backend version string, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(version) => f.write_str(version),
            None => f.write_str("<absent>"),
        }
    }
}

/// A value together with the token it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// The value read.
    pub value: T,
    /// Token to pass back on write.
    pub token: Token,
}

impl<T> Versioned<T> {
    /// Pairs a value with its token.
    pub fn new(value: T, token: Token) -> Self {
        Self { value, token }
    }
}

/// Counter and records as one unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ledger {
    /// Last issued number.
    pub counter: SequenceNumber,
    /// All records, in no particular order.
    pub records: Vec<Record>,
}

impl Ledger {
    /// Returns true if a record with `number` exists.
    #[must_use]
    pub fn contains(&self, number: SequenceNumber) -> bool {
        contains(&self.records, number)
    }

    /// Returns the highest record number, if any.
    #[must_use]
    pub fn highest_number(&self) -> Option<SequenceNumber> {
        self.records.iter().map(|r| r.number).max()
    }
}

pub(crate) fn contains(records: &[Record], number: SequenceNumber) -> bool {
    records.iter().any(|r| r.number == number)
}

/// Storage seam for the counter and the record collection.
///
/// Implementations must make each write atomic: a concurrent reader sees
/// either the old or the new state in full.
pub trait LedgerAdapter: Send + Sync {
    /// Reads `last_issued`. A missing counter reads as `00000000`.
    fn read_counter(&self) -> CoreResult<Versioned<SequenceNumber>>;

    /// Writes `last_issued` if the counter still has token `expected`.
    fn write_counter(&self, value: SequenceNumber, expected: &Token) -> CoreResult<Token>;

    /// Reads every record. A missing collection reads as empty.
    fn read_records(&self) -> CoreResult<Versioned<Vec<Record>>>;

    /// Replaces the record collection if it still has token `expected`.
    fn write_records(&self, records: &[Record], expected: &Token) -> CoreResult<Token>;

    /// Returns the single-resource view, if this adapter has one.
    fn as_transactional(&self) -> Option<&dyn TransactionalLedger> {
        None
    }
}

/// Adapters that update counter and records in one atomic write.
pub trait TransactionalLedger: Send + Sync {
    /// Reads counter and records under one token.
    fn read_ledger(&self) -> CoreResult<Versioned<Ledger>>;

    /// Writes counter and records if the ledger still has token `expected`.
    fn write_ledger(&self, ledger: &Ledger, expected: &Token) -> CoreResult<Token>;
}

impl<A: LedgerAdapter + ?Sized> LedgerAdapter for Arc<A> {
    fn read_counter(&self) -> CoreResult<Versioned<SequenceNumber>> {
        (**self).read_counter()
    }

    fn write_counter(&self, value: SequenceNumber, expected: &Token) -> CoreResult<Token> {
        (**self).write_counter(value, expected)
    }

    fn read_records(&self) -> CoreResult<Versioned<Vec<Record>>> {
        (**self).read_records()
    }

    fn write_records(&self, records: &[Record], expected: &Token) -> CoreResult<Token> {
        (**self).write_records(records, expected)
    }

    fn as_transactional(&self) -> Option<&dyn TransactionalLedger> {
        (**self).as_transactional()
    }
}

impl<A: LedgerAdapter + ?Sized> LedgerAdapter for &A {
    fn read_counter(&self) -> CoreResult<Versioned<SequenceNumber>> {
        (**self).read_counter()
    }

    fn write_counter(&self, value: SequenceNumber, expected: &Token) -> CoreResult<Token> {
        (**self).write_counter(value, expected)
    }

    fn read_records(&self) -> CoreResult<Versioned<Vec<Record>>> {
        (**self).read_records()
    }

    fn write_records(&self, records: &[Record], expected: &Token) -> CoreResult<Token> {
        (**self).write_records(records, expected)
    }

    fn as_transactional(&self) -> Option<&dyn TransactionalLedger> {
        (**self).as_transactional()
    }
}
