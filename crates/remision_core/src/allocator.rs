//! Sequence allocation.

use crate::error::CoreResult;
use crate::ledger::{LedgerAdapter, Token};
use crate::types::SequenceNumber;
use serde::Serialize;

/// A number computed from a counter read, not yet committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// The number this allocation would issue.
    pub number: SequenceNumber,
    /// Counter token the number was derived from.
    pub token: Token,
}

/// Current counter state, as shown before a new document is filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SequenceStatus {
    /// Last issued number.
    #[serde(rename = "ultima")]
    pub last_issued: SequenceNumber,
    /// Number the next document would get.
    pub next: SequenceNumber,
}

/// Produces document numbers from the ledger counter.
///
/// Allocation is split in two steps: [`allocate`](Self::allocate) reads the
/// counter and computes `last_issued + 1` without writing, and
/// [`commit`](Self::commit) persists it only if the counter has not moved.
/// Until a commit succeeds, every allocation returns the same number.
#[derive(Debug)]
pub struct SequenceAllocator<A> {
    adapter: A,
}

impl<A: LedgerAdapter> SequenceAllocator<A> {
    /// Creates an allocator over `adapter`.
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    /// Returns the adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Computes the next number without writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::SequenceOverflow`] past `99999999`, or
    /// the adapter's read error.
    pub fn allocate(&self) -> CoreResult<Allocation> {
        let counter = self.adapter.read_counter()?;
        let number = counter.value.next()?;
        tracing::trace!(%number, token = %counter.token, "allocated");
        Ok(Allocation {
            number,
            token: counter.token,
        })
    }

    /// Persists `allocation.number` as the new `last_issued`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Conflict`] if the counter changed since
    /// the allocation was read. Nothing is written in that case.
    pub fn commit(&self, allocation: &Allocation) -> CoreResult<Token> {
        let token = self
            .adapter
            .write_counter(allocation.number, &allocation.token)?;
        tracing::debug!(number = %allocation.number, "counter committed");
        Ok(token)
    }

    /// Reads the counter for display.
    pub fn peek(&self) -> CoreResult<SequenceStatus> {
        let last_issued = self.adapter.read_counter()?.value;
        Ok(SequenceStatus {
            last_issued,
            next: last_issued.next()?,
        })
    }
}
