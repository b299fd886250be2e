//! Read-through history cache for UI layers.

use crate::error::CoreResult;
use crate::issuer::Issuer;
use crate::ledger::LedgerAdapter;
use crate::record::{Record, RecordDraft};
use crate::store::{customers_of, Customer, RecordStore};
use crate::types::{SequenceNumber, SortOrder};
use parking_lot::RwLock;
use std::sync::Arc;

/// Caches the full history, newest first.
///
/// The cache is never a source of truth: mutations made through it go to
/// the store and then drop the cached copy, and it is never consulted for
/// numbering. Changes made by other clients show up after
/// [`invalidate`](Self::invalidate) or the next local mutation.
///
/// Every invalidation bumps a generation. A load only fills the cache if
/// no invalidation happened while it was reading, so a read that raced a
/// mutation is returned to its caller but never cached.
#[derive(Debug)]
pub struct HistoryCache<A> {
    store: RecordStore<A>,
    state: RwLock<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    records: Option<Arc<Vec<Record>>>,
}

impl<A: LedgerAdapter> HistoryCache<A> {
    /// Wraps a store.
    pub fn new(store: RecordStore<A>) -> Self {
        Self {
            store,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Returns the wrapped store.
    pub fn store(&self) -> &RecordStore<A> {
        &self.store
    }

    /// Returns the history, loading it on first use.
    pub fn records(&self) -> CoreResult<Arc<Vec<Record>>> {
        let generation = {
            let state = self.state.read();
            if let Some(records) = &state.records {
                return Ok(Arc::clone(records));
            }
            state.generation
        };

        let records = Arc::new(self.store.list_all(SortOrder::Descending)?);
        let mut state = self.state.write();
        if state.generation == generation {
            state.records = Some(Arc::clone(&records));
            tracing::trace!(records = records.len(), "history cache filled");
        } else {
            tracing::trace!("history changed while loading, not cached");
        }
        Ok(records)
    }

    /// Customers for autocompletion, from the cached history.
    pub fn customers(&self) -> CoreResult<Vec<Customer>> {
        Ok(customers_of(&self.records()?))
    }

    /// Drops the cached history.
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.generation += 1;
        state.records = None;
    }

    /// Returns true if a cached copy is held.
    #[must_use]
    pub fn is_warm(&self) -> bool {
        self.state.read().records.is_some()
    }

    /// Appends through the store and invalidates.
    pub fn append(&self, record: Record) -> CoreResult<Record> {
        self.after_mutation(self.store.append(record))
    }

    /// Toggles deletion through the store and invalidates.
    pub fn set_deleted(&self, number: SequenceNumber, deleted: bool) -> CoreResult<Record> {
        self.after_mutation(self.store.set_deleted(number, deleted))
    }

    /// Issues through `issuer` and invalidates.
    pub fn issue<B: LedgerAdapter>(&self, issuer: &Issuer<B>, draft: &RecordDraft) -> CoreResult<Record> {
        self.after_mutation(issuer.issue(draft))
    }

    fn after_mutation<T>(&self, result: CoreResult<T>) -> CoreResult<T> {
        if result.is_ok() {
            self.invalidate();
        }
        result
    }
}
