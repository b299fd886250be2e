//! Request handlers for the ledger endpoints.

use crate::config::ServerConfig;
use crate::error::ApiResult;
use remision_core::{
    Customer, Issuer, LedgerAdapter, Record, RecordDraft, RecordStore, RetryConfig,
    SequenceAllocator, SequenceNumber, SequenceStatus, SortOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Body of `update-remision`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Document to change.
    #[serde(rename = "remisionNumber")]
    pub number: SequenceNumber,
    /// New deletion flag.
    pub deleted: bool,
}

/// Reply to `update-remision`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    /// Always true; failures are reported as errors.
    pub success: bool,
    /// Document changed.
    #[serde(rename = "remisionNumber")]
    pub number: SequenceNumber,
    /// Flag now stored.
    pub deleted: bool,
}

/// Reply to `save-remision`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveResponse {
    /// Always true; failures are reported as errors.
    pub success: bool,
    /// Number the document was issued under.
    pub remision: SequenceNumber,
    /// The stored record.
    pub record: Record,
}

/// Shared state for request handling.
pub struct HandlerContext<A> {
    /// Server configuration.
    pub config: ServerConfig,
    /// The ledger every handler works on.
    pub ledger: Arc<A>,
    allocator: SequenceAllocator<Arc<A>>,
    store: RecordStore<Arc<A>>,
    issuer: Issuer<Arc<A>>,
}

impl<A: LedgerAdapter> HandlerContext<A> {
    /// Creates a handler context over `ledger`.
    pub fn new(config: ServerConfig, ledger: Arc<A>) -> Self {
        let retry: RetryConfig = config.ledger.retry.clone();
        Self {
            allocator: SequenceAllocator::new(Arc::clone(&ledger)),
            store: RecordStore::new(Arc::clone(&ledger)).with_retry(retry),
            issuer: Issuer::with_config(Arc::clone(&ledger), config.ledger.clone()),
            config,
            ledger,
        }
    }
}

/// Handler for API requests.
pub struct RequestHandler<A> {
    context: Arc<HandlerContext<A>>,
}

impl<A: LedgerAdapter> RequestHandler<A> {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext<A>>) -> Self {
        Self { context }
    }

    /// `get-sequence`: last issued and next number.
    pub fn handle_get_sequence(&self) -> ApiResult<SequenceStatus> {
        Ok(self.context.allocator.peek()?)
    }

    /// `save-remision`: issues a draft.
    pub fn handle_save(&self, draft: RecordDraft) -> ApiResult<SaveResponse> {
        let record = self.context.issuer.issue(&draft)?;
        Ok(SaveResponse {
            success: true,
            remision: record.number,
            record,
        })
    }

    /// `update-remision`: deletes or restores a document.
    pub fn handle_update(&self, request: UpdateRequest) -> ApiResult<UpdateResponse> {
        let record = self
            .context
            .store
            .set_deleted(request.number, request.deleted)?;
        Ok(UpdateResponse {
            success: true,
            number: record.number,
            deleted: record.deleted,
        })
    }

    /// `get-history`: every document, newest first.
    pub fn handle_get_history(&self) -> ApiResult<Vec<Record>> {
        let mut records = self.context.store.list_all(SortOrder::Descending)?;
        if let Some(limit) = self.context.config.history_limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    /// `get-clientes`: known customers ordered by name.
    pub fn handle_get_customers(&self) -> ApiResult<Vec<Customer>> {
        Ok(self.context.store.customers()?)
    }
}
