//! Issuing through an external workflow.
//!
//! Some deployments hand the draft to an outside workflow (a CI job, a
//! script endpoint) which is the only writer of the ledger. The caller can
//! only watch the ledger until the document shows up.

use crate::config::{LedgerConfig, RelayConfig};
use crate::error::{CoreError, CoreResult};
use crate::ledger::LedgerAdapter;
use crate::record::{Record, RecordDraft};
use crate::retry::CancellationToken;
use crate::types::SequenceNumber;
use uuid::Uuid;

/// Hands drafts to an external workflow.
pub trait WorkflowRelay: Send + Sync {
    /// Starts the workflow for `draft`. Returns once the request is
    /// accepted, not when the document is written.
    fn dispatch(&self, draft: &RecordDraft) -> CoreResult<()>;
}

impl<R: WorkflowRelay + ?Sized> WorkflowRelay for std::sync::Arc<R> {
    fn dispatch(&self, draft: &RecordDraft) -> CoreResult<()> {
        (**self).dispatch(draft)
    }
}

/// Issues documents by dispatching to a [`WorkflowRelay`] and polling the
/// ledger with backoff.
///
/// Every dispatched draft carries a request id (a fresh UUID unless the
/// caller set one), and the workflow copies it onto the record. The issue
/// completes once the counter has moved past its starting value and the
/// record with that request id exists above it, so identical drafts sent
/// at the same time each get their own number. When the polls run out the
/// error carries the last counter seen; a counter that moved without a
/// matching record needs manual reconciliation, since the workflow owns
/// the counter.
#[derive(Debug)]
pub struct RelayIssuer<A, R> {
    adapter: A,
    relay: R,
    config: RelayConfig,
    tax_rate: f64,
    cancel: CancellationToken,
}

impl<A: LedgerAdapter, R: WorkflowRelay> RelayIssuer<A, R> {
    /// Creates a relay issuer with default polling.
    pub fn new(adapter: A, relay: R) -> Self {
        Self {
            adapter,
            relay,
            config: RelayConfig::default(),
            tax_rate: LedgerConfig::default().tax_rate,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the polling configuration.
    #[must_use]
    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the tax rate assumed for drafts without one.
    #[must_use]
    pub fn with_tax_rate(mut self, rate: f64) -> Self {
        self.tax_rate = rate;
        self
    }

    /// Sets the cancellation token observed while polling.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Dispatches `draft` and waits for its record.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] for a bad draft; nothing is dispatched
    /// - [`CoreError::Timeout`] when the record did not appear in time
    /// - [`CoreError::Inconsistent`] if several records carry the request id,
    ///   or the one that does holds different content
    /// - [`CoreError::Cancelled`] if cancelled while waiting
    pub fn issue(&self, draft: &RecordDraft) -> CoreResult<Record> {
        let mut draft = draft.clone();
        let request_id = draft
            .request_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        draft.validate()?;
        let expected = draft.to_record(SequenceNumber::ZERO, self.tax_rate);

        let start = self.adapter.read_counter()?.value;
        self.relay.dispatch(&draft)?;
        tracing::debug!(%start, %request_id, "draft dispatched");

        let polls = self.config.poll.max_attempts.max(1);
        let mut last_seen = start;
        for attempt in 0..polls {
            // Poll 0 waits the initial delay too: the workflow needs time.
            self.cancel
                .sleep(self.config.poll.delay_for_attempt(attempt + 1))?;

            last_seen = self.adapter.read_counter()?.value;
            if last_seen > start {
                if let Some(record) = self.find(start, &expected)? {
                    tracing::info!(number = %record.number, polls = attempt + 1, "relayed document appeared");
                    return Ok(record);
                }
            }
            tracing::debug!(attempt, %last_seen, "relayed document not visible yet");
        }

        if last_seen > start {
            tracing::warn!(%start, %last_seen, "counter advanced without a matching record");
        } else {
            tracing::warn!(%start, "workflow did not advance the counter");
        }
        Err(CoreError::Timeout {
            last_seen,
            attempts: polls,
        })
    }

    fn find(&self, start: SequenceNumber, expected: &Record) -> CoreResult<Option<Record>> {
        let mut matches = self
            .adapter
            .read_records()?
            .value
            .into_iter()
            .filter(|r| r.number > start && r.request_id == expected.request_id);

        let Some(found) = matches.next() else {
            return Ok(None);
        };
        if let Some(other) = matches.next() {
            return Err(CoreError::inconsistent(format!(
                "request {} was issued twice, as {} and {}",
                expected.request_id.as_deref().unwrap_or_default(),
                found.number,
                other.number
            )));
        }
        if !found.same_content(expected) {
            return Err(CoreError::inconsistent(format!(
                "document {} carries request {} but not its content",
                found.number,
                expected.request_id.as_deref().unwrap_or_default()
            )));
        }
        Ok(Some(found))
    }
}
